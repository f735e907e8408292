mod format;
mod sync;

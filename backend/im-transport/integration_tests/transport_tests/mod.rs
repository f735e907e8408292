mod helpers;
mod lifecycle;
mod messaging;
mod push;
mod session;

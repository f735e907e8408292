//! Sync-push decoding and message formatting.
//!
//! A sync push is a frame on [`SYNC_PUSH`](crate::protocol::paths::SYNC_PUSH)
//! whose body holds a package of encoded business records. The dispatcher
//! acknowledges the push first, then runs [`decode_sync_push`] and publishes
//! the result; [`format_message`] flattens a decoded chat record.

mod format;
mod sync;

pub use format::{FormattedMessage, format_message};
pub use sync::{
    DecodedSyncItem, SyncExtensionModel, SyncMessageData, SyncPush, SyncPushBody,
    SyncPushPackage, decode_items, decode_sync_push,
};

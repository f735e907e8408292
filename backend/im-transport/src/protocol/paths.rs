//! Well-known socket paths.

/// Registration carrying the bearer token and device headers.
pub const REGISTER: &str = "/reg";

/// Fire-and-forget keep-alive.
pub const HEARTBEAT: &str = "/!";

pub const SYNC_STATUS: &str = "/r/SyncStatus/getState";

pub const ACK_DIFF: &str = "/r/SyncStatus/ackDiff";

/// Server push that must be acknowledged.
pub const SYNC_PUSH: &str = "/s/sync";

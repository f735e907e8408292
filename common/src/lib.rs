//! Shared building blocks for the IM transport workspace.
//!
//! This crate holds the small value types every other member needs and that
//! carry no transport logic of their own:
//!
//! - [`ErrorLocation`]: file/line/column captured at the point an error is built
//! - [`RedactedToken`]: an opaque bearer token that never leaks through `Debug`
//! - [`StatusCode`]: the numeric status carried by inbound frames
//!
//! ## Architecture
//!
//! - **common** (this crate): value types
//! - **im-transport**: connection manager, dispatcher, codec
//! - **im-listen**: operator CLI wiring everything together

pub mod error;
pub mod redacted_token;
pub mod status_code;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;
pub use status_code::StatusCode;

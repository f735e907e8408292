use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failure to decode a business record or an embedded payload.
///
/// Captured per record by the push decoder; never propagated out of the
/// inbound dispatcher.
#[derive(Debug, Clone, ThisError)]
pub enum DecodeError {
    #[error("Base64 Decode Error: {message} {location}")]
    Base64 {
        message: String,
        location: ErrorLocation,
    },

    #[error("MessagePack Decode Error: {message} {location}")]
    MessagePack {
        message: String,
        location: ErrorLocation,
    },

    #[error("Missing Data Error: {message} {location}")]
    MissingData {
        message: String,
        location: ErrorLocation,
    },

    #[error("JSON Decode Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },
}

impl From<base64::DecodeError> for DecodeError {
    #[track_caller]
    fn from(error: base64::DecodeError) -> Self {
        DecodeError::Base64 {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<rmpv::decode::Error> for DecodeError {
    #[track_caller]
    fn from(error: rmpv::decode::Error) -> Self {
        DecodeError::MessagePack {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        DecodeError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

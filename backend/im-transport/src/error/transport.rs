use crate::error::DecodeError;
use crate::protocol::Frame;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    /// Socket failure before or during the opening handshake.
    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Already Connected Error: {message} {location}")]
    AlreadyConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    /// No matching frame arrived before the request deadline.
    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    /// A matching frame arrived with a status other than 200.
    #[error("Remote Status Error: {} {location}", display_code(.code))]
    RemoteStatus {
        code: Option<u16>,
        frame: Box<Frame>,
        location: ErrorLocation,
    },

    #[error("Connection Closed Error: {message} {location}")]
    ConnectionClosed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Request Id Error: {message} {location}")]
    DuplicateRequestId {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Actor Error: {message} {location}")]
    Actor {
        message: String,
        location: ErrorLocation,
    },
}

fn display_code(code: &Option<u16>) -> String {
    code.map_or_else(|| "missing status".to_string(), |c| c.to_string())
}

impl TransportError {
    #[track_caller]
    pub(crate) fn connect(message: impl Into<String>) -> Self {
        TransportError::Connect {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn not_connected(message: impl Into<String>) -> Self {
        TransportError::NotConnected {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn connection_closed(message: impl Into<String>) -> Self {
        TransportError::ConnectionClosed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn actor_stopped() -> Self {
        TransportError::Actor {
            message: "Transport actor stopped".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// `true` for the per-request deadline error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// `true` when the call was cut short by connection loss or `disconnect()`.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed { .. })
    }
}

impl From<WsError> for TransportError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        TransportError::Send {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        TransportError::Encode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

use common::ErrorLocation;

use im_transport::TransportError;
use im_transport::error::ConfigError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the listener.
#[derive(Debug, Error)]
pub enum ListenError {
    /// Error from this app (directories, logger setup)
    #[error("Listen Error: {message} {location}")]
    Listen {
        message: String,
        location: ErrorLocation,
    },

    /// A required setting is missing or malformed
    #[error("Settings Error: {message} {location}")]
    Settings {
        message: String,
        location: ErrorLocation,
    },

    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Connection or registration failure
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for ListenError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ListenError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for ListenError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        ListenError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

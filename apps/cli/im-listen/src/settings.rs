//! Settings read from the environment (and `.env`, loaded by `main`).
//!
//! | variable | meaning |
//! |---|---|
//! | `IM_ACCESS_TOKEN` | bearer token for registration (required) |
//! | `IM_DEVICE_ID` | device id header; a random one is generated if unset |
//! | `IM_WS_URL` | overrides the configured socket URL |
//! | `IM_LOG_LEVEL` | `error`, `warn`, `info`, `debug` or `trace` |
//! | `IM_CONFIG_DIR` | directory holding `transport.json` |

use crate::error::ListenError;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;
use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;
use uuid::Uuid;

pub const TOKEN_VAR: &str = "IM_ACCESS_TOKEN";
pub const DEVICE_ID_VAR: &str = "IM_DEVICE_ID";
pub const WS_URL_VAR: &str = "IM_WS_URL";
pub const LOG_LEVEL_VAR: &str = "IM_LOG_LEVEL";
pub const CONFIG_DIR_VAR: &str = "IM_CONFIG_DIR";

const APP_DIR_NAME: &str = "im-listen";

#[derive(Debug)]
pub struct ListenSettings {
    pub token: RedactedToken,
    pub device_id: String,
    pub ws_url: Option<String>,
    pub log_level: Option<LevelFilter>,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ListenSettings {
    pub fn from_env() -> Result<Self, ListenError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ListenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let token = read(TOKEN_VAR).ok_or_else(|| ListenError::Settings {
            message: format!("{TOKEN_VAR} is not set"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let log_level = read(LOG_LEVEL_VAR)
            .map(|level| {
                LevelFilter::from_str(&level).map_err(|_| ListenError::Settings {
                    message: format!("Invalid {LOG_LEVEL_VAR}: {level}"),
                    location: ErrorLocation::from(Location::caller()),
                })
            })
            .transpose()?;

        let config_dir = match read(CONFIG_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => app_dir(dirs::config_dir())?,
        };

        Ok(Self {
            token: RedactedToken::new(token),
            device_id: read(DEVICE_ID_VAR).unwrap_or_else(|| Uuid::new_v4().to_string()),
            ws_url: read(WS_URL_VAR),
            log_level,
            config_dir,
            log_dir: app_dir(dirs::data_local_dir())?.join("logs"),
        })
    }
}

fn app_dir(base: Option<PathBuf>) -> Result<PathBuf, ListenError> {
    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| ListenError::Listen {
            message: "Could not determine user directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

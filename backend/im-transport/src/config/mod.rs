mod options;

pub use options::ConnectOptions;

use crate::DEFAULT_WS_URL;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

const CONFIG_FILE_NAME: &str = "transport.json";
const CONFIG_VERSION: u32 = 1;

// ============================================
// CONFIG STRUCT
// ============================================

/// Settings consumed by the transport.
///
/// Durations are stored in milliseconds so the file stays readable; use the
/// accessor methods for [`Duration`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// `0` disables the heartbeat.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Extra headers sent with the WebSocket upgrade request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            ws_url: default_ws_url(),
            auto_reconnect: default_auto_reconnect(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            headers: BTreeMap::new(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}
fn default_auto_reconnect() -> bool {
    true
}
fn default_reconnect_interval_ms() -> u64 {
    3_000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_heartbeat_interval_ms() -> u64 {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    20_000
}

// ============================================
// IMPLEMENTATION
// ============================================

impl TransportConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// `None` when the heartbeat is disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load config from {config_dir}/transport.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(TransportConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Transport config not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read transport config: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: TransportConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse transport config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Transport config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/transport.json using temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Transport config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] for a URL that is not `ws://` or `wss://`,
    /// and [`ConfigError::ValidationError`] for any other invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::validation(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        validate_ws_url(&self.ws_url)?;

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "request_timeout_ms must be greater than zero",
            ));
        }

        if self.auto_reconnect && self.reconnect_interval_ms == 0 {
            return Err(ConfigError::validation(
                "reconnect_interval_ms must be greater than zero when auto_reconnect is on",
            ));
        }

        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::validation(format!(
                    "Invalid header name: {name}"
                )));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::validation(format!(
                    "Invalid value for header {name}"
                )));
            }
        }

        Ok(())
    }
}

pub(crate) fn validate_ws_url(ws_url: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(ws_url).map_err(|e| ConfigError::InvalidUrl {
        location: ErrorLocation::from(Location::caller()),
        url: ws_url.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(ConfigError::InvalidUrl {
            location: ErrorLocation::from(Location::caller()),
            url: ws_url.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}

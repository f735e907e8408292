use crate::config::TransportConfig;

use std::collections::BTreeMap;

/// Per-call overrides for [`TransportClient::connect`](crate::TransportClient::connect).
///
/// Set fields replace the stored configuration before the attempt and stay in
/// effect for later reconnects. Headers are merged, not replaced.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub auto_reconnect: Option<bool>,
    pub reconnect_interval_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
    pub heartbeat_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

impl ConnectOptions {
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = Some(enabled);
        self
    }

    pub fn with_reconnect_interval_ms(mut self, interval_ms: u64) -> Self {
        self.reconnect_interval_ms = Some(interval_ms);
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = Some(interval_ms);
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub(crate) fn apply(self, config: &mut TransportConfig) {
        if let Some(enabled) = self.auto_reconnect {
            config.auto_reconnect = enabled;
        }
        if let Some(interval) = self.reconnect_interval_ms {
            config.reconnect_interval_ms = interval;
        }
        if let Some(attempts) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(interval) = self.heartbeat_interval_ms {
            config.heartbeat_interval_ms = interval;
        }
        if let Some(timeout) = self.request_timeout_ms {
            config.request_timeout_ms = timeout;
        }
        config.headers.extend(self.headers);
    }
}

use crate::config::{ConnectOptions, TransportConfig};
use crate::error::ConfigError;

use std::time::Duration;

use tempfile::TempDir;

/// **VALUE**: Defaults match the production client constants.
///
/// **BUG THIS CATCHES**: Would catch a default drifting (for example a 20s
/// timeout becoming 2s) without anyone noticing.
#[test]
fn given_default_config_when_inspected_then_matches_client_constants() {
    let config = TransportConfig::default();

    assert_eq!(config.ws_url, "wss://wss-goofish.dingtalk.com/");
    assert!(config.auto_reconnect);
    assert_eq!(config.reconnect_interval(), Duration::from_secs(3));
    assert_eq!(config.max_reconnect_attempts, 5);
    assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(10)));
    assert_eq!(config.request_timeout(), Duration::from_secs(20));
    assert!(config.validate().is_ok());
}

/// **VALUE**: A zero heartbeat interval disables the heartbeat.
#[test]
fn given_zero_heartbeat_when_interval_read_then_none() {
    let config = TransportConfig {
        heartbeat_interval_ms: 0,
        ..Default::default()
    };

    assert_eq!(config.heartbeat_interval(), None);
}

/// **VALUE**: Missing config file yields defaults rather than an error.
///
/// **WHY THIS MATTERS**: First run has no file; the CLI must still start.
#[test]
fn given_missing_file_when_load_called_then_returns_defaults() {
    // GIVEN
    let dir = TempDir::new().unwrap();

    // WHEN
    let config = TransportConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(config, TransportConfig::default());
}

/// **VALUE**: Save then load returns the same configuration.
///
/// **BUG THIS CATCHES**: Would catch a renamed field that serializes under one
/// name and deserializes under another, or the temp file never being renamed.
#[test]
fn given_saved_config_when_loaded_then_values_preserved() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let mut config = TransportConfig {
        ws_url: "ws://127.0.0.1:9000/".to_string(),
        max_reconnect_attempts: 2,
        ..Default::default()
    };
    config.headers.insert("origin".to_string(), "https://www.goofish.com".to_string());
    config.save(dir.path()).unwrap();

    // WHEN
    let loaded = TransportConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(loaded, config);
    assert!(!dir.path().join("transport.json.tmp").exists());
}

/// **VALUE**: Fields absent from the file fall back to their defaults.
#[test]
fn given_partial_file_when_loaded_then_missing_fields_defaulted() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("transport.json"),
        r#"{ "request_timeout_ms": 500 }"#,
    )
    .unwrap();

    // WHEN
    let config = TransportConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(config.request_timeout_ms, 500);
    assert_eq!(config.max_reconnect_attempts, 5);
}

/// **VALUE**: Corrupt JSON is reported, not replaced with defaults.
///
/// **BUG THIS CATCHES**: Would catch load() swallowing parse errors and
/// silently connecting to the production URL.
#[test]
fn given_corrupt_file_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("transport.json"), "{ not json").unwrap();

    let result = TransportConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Only `ws://` and `wss://` URLs are accepted.
#[test]
fn given_http_url_when_validated_then_invalid_url() {
    let config = TransportConfig {
        ws_url: "https://example.com/".to_string(),
        ..Default::default()
    };

    assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
}

/// **VALUE**: Zero timeout and malformed header names are rejected.
#[test]
fn given_invalid_values_when_validated_then_validation_error() {
    let zero_timeout = TransportConfig {
        request_timeout_ms: 0,
        ..Default::default()
    };
    assert!(matches!(
        zero_timeout.validate(),
        Err(ConfigError::ValidationError { .. })
    ));

    let mut bad_header = TransportConfig::default();
    bad_header.headers.insert("bad header".to_string(), "x".to_string());
    assert!(matches!(
        bad_header.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: Connect options override only what they set and merge headers.
///
/// **BUG THIS CATCHES**: Would catch headers being replaced wholesale, which
/// would drop configured upgrade headers on every connect with options.
#[test]
fn given_options_when_applied_then_only_set_fields_change() {
    // GIVEN
    let mut config = TransportConfig::default();
    config.headers.insert("origin".to_string(), "a".to_string());
    let options = ConnectOptions::default()
        .with_request_timeout_ms(100)
        .with_max_reconnect_attempts(1)
        .with_header("cookie", "c");

    // WHEN
    options.apply(&mut config);

    // THEN
    assert_eq!(config.request_timeout_ms, 100);
    assert_eq!(config.max_reconnect_attempts, 1);
    assert_eq!(config.heartbeat_interval_ms, 10_000);
    assert_eq!(config.headers.len(), 2);
}

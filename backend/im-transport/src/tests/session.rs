use crate::session::Registration;
use crate::{DEFAULT_APP_KEY, DEFAULT_USER_AGENT};

use common::RedactedToken;

use serde_json::json;

/// **VALUE**: The registration envelope carries every header the server reads,
/// with the well-known defaults.
///
/// **BUG THIS CATCHES**: Would catch a renamed header key (`app-key` vs
/// `appKey`) that makes the server reject registration.
#[test]
fn given_token_and_device_when_envelope_built_then_all_headers_present() {
    // GIVEN
    let registration = Registration::new()
        .with_token(RedactedToken::new("secret-token"))
        .with_device_id("device-1");

    // WHEN
    let envelope = registration.to_envelope();

    // THEN
    assert_eq!(envelope.lwp.as_deref(), Some("/reg"));
    let headers = &envelope.headers;
    assert_eq!(headers["cache-header"], json!("app-key token ua wv"));
    assert_eq!(headers["app-key"], json!(DEFAULT_APP_KEY));
    assert_eq!(headers["token"], json!("secret-token"));
    assert_eq!(headers["ua"], json!(DEFAULT_USER_AGENT));
    assert_eq!(headers["dt"], json!("j"));
    assert_eq!(headers["wv"], json!("im:3,au:3,sy:6"));
    assert_eq!(headers["sync"], json!("0,0;0;0;"));
    assert_eq!(headers["did"], json!("device-1"));
}

/// **VALUE**: Unset token and device id are omitted, not sent as empty strings.
#[test]
fn given_no_token_when_envelope_built_then_token_and_did_absent() {
    let envelope = Registration::new().to_envelope();

    assert!(!envelope.headers.contains_key("token"));
    assert!(!envelope.headers.contains_key("did"));
}

/// **VALUE**: Debug output never shows the token.
///
/// **WHY THIS MATTERS**: Registrations get logged at debug level.
#[test]
fn given_registration_with_token_when_debug_formatted_then_token_hidden() {
    let registration = Registration::new().with_token(RedactedToken::new("secret-token"));

    let debug = format!("{registration:?}");

    assert!(!debug.contains("secret-token"));
}

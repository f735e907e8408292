use crate::error::ListenError;

use im_transport::TransportConfig;

/// **VALUE**: Config failures convert into `ListenError::Config` with the
/// original message kept.
///
/// **BUG THIS CATCHES**: Would catch a `From` impl that drops the cause,
/// leaving users with "Config Error" and nothing else.
#[test]
fn given_invalid_config_when_converted_then_config_variant_with_message() {
    // GIVEN
    let config = TransportConfig {
        ws_url: "http://example.com".to_string(),
        ..Default::default()
    };
    let error = config.validate().unwrap_err();

    // WHEN
    let listen_error = ListenError::from(error);

    // THEN
    assert!(matches!(listen_error, ListenError::Config { .. }));
    assert!(listen_error.to_string().contains("http://example.com"));
}

use crate::transport_tests::helpers::{MockServer, test_client};

use im_transport::session::{ImSession, Registration};
use im_transport::{ConnectOptions, TransportError};

use common::RedactedToken;

use serde_json::json;

/// **VALUE**: Registration runs `/reg`, `getState` and `ackDiff` in order and
/// acknowledges the exact sync state the server returned.
///
/// **WHY THIS MATTERS**: The server withholds pushes until the diff is
/// acknowledged; acknowledging the wrong body means no messages ever arrive.
#[tokio::test]
async fn given_server_script_when_register_called_then_three_step_handshake() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;
    let session = ImSession::new(client.clone());
    let registration = Registration::new()
        .with_token(RedactedToken::new("token-abc"))
        .with_device_id("device-1");

    // WHEN
    let register = tokio::spawn(async move { session.register(&registration).await });

    let reg = conn.recv_path("/reg").await;
    assert_eq!(reg["headers"]["token"], json!("token-abc"));
    conn.reply(&reg, json!({ "reg-uid": "u-1" })).await;

    let get_state = conn.recv_path("/r/SyncStatus/getState").await;
    assert_eq!(get_state["body"], json!([{ "topic": "sync" }]));
    let status = json!({ "pipeline": "sync", "pts": 123, "seq": 7 });
    conn.reply(&get_state, status.clone()).await;

    let ack_diff = conn.recv_path("/r/SyncStatus/ackDiff").await;
    assert_eq!(ack_diff["body"], json!([status]));
    conn.reply(&ack_diff, json!({})).await;

    // THEN
    let frame = register.await.unwrap().expect("register should succeed");
    assert_eq!(frame.body, Some(json!({ "reg-uid": "u-1" })));
}

/// **VALUE**: A rejected registration stops the sequence.
#[tokio::test]
async fn given_registration_rejected_when_register_called_then_error_and_no_sync_calls() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;
    let session = ImSession::new(client.clone());

    let register = tokio::spawn(async move { session.register(&Registration::new()).await });
    let reg = conn.recv_path("/reg").await;
    conn.reply_with_code(&reg, 401, json!({})).await;

    let result = register.await.unwrap();
    assert!(matches!(result, Err(TransportError::RemoteStatus { code: Some(401), .. })));
    assert!(
        conn.try_recv_json(std::time::Duration::from_millis(200))
            .await
            .is_none()
    );
}

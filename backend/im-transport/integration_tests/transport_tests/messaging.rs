use crate::transport_tests::helpers::{EventLog, MockServer, test_client, wait_until};

use im_transport::{ConnectOptions, Envelope, EventKind, TransportError, TransportEvent};

use std::sync::{Arc, Mutex};

use serde_json::json;

/// **VALUE**: A correlated request resolves with the server's matching reply.
///
/// **WHY THIS MATTERS**: Every RPC on the socket (registration, sync state,
/// message send) goes through this path.
///
/// **BUG THIS CATCHES**: Would catch replies matched by arrival order instead
/// of `mid`, or the entry not being removed after settlement.
#[tokio::test]
async fn given_server_echoes_mid_when_send_called_then_resolves_with_body() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    // WHEN
    let sender = client.clone();
    let request = tokio::spawn(async move {
        sender
            .send(Envelope::new("/r/Test").with_body(json!({ "q": 1 })))
            .await
    });
    let received = conn.recv_path("/r/Test").await;
    conn.reply(&received, json!({ "ok": true })).await;

    // THEN
    let frame = request.await.unwrap().expect("request should resolve");
    assert_eq!(frame.body, Some(json!({ "ok": true })));
    assert_eq!(frame.mid(), received["headers"]["mid"].as_str());
    assert_eq!(received["body"], json!({ "q": 1 }));
    assert_eq!(client.pending_request_count().await.unwrap(), 0);
}

/// **VALUE**: Interleaved replies settle the right callers.
#[tokio::test]
async fn given_two_requests_when_replies_arrive_reversed_then_each_gets_its_own() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    let first_client = client.clone();
    let first = tokio::spawn(async move {
        first_client.send(Envelope::new("/r/First").with_mid("1 0")).await
    });
    let first_request = conn.recv_path("/r/First").await;
    let second_client = client.clone();
    let second = tokio::spawn(async move {
        second_client.send(Envelope::new("/r/Second").with_mid("2 0")).await
    });
    let second_request = conn.recv_path("/r/Second").await;

    // WHEN
    conn.reply(&second_request, json!("second")).await;
    conn.reply(&first_request, json!("first")).await;

    // THEN
    assert_eq!(first.await.unwrap().unwrap().body, Some(json!("first")));
    assert_eq!(second.await.unwrap().unwrap().body, Some(json!("second")));
}

/// **VALUE**: A non-200 reply rejects with the status and the frame.
#[tokio::test]
async fn given_server_replies_401_when_send_called_then_remote_status_error() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    let sender = client.clone();
    let request = tokio::spawn(async move { sender.send(Envelope::new("/reg")).await });
    let received = conn.recv_path("/reg").await;
    conn.reply_with_code(&received, 401, json!({ "reason": "token expired" }))
        .await;

    match request.await.unwrap() {
        Err(TransportError::RemoteStatus { code, frame, .. }) => {
            assert_eq!(code, Some(401));
            assert_eq!(frame.body, Some(json!({ "reason": "token expired" })));
        }
        other => panic!("Expected RemoteStatus, got {other:?}"),
    }
}

/// **VALUE**: An unanswered request times out, and a late reply is treated
/// as unmatched.
///
/// **BUG THIS CATCHES**: Would catch the timeout leaving the entry behind so
/// the late reply "resolves" a request whose caller already saw an error.
#[tokio::test]
async fn given_no_reply_when_timeout_elapses_then_rejected_and_late_reply_unmatched() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(&client, &[EventKind::Unmatched]);
    client
        .connect(None, ConnectOptions::default().with_request_timeout_ms(100))
        .await
        .unwrap();
    let mut conn = server.accept().await;

    // WHEN
    let sender = client.clone();
    let request = tokio::spawn(async move { sender.send(Envelope::new("/r/Slow")).await });
    let received = conn.recv_path("/r/Slow").await;
    let error = request.await.unwrap().unwrap_err();
    conn.reply(&received, json!({ "late": true })).await;

    // THEN
    assert!(error.is_timeout(), "Got {error}");
    assert!(error.to_string().contains("/r/Slow"));
    wait_until(|| events.count(EventKind::Unmatched) == 1).await;
    assert_eq!(client.pending_request_count().await.unwrap(), 0);
}

/// **VALUE**: Correlated sends while disconnected fail immediately.
///
/// **WHY THIS MATTERS**: Unlike fire-and-forget writes, a request cannot be
/// queued because its caller is waiting on a reply.
#[tokio::test]
async fn given_never_connected_when_send_called_then_not_connected() {
    let client = test_client("ws://127.0.0.1:1/");

    let result = client.send(Envelope::new("/r/Test")).await;

    assert!(matches!(result, Err(TransportError::NotConnected { .. })));
}

/// **VALUE**: Fire-and-forget writes queued before connecting are flushed in
/// order once the socket opens.
#[tokio::test]
async fn given_raw_sends_before_connect_when_connected_then_flushed_fifo() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    for path in ["/a", "/b", "/c"] {
        client.send_raw(Envelope::new(path));
    }
    assert_eq!(client.queue_length().await.unwrap(), 3);

    // WHEN
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    // THEN
    for path in ["/a", "/b", "/c"] {
        assert_eq!(conn.recv_json().await["lwp"], json!(path));
    }
    assert_eq!(client.queue_length().await.unwrap(), 0);
}

/// **VALUE**: Reusing a pending `mid` is rejected without disturbing the
/// original request.
#[tokio::test]
async fn given_pending_mid_when_reused_then_duplicate_rejected() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;
    let sender = client.clone();
    let original = tokio::spawn(async move {
        sender.send(Envelope::new("/r/One").with_mid("same 0")).await
    });
    let received = conn.recv_path("/r/One").await;

    // WHEN
    let duplicate = client.send(Envelope::new("/r/Two").with_mid("same 0")).await;
    conn.reply(&received, json!(1)).await;

    // THEN
    assert!(matches!(
        duplicate,
        Err(TransportError::DuplicateRequestId { .. })
    ));
    assert_eq!(original.await.unwrap().unwrap().body, Some(json!(1)));
}

/// **VALUE**: Every parsed frame is published as `message`, and unparseable
/// text is reported as an `error` without closing the connection.
#[tokio::test]
async fn given_inbound_text_when_dispatched_then_message_and_error_events() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);
    client.on(EventKind::Error, move |event| {
        if let TransportEvent::Error(error) = event {
            seen.lock().unwrap().push(error.to_string());
        }
    });
    let events = EventLog::attach(&client, &[EventKind::Message, EventKind::Unmatched]);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    // WHEN
    conn.send_text("this is not json").await;
    conn.send_json(json!({ "lwp": "/s/para", "headers": {}, "body": {} }))
        .await;

    // THEN
    wait_until(|| events.count(EventKind::Unmatched) == 1).await;
    assert_eq!(events.count(EventKind::Message), 1);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("JSON"), "Got {}", errors[0]);
    drop(errors);
    assert!(client.is_connected().await);
}

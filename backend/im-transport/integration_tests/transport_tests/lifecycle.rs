use crate::transport_tests::helpers::{
    EventLog, MockServer, test_client, test_config, wait_until,
};

use im_transport::{
    ConnectOptions, ConnectionState, Envelope, EventKind, TransportClient, TransportError,
    TransportEvent,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

/// **VALUE**: Connecting opens the socket, emits `open` and reports `Open`.
///
/// **BUG THIS CATCHES**: Would catch connect() resolving before the handshake
/// completes, or the state mirror not being updated.
#[tokio::test]
async fn given_running_server_when_connect_called_then_open_and_event_emitted() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(&client, &[EventKind::Open]);

    // WHEN
    client
        .connect(None, ConnectOptions::default())
        .await
        .expect("connect should succeed");
    let _conn = server.accept().await;

    // THEN
    assert!(client.is_connected().await);
    assert_eq!(client.state().await, ConnectionState::Open);
    assert_eq!(events.kinds(), vec![EventKind::Open]);
}

/// **VALUE**: Custom upgrade headers reach the server.
#[tokio::test]
async fn given_connect_headers_when_connected_then_server_sees_them() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);

    client
        .connect(None, ConnectOptions::default().with_header("origin", "https://www.goofish.com"))
        .await
        .unwrap();
    let conn = server.accept().await;

    assert_eq!(
        conn.headers.get("origin").and_then(|v| v.to_str().ok()),
        Some("https://www.goofish.com")
    );
}

/// **VALUE**: A second connect while open is rejected.
///
/// **WHY THIS MATTERS**: Two sockets would split responses between them and
/// double every push acknowledgment.
#[tokio::test]
async fn given_open_connection_when_connect_called_again_then_already_connected() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let _conn = server.accept().await;

    // WHEN
    let result = client.connect(None, ConnectOptions::default()).await;

    // THEN
    assert!(matches!(result, Err(TransportError::AlreadyConnected { .. })));
}

/// A `ws://` URL on a port nobody listens on, and that port.
async fn refused_url() -> (String, u16) {
    let server = MockServer::start().await;
    let (url, port) = (server.url.clone(), server.port());
    server.stop_listening();
    drop(server);
    tokio::time::sleep(Duration::from_millis(50)).await;
    (url, port)
}

/// **VALUE**: An unreachable server fails the initial connect and then runs
/// the bounded reconnect loop.
///
/// **WHY THIS MATTERS**: A client started while the server is briefly down
/// must recover on its own, but must also give up after the attempt cap.
///
/// **BUG THIS CATCHES**: Would catch a failed first handshake being treated
/// as terminal, or the loop retrying forever.
#[tokio::test]
async fn given_no_server_when_connect_called_then_connect_error_and_bounded_retries() {
    // GIVEN
    let (url, _) = refused_url().await;
    let client = test_client(&url);
    let events = EventLog::attach(
        &client,
        &[EventKind::Error, EventKind::Close, EventKind::ReconnectFailed],
    );

    // WHEN
    let result = client.connect(None, ConnectOptions::default()).await;

    // THEN: the first attempt plus three retries, each error then close
    assert!(matches!(result, Err(TransportError::Connect { .. })));
    wait_until(|| events.count(EventKind::ReconnectFailed) == 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut expected = Vec::new();
    for _ in 0..4 {
        expected.extend([EventKind::Error, EventKind::Close]);
    }
    expected.push(EventKind::ReconnectFailed);
    assert_eq!(events.kinds(), expected);
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

/// **VALUE**: With auto-reconnect off, a failed first handshake is reported
/// once and nothing is retried.
#[tokio::test]
async fn given_no_server_and_auto_reconnect_off_when_connect_called_then_no_retry() {
    let (url, _) = refused_url().await;
    let client = test_client(&url);
    let events = EventLog::attach(
        &client,
        &[EventKind::Error, EventKind::Close, EventKind::ReconnectFailed],
    );

    let result = client
        .connect(None, ConnectOptions::default().with_auto_reconnect(false))
        .await;

    assert!(matches!(result, Err(TransportError::Connect { .. })));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(events.kinds(), vec![EventKind::Error, EventKind::Close]);
}

/// **VALUE**: A server that comes up after a failed first connect is picked
/// up by the reconnect loop.
#[tokio::test]
async fn given_failed_first_connect_when_server_starts_then_reconnects() {
    // GIVEN
    let (url, port) = refused_url().await;
    let client = test_client(&url);
    let events = EventLog::attach(&client, &[EventKind::Open, EventKind::Reconnect]);
    let result = client
        .connect(
            None,
            ConnectOptions::default()
                .with_reconnect_interval_ms(200)
                .with_max_reconnect_attempts(10),
        )
        .await;
    assert!(result.is_err());

    // WHEN
    let mut server = MockServer::start_on(port).await;

    // THEN
    let _conn = server.accept().await;
    wait_until(|| events.count(EventKind::Reconnect) == 1).await;
    assert_eq!(events.kinds(), vec![EventKind::Open, EventKind::Reconnect]);
    assert!(client.is_connected().await);
}

/// **VALUE**: Unexpected close triggers a reconnect that flushes queued
/// messages and reports the attempt number.
///
/// **BUG THIS CATCHES**: Would catch the queue not being flushed on
/// reconnect (only on the first open), or `reconnect` firing with the
/// counter already reset to zero.
#[tokio::test]
async fn given_server_drops_connection_when_reconnected_then_queue_flushed_and_reconnect_emitted() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = TransportClient::new(test_config(&server.url)).unwrap();
    let events = EventLog::attach(
        &client,
        &[EventKind::Open, EventKind::Close, EventKind::Reconnect],
    );
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&attempts);
    client.on(EventKind::Reconnect, move |event| {
        if let TransportEvent::Reconnect(attempt) = event {
            seen.lock().unwrap().push(*attempt);
        }
    });
    client
        .connect(None, ConnectOptions::default().with_reconnect_interval_ms(300))
        .await
        .unwrap();
    let conn = server.accept().await;

    // WHEN: the server goes away and three messages are sent meanwhile
    conn.close().await;
    wait_until(|| events.count(EventKind::Close) == 1).await;
    for path in ["/a", "/b", "/c"] {
        client.send_raw(Envelope::new(path));
    }
    assert_eq!(client.queue_length().await.unwrap(), 3);
    let mut conn = server.accept().await;

    // THEN
    for path in ["/a", "/b", "/c"] {
        assert_eq!(conn.recv_json().await["lwp"], json!(path));
    }
    wait_until(|| events.count(EventKind::Reconnect) == 1).await;
    assert_eq!(*attempts.lock().unwrap(), vec![1]);
    assert_eq!(
        events.kinds(),
        vec![
            EventKind::Open,
            EventKind::Close,
            EventKind::Open,
            EventKind::Reconnect
        ]
    );
    assert_eq!(client.queue_length().await.unwrap(), 0);
}

/// **VALUE**: When every reconnect attempt fails, `reconnect-failed` fires
/// exactly once and no further attempts are made.
///
/// **WHY THIS MATTERS**: Callers use this event to surface a terminal
/// connection failure; firing it repeatedly (or never) breaks that.
#[tokio::test]
async fn given_server_gone_when_attempts_exhausted_then_reconnect_failed_once() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(
        &client,
        &[EventKind::Close, EventKind::Error, EventKind::ReconnectFailed],
    );
    client
        .connect(None, ConnectOptions::default().with_max_reconnect_attempts(2))
        .await
        .unwrap();
    let conn = server.accept().await;

    // WHEN
    server.stop_listening();
    tokio::time::sleep(Duration::from_millis(50)).await;
    conn.close().await;

    // THEN
    wait_until(|| events.count(EventKind::ReconnectFailed) == 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(events.count(EventKind::ReconnectFailed), 1);
    assert_eq!(events.count(EventKind::Error), 2, "One error per failed attempt");
    assert_eq!(
        events.count(EventKind::Close),
        3,
        "The dropped socket plus one per failed attempt"
    );
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

/// **VALUE**: `disconnect()` rejects in-flight requests and does not reconnect.
///
/// **BUG THIS CATCHES**: Would catch callers hanging until their timeout after
/// an intentional close, or a manual close being treated as a drop.
#[tokio::test]
async fn given_pending_request_when_disconnect_called_then_rejected_and_no_reconnect() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(&client, &[EventKind::Close, EventKind::Reconnect]);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    let sender = client.clone();
    let request = tokio::spawn(async move { sender.send(Envelope::new("/r/Never")).await });
    conn.recv_path("/r/Never").await;
    assert_eq!(client.pending_request_count().await.unwrap(), 1);

    // WHEN
    client.disconnect();

    // THEN
    let error = request.await.unwrap().unwrap_err();
    assert!(error.is_connection_closed(), "Got {error}");
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert_eq!(client.pending_request_count().await.unwrap(), 0);
    assert!(!server.connects_within(Duration::from_millis(300)).await);
    assert_eq!(events.kinds(), vec![EventKind::Close]);
}

/// **VALUE**: A new connect after disconnect works and uses fresh state.
#[tokio::test]
async fn given_disconnected_client_when_connect_called_then_reopens() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let _first = server.accept().await;
    client.disconnect();

    client.connect(None, ConnectOptions::default()).await.unwrap();
    let _second = server.accept().await;

    assert!(client.is_connected().await);
}

/// **VALUE**: The heartbeat sends `/!` on its interval and emits `heartbeat`.
#[tokio::test]
async fn given_heartbeat_enabled_when_interval_elapses_then_heartbeat_sent() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(&client, &[EventKind::Heartbeat]);

    // WHEN
    client
        .connect(None, ConnectOptions::default().with_heartbeat_interval_ms(50))
        .await
        .unwrap();
    let mut conn = server.accept().await;

    // THEN
    let heartbeat = conn.recv_json().await;
    assert_eq!(heartbeat["lwp"], json!("/!"));
    assert!(heartbeat["headers"]["mid"].is_string());
    wait_until(|| events.count(EventKind::Heartbeat) >= 1).await;
}

/// **VALUE**: A zero interval disables the heartbeat on the wire.
#[tokio::test]
async fn given_zero_heartbeat_interval_when_connected_then_no_heartbeat_frames() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(&client, &[EventKind::Heartbeat]);

    // WHEN
    client
        .connect(None, ConnectOptions::default().with_heartbeat_interval_ms(0))
        .await
        .unwrap();
    let mut conn = server.accept().await;

    // THEN
    assert_eq!(conn.try_recv_json(Duration::from_millis(300)).await, None);
    assert_eq!(events.count(EventKind::Heartbeat), 0);
}

/// **VALUE**: The heartbeat stops when the socket closes.
///
/// **BUG THIS CATCHES**: Would catch the interval outliving its socket and
/// emitting `heartbeat` (or failed writes) while disconnected.
#[tokio::test]
async fn given_heartbeat_running_when_server_drops_then_no_heartbeat_while_disconnected() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(&client, &[EventKind::Heartbeat, EventKind::Close]);
    client
        .connect(
            None,
            ConnectOptions::default()
                .with_heartbeat_interval_ms(50)
                .with_auto_reconnect(false),
        )
        .await
        .unwrap();
    let mut conn = server.accept().await;
    conn.recv_path("/!").await;
    wait_until(|| events.count(EventKind::Heartbeat) >= 1).await;

    // WHEN
    conn.close().await;
    wait_until(|| events.count(EventKind::Close) == 1).await;
    let beats_at_close = events.count(EventKind::Heartbeat);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // THEN
    assert_eq!(events.count(EventKind::Heartbeat), beats_at_close);
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

/// **VALUE**: After a reconnect the heartbeat restarts once, on the new
/// socket only.
///
/// **WHY THIS MATTERS**: A supervisor left over from the dropped socket would
/// double the keep-alive rate on every reconnect.
///
/// **BUG THIS CATCHES**: Would catch the old interval not being cancelled, so
/// ticks from two generations interleave on the new socket.
#[tokio::test]
async fn given_reconnected_client_when_heartbeat_ticks_then_single_cadence_on_new_socket() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client
        .connect(None, ConnectOptions::default().with_heartbeat_interval_ms(200))
        .await
        .unwrap();
    let mut first = server.accept().await;
    first.recv_path("/!").await;

    // WHEN
    first.close().await;
    let mut second = server.accept().await;

    // THEN: three ticks, each a full period apart
    let mut arrivals = Vec::new();
    for _ in 0..3 {
        let heartbeat = second.recv_path("/!").await;
        assert!(heartbeat["headers"]["mid"].is_string());
        arrivals.push(tokio::time::Instant::now());
    }
    for pair in arrivals.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(100),
            "Heartbeats {gap:?} apart; expected one per 200ms period"
        );
    }
}

/// **VALUE**: Effective config reflects per-connect overrides.
#[tokio::test]
async fn given_connect_options_when_config_read_then_overrides_applied() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);

    client
        .connect(None, ConnectOptions::default().with_request_timeout_ms(1234))
        .await
        .unwrap();
    let _conn = server.accept().await;

    assert_eq!(client.config().await.unwrap().request_timeout_ms, 1234);
}

/// **VALUE**: An invalid URL is rejected before any socket is opened.
#[tokio::test]
async fn given_http_url_when_connect_called_then_connect_error() {
    let client = test_client("ws://127.0.0.1:1/");

    let result = client
        .connect(Some("http://example.com/"), ConnectOptions::default())
        .await;

    assert!(matches!(result, Err(TransportError::Connect { .. })));
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

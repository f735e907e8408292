//! Test helpers for transport integration tests.
//!
//! This module provides a scripted in-process WebSocket server:
//! - Accepting client connections one at a time
//! - Reading client envelopes as JSON
//! - Replying, pushing and closing on demand
//! - Recording which events a client emitted

use im_transport::{EventKind, TransportClient, TransportConfig};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures_util::{SinkExt, StreamExt};
use rmpv::Value as MsgPackValue;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

pub const WAIT: Duration = Duration::from_secs(5);

/// Local WebSocket server bound to an ephemeral port.
pub struct MockServer {
    pub url: String,
    port: u16,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    accept_loop: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::start_on(0).await
    }

    /// Listen on a specific port, e.g. one a client is already retrying.
    pub async fn start_on(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let (tx, rx) = mpsc::unbounded_channel();

        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let headers = Arc::new(Mutex::new(HeaderMap::new()));
                let captured = Arc::clone(&headers);
                let callback = move |request: &Request,
                                     response: Response|
                      -> Result<Response, ErrorResponse> {
                    *captured.lock().unwrap() = request.headers().clone();
                    Ok(response)
                };
                let Ok(ws) = accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let headers = headers.lock().unwrap().clone();
                if tx.send(ServerConnection { ws, headers }).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{port}/"),
            port,
            connections: rx,
            accept_loop,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("Timed out waiting for client connection")
            .expect("Accept loop stopped")
    }

    /// `true` if a client connected within `within`.
    pub async fn connects_within(&mut self, within: Duration) -> bool {
        matches!(
            tokio::time::timeout(within, self.connections.recv()).await,
            Ok(Some(_))
        )
    }

    /// Stop listening; later connection attempts are refused.
    pub fn stop_listening(&self) {
        self.accept_loop.abort();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

pub struct ServerConnection {
    ws: WebSocketStream<TcpStream>,
    pub headers: HeaderMap,
}

impl ServerConnection {
    /// Next text frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Value {
        self.try_recv_json(WAIT)
            .await
            .expect("Timed out waiting for client message")
    }

    /// Next text frame within `within`, or `None`.
    pub async fn try_recv_json(&mut self, within: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let next = tokio::time::timeout_at(deadline, self.ws.next()).await.ok()??;
            match next.expect("Error receiving message") {
                Message::Text(text) => {
                    return Some(serde_json::from_str(text.as_str()).expect("Client sent non-JSON"));
                }
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Next client message on `path`, skipping heartbeats and anything else.
    pub async fn recv_path(&mut self, path: &str) -> Value {
        loop {
            let message = self.recv_json().await;
            if message["lwp"] == path {
                return message;
            }
        }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::text(value.to_string()))
            .await
            .expect("Failed to send message");
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::text(text.to_string()))
            .await
            .expect("Failed to send message");
    }

    /// Reply 200 to `request` with `body`, echoing its `mid`.
    pub async fn reply(&mut self, request: &Value, body: Value) {
        self.reply_with_code(request, 200, body).await;
    }

    pub async fn reply_with_code(&mut self, request: &Value, code: u16, body: Value) {
        self.send_json(json!({
            "headers": { "mid": request["headers"]["mid"] },
            "code": code,
            "body": body,
        }))
        .await;
    }

    /// Close the socket with a close frame.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Config pointing at `url` with the heartbeat off and fast reconnects.
pub fn test_config(url: &str) -> TransportConfig {
    TransportConfig {
        ws_url: url.to_string(),
        heartbeat_interval_ms: 0,
        reconnect_interval_ms: 50,
        max_reconnect_attempts: 3,
        request_timeout_ms: 2_000,
        ..Default::default()
    }
}

pub fn test_client(url: &str) -> TransportClient {
    TransportClient::new(test_config(url)).expect("Failed to build client")
}

/// Records the kinds of events a client emits, in order.
#[derive(Clone, Default)]
pub struct EventLog {
    kinds: Arc<Mutex<Vec<EventKind>>>,
}

impl EventLog {
    pub fn attach(client: &TransportClient, kinds: &[EventKind]) -> Self {
        let log = Self::default();
        for kind in kinds {
            let recorded = Arc::clone(&log.kinds);
            client.on(*kind, move |event| recorded.lock().unwrap().push(event.kind()));
        }
        log
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.kinds.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not met within {WAIT:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A decoded-chat-record payload, encoded the way the server sends it.
pub fn encoded_chat_record(text: &str) -> String {
    use MsgPackValue::{Integer, Map, String as Str};

    let message_data = Map(vec![
        (Integer(1.into()), Integer(1.into())),
        (
            Integer(3.into()),
            Map(vec![(Integer(2.into()), Str(text.into()))]),
        ),
    ]);
    let record = Map(vec![(
        Integer(1.into()),
        Map(vec![
            (Integer(1.into()), Str("sender@goofish".into())),
            (Integer(3.into()), Str("3000000000001.PNM".into())),
            (Integer(6.into()), message_data),
        ]),
    )]);

    let mut bytes = Vec::new();
    rmpv::encode::write_value(&mut bytes, &record).expect("encode msgpack");
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A `/s/sync` push frame carrying `records` as its data list.
pub fn sync_push(mid: &str, records: Vec<Value>) -> Value {
    json!({
        "lwp": "/s/sync",
        "headers": { "mid": mid, "sid": "server-sid" },
        "body": {
            "syncPushPackage": { "data": records, "hasMore": 0 }
        }
    })
}

//! WebSocket plumbing: opening the connection and pumping inbound frames.
//!
//! Both tasks here report back to the actor through a weak command sender and
//! tag every report with the connection generation they belong to, so the
//! actor can ignore anything from a socket it has already abandoned.

use crate::transport::actor::{Command, post};

use std::collections::BTreeMap;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Close code reported when the socket drops without a close frame.
pub(crate) const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when a close frame carries no status.
pub(crate) const NO_STATUS: u16 = 1005;
pub(crate) const NORMAL_CLOSURE: u16 = 1000;

/// Spawn the opening handshake for one connection attempt.
pub(crate) fn spawn_open(
    url: String,
    headers: BTreeMap<String, String>,
    generation: u64,
    commands: WeakUnboundedSender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let command = match open(&url, &headers).await {
            Ok(stream) => Command::Opened { generation, stream },
            Err(message) => Command::ConnectFailed {
                generation,
                message,
            },
        };
        post(&commands, command);
    })
}

async fn open(url: &str, headers: &BTreeMap<String, String>) -> Result<WsStream, String> {
    #[cfg(feature = "tls")]
    {
        // Err means a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    let mut request = url
        .into_client_request()
        .map_err(|e| format!("Invalid WebSocket request for {url}: {e}"))?;

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid header name {name:?}: {e}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("Invalid value for header {name}: {e}"))?;
        request.headers_mut().insert(name, value);
    }

    info!("Connecting to {url}");
    let (stream, response) = connect_async(request)
        .await
        .map_err(|e| format!("Failed to connect to {url}: {e}"))?;
    debug!("Handshake completed with status {}", response.status());

    Ok(stream)
}

/// Forward every text frame from `source` until the socket closes, then post
/// exactly one [`Command::Closed`].
pub(crate) fn spawn_reader(
    mut source: WsSource,
    generation: u64,
    commands: WeakUnboundedSender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut code = ABNORMAL_CLOSURE;
        let mut reason = String::from("Connection lost");

        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    post(
                        &commands,
                        Command::Inbound {
                            generation,
                            text: text.as_str().to_owned(),
                        },
                    );
                }
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => post(&commands, Command::Inbound { generation, text }),
                    Err(_) => warn!("Ignoring non-UTF-8 binary frame ({} bytes)", data.len()),
                },
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) => {
                            code = u16::from(frame.code);
                            reason = frame.reason.as_str().to_owned();
                        }
                        None => {
                            code = NO_STATUS;
                            reason.clear();
                        }
                    }
                    debug!("Server closed the socket: {code} {reason}");
                }
                Ok(_) => trace!("Control frame"),
                Err(e) => {
                    warn!("Socket read failed: {e}");
                    reason = e.to_string();
                    break;
                }
            }
        }

        post(
            &commands,
            Command::Closed {
                generation,
                code,
                reason,
            },
        );
    })
}

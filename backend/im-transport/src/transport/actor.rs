//! The transport actor.
//!
//! One task owns everything mutable about the connection: the write half of
//! the socket, the correlation table, the outbound queue and every timer.
//! Client calls, socket reads and timer expiries all arrive as [`Command`]s on
//! a single channel and are handled one at a time, so no two of them ever
//! interleave.
//!
//! The connection state is mirrored into an `Arc<RwLock<_>>` for cheap reads
//! from client handles.
//!
//! Helper tasks (handshake, reader, timers) hold only a weak sender. When the
//! last [`TransportClient`](crate::TransportClient) is dropped the channel
//! closes, the loop ends and the socket is torn down.

use crate::config::{ConnectOptions, TransportConfig, validate_ws_url};
use crate::error::{DecodeError, TransportError};
use crate::events::{EventBus, TransportEvent};
use crate::protocol::{Envelope, Frame};
use crate::push::decode_sync_push;
use crate::transport::connection_state::ConnectionState;
use crate::transport::correlation::{CorrelationTable, Responder};
use crate::transport::heartbeat::Heartbeat;
use crate::transport::queue::OutboundQueue;
use crate::transport::reconnect::ReconnectPolicy;
use crate::transport::socket::{self, ABNORMAL_CLOSURE, NORMAL_CLOSURE, WsSink, WsStream};
use crate::transport::timer::Timer;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub(crate) enum Command {
    // ---- from client handles ----
    Connect {
        url: Option<String>,
        options: ConnectOptions,
        responder: oneshot::Sender<Result<(), TransportError>>,
    },
    Send {
        envelope: Envelope,
        responder: Responder,
    },
    SendRaw(Envelope),
    Disconnect,
    Snapshot(oneshot::Sender<Snapshot>),

    // ---- from helper tasks ----
    Opened {
        generation: u64,
        stream: WsStream,
    },
    ConnectFailed {
        generation: u64,
        message: String,
    },
    Inbound {
        generation: u64,
        text: String,
    },
    Closed {
        generation: u64,
        code: u16,
        reason: String,
    },
    RequestTimeout {
        mid: String,
    },
    HeartbeatTick {
        generation: u64,
    },
    ReconnectDue,
}

/// Point-in-time view of actor-owned state.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) pending_requests: usize,
    pub(crate) queue_length: usize,
    pub(crate) config: TransportConfig,
}

/// Deliver `command` if the actor is still running.
pub(crate) fn post(commands: &WeakUnboundedSender<Command>, command: Command) {
    match commands.upgrade() {
        Some(tx) => {
            if tx.send(command).is_err() {
                trace!("Transport actor gone, dropping command");
            }
        }
        None => trace!("Transport actor gone, dropping command"),
    }
}

pub(crate) struct TransportActor {
    config: TransportConfig,
    url: String,
    bus: EventBus,
    state: Arc<RwLock<ConnectionState>>,
    commands: WeakUnboundedSender<Command>,

    /// Bumped on every attempt and on `disconnect()`; reports carrying an
    /// older value are stale.
    generation: u64,
    sink: Option<WsSink>,
    handshake: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    pending_connect: Option<oneshot::Sender<Result<(), TransportError>>>,

    correlation: CorrelationTable,
    queue: OutboundQueue,
    heartbeat: Option<Heartbeat>,
    reconnect: ReconnectPolicy,
    reconnect_timer: Option<Timer>,
    reconnecting: bool,
    manual_close: bool,
}

impl TransportActor {
    pub(crate) fn new(
        config: TransportConfig,
        bus: EventBus,
        state: Arc<RwLock<ConnectionState>>,
        commands: WeakUnboundedSender<Command>,
    ) -> Self {
        let reconnect =
            ReconnectPolicy::new(config.reconnect_interval(), config.max_reconnect_attempts);
        Self {
            url: config.ws_url.clone(),
            config,
            bus,
            state,
            commands,
            generation: 0,
            sink: None,
            handshake: None,
            reader: None,
            pending_connect: None,
            correlation: CorrelationTable::default(),
            queue: OutboundQueue::default(),
            heartbeat: None,
            reconnect,
            reconnect_timer: None,
            reconnecting: false,
            manual_close: false,
        }
    }

    /// Process commands until every client handle is dropped.
    pub(crate) async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        info!("Transport actor started");

        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }

        self.shutdown().await;
        info!("Transport actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect {
                url,
                options,
                responder,
            } => self.connect(url, options, responder).await,
            Command::Send {
                envelope,
                responder,
            } => self.send(envelope, responder).await,
            Command::SendRaw(envelope) => self.send_raw(envelope).await,
            Command::Disconnect => self.disconnect().await,
            Command::Snapshot(responder) => {
                let _ = responder.send(Snapshot {
                    pending_requests: self.correlation.len(),
                    queue_length: self.queue.len(),
                    config: self.config.clone(),
                });
            }
            Command::Opened { generation, stream } => self.opened(generation, stream).await,
            Command::ConnectFailed {
                generation,
                message,
            } => self.connect_failed(generation, message).await,
            Command::Inbound { generation, text } => {
                if generation == self.generation {
                    self.dispatch(&text).await;
                } else {
                    trace!("Dropping frame from stale connection {generation}");
                }
            }
            Command::Closed {
                generation,
                code,
                reason,
            } => self.closed(generation, code, reason).await,
            Command::RequestTimeout { mid } => {
                self.correlation.expire(&mid);
            }
            Command::HeartbeatTick { generation } => self.heartbeat(generation).await,
            Command::ReconnectDue => self.reconnect_due().await,
        }
    }

    // ============================================
    // CONNECTION LIFECYCLE
    // ============================================

    async fn connect(
        &mut self,
        url: Option<String>,
        options: ConnectOptions,
        responder: oneshot::Sender<Result<(), TransportError>>,
    ) {
        let current = *self.state.read().await;
        if current.is_usable() {
            let _ = responder.send(Err(TransportError::AlreadyConnected {
                message: format!("Connection is already {current}"),
                location: ErrorLocation::from(Location::caller()),
            }));
            return;
        }

        let mut config = self.config.clone();
        options.apply(&mut config);
        let url = url.unwrap_or_else(|| config.ws_url.clone());

        if let Err(e) = config
            .validate()
            .and_then(|()| validate_ws_url(&url).map(|_| ()))
        {
            let _ = responder.send(Err(TransportError::connect(e.to_string())));
            return;
        }

        self.reconnect =
            ReconnectPolicy::new(config.reconnect_interval(), config.max_reconnect_attempts);
        self.config = config;
        self.url = url;
        self.manual_close = false;
        self.reconnecting = false;
        self.reconnect_timer = None;

        if let Some(previous) = self.pending_connect.replace(responder) {
            let _ = previous.send(Err(TransportError::connection_closed(
                "Superseded by a newer connect",
            )));
        }

        self.start_attempt().await;
    }

    async fn start_attempt(&mut self) {
        self.generation += 1;
        self.set_state(ConnectionState::Connecting).await;
        debug!("Starting connection attempt {}", self.generation);
        self.handshake = Some(socket::spawn_open(
            self.url.clone(),
            self.config.headers.clone(),
            self.generation,
            self.commands.clone(),
        ));
    }

    async fn opened(&mut self, generation: u64, stream: WsStream) {
        if generation != self.generation {
            debug!("Discarding socket from stale attempt {generation}");
            return;
        }

        let (sink, source) = stream.split();
        self.handshake = None;
        self.sink = Some(sink);
        self.reader = Some(socket::spawn_reader(
            source,
            generation,
            self.commands.clone(),
        ));
        self.set_state(ConnectionState::Open).await;
        info!("Connected to {}", self.url);

        let attempt = self.reconnect.attempts();
        self.reconnect.reset();
        self.heartbeat = Heartbeat::start(
            self.config.heartbeat_interval(),
            generation,
            self.commands.clone(),
        );

        self.flush_queue().await;

        self.bus.emit(&TransportEvent::Open);
        if let Some(responder) = self.pending_connect.take() {
            let _ = responder.send(Ok(()));
        }
        if std::mem::take(&mut self.reconnecting) {
            info!("Reconnected after {attempt} attempt(s)");
            self.bus.emit(&TransportEvent::Reconnect(attempt));
        }
    }

    async fn connect_failed(&mut self, generation: u64, message: String) {
        if generation != self.generation {
            return;
        }

        self.handshake = None;
        self.set_state(ConnectionState::Disconnected).await;
        error!("{message}");
        self.bus
            .emit(&TransportEvent::Error(TransportError::connect(message.clone())));

        if let Some(responder) = self.pending_connect.take() {
            let _ = responder.send(Err(TransportError::connect(message.clone())));
        }

        // A handshake that never opened still counts as an unexpected close.
        self.bus.emit(&TransportEvent::Close {
            code: ABNORMAL_CLOSURE,
            reason: message,
        });

        if !self.manual_close && self.config.auto_reconnect {
            self.schedule_reconnect();
        }
    }

    async fn closed(&mut self, generation: u64, code: u16, reason: String) {
        if generation != self.generation {
            trace!("Ignoring close from stale connection {generation}");
            return;
        }

        info!("Connection closed: {code} {reason}");
        self.teardown_socket();
        self.set_state(ConnectionState::Disconnected).await;
        self.correlation.reject_all("Connection closed");
        self.bus.emit(&TransportEvent::Close { code, reason });

        if !self.manual_close && self.config.auto_reconnect {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect.next_delay() {
            Some(delay) => {
                info!(
                    "Reconnecting in {delay:?} (attempt {}/{})",
                    self.reconnect.attempts(),
                    self.reconnect.max_attempts()
                );
                let commands = self.commands.clone();
                self.reconnect_timer = Some(Timer::after(delay, move || {
                    post(&commands, Command::ReconnectDue);
                }));
            }
            None => {
                error!(
                    "Giving up after {} reconnect attempt(s)",
                    self.reconnect.attempts()
                );
                self.reconnecting = false;
                self.bus.emit(&TransportEvent::ReconnectFailed);
            }
        }
    }

    async fn reconnect_due(&mut self) {
        self.reconnect_timer = None;
        if self.manual_close || *self.state.read().await != ConnectionState::Disconnected {
            return;
        }
        self.reconnecting = true;
        self.start_attempt().await;
    }

    async fn disconnect(&mut self) {
        info!("Disconnecting");
        self.manual_close = true;
        self.reconnecting = false;
        self.reconnect_timer = None;
        self.heartbeat = None;

        // Invalidate whatever the current socket or handshake still reports.
        self.generation += 1;
        if let Some(handshake) = self.handshake.take() {
            handshake.abort();
        }
        if let Some(responder) = self.pending_connect.take() {
            let _ = responder.send(Err(TransportError::connection_closed(
                "Disconnected before the connection opened",
            )));
        }

        let was_open = self.sink.is_some();
        if let Some(mut sink) = self.sink.take() {
            self.set_state(ConnectionState::Closing).await;
            if let Err(e) = sink.close().await {
                debug!("Close frame not delivered: {e}");
            }
        }
        self.teardown_socket();
        self.set_state(ConnectionState::Disconnected).await;
        self.correlation.reject_all("Disconnected");

        if was_open {
            self.bus.emit(&TransportEvent::Close {
                code: NORMAL_CLOSURE,
                reason: "Client disconnect".to_string(),
            });
        }
    }

    fn teardown_socket(&mut self) {
        self.heartbeat = None;
        self.sink = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    async fn shutdown(&mut self) {
        if self.sink.is_some() || self.handshake.is_some() {
            self.disconnect().await;
        }
        self.correlation.reject_all("Transport dropped");
    }

    // ============================================
    // OUTBOUND
    // ============================================

    async fn send(&mut self, mut envelope: Envelope, responder: Responder) {
        if self.sink.is_none() {
            let _ = responder.send(Err(TransportError::not_connected(
                "WebSocket is not connected",
            )));
            return;
        }

        let mid = envelope.ensure_mid();
        if self.correlation.contains(&mid) {
            let _ = responder.send(Err(TransportError::DuplicateRequestId {
                message: format!("Request id {mid} is already pending"),
                location: ErrorLocation::from(Location::caller()),
            }));
            return;
        }

        let commands = self.commands.clone();
        let expired = mid.clone();
        let deadline = Timer::after(self.config.request_timeout(), move || {
            post(&commands, Command::RequestTimeout { mid: expired });
        });
        self.correlation
            .register(mid.clone(), envelope.lwp.clone(), responder, deadline);

        if let Err(e) = self.write(&envelope).await {
            warn!("Failed to send request {mid}: {e}");
            self.correlation.fail(&mid, e);
        }
    }

    async fn send_raw(&mut self, envelope: Envelope) {
        if self.sink.is_none() {
            debug!(
                "Queueing {} until connected",
                envelope.lwp.as_deref().unwrap_or("ack")
            );
            self.queue.push(envelope);
            return;
        }

        if let Err(e) = self.write(&envelope).await {
            error!("Failed to send message: {e}");
        }
    }

    async fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let queued = self.queue.drain();
        debug!("Flushing {} queued message(s)", queued.len());
        for envelope in queued {
            if let Err(e) = self.write(&envelope).await {
                error!("Failed to send queued message: {e}");
            }
        }
    }

    async fn heartbeat(&mut self, generation: u64) {
        if generation != self.generation || self.sink.is_none() {
            return;
        }
        match self.write(&Envelope::heartbeat()).await {
            Ok(()) => {
                self.bus.emit(&TransportEvent::Heartbeat);
            }
            Err(e) => warn!("Heartbeat failed: {e}"),
        }
    }

    async fn write(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| TransportError::not_connected("WebSocket is not connected"))?;
        let json = envelope.to_json()?;
        sink.send(Message::text(json)).await?;
        trace!("Sent {}", envelope.lwp.as_deref().unwrap_or("ack"));
        Ok(())
    }

    // ============================================
    // INBOUND
    // ============================================

    /// Route one inbound text frame.
    ///
    /// Every parsed frame is published as `message`. A frame whose `mid`
    /// matches a pending request settles it; otherwise a sync push is
    /// acknowledged, decoded and published as `sync-push`, and anything else
    /// is published as `unmatched`.
    async fn dispatch(&mut self, text: &str) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to parse inbound frame: {e}");
                self.bus
                    .emit(&TransportEvent::Error(TransportError::Decode(DecodeError::from(e))));
                return;
            }
        };

        trace!(
            "Received {} mid={:?} code={:?}",
            frame.lwp.as_deref().unwrap_or("-"),
            frame.mid(),
            frame.code
        );
        self.bus.emit(&TransportEvent::Message(frame.clone()));

        let Some(frame) = self.correlation.settle(frame) else {
            return;
        };

        if frame.is_sync_push() {
            self.send_raw(Envelope::ack(&frame)).await;
            let push = decode_sync_push(frame);
            self.bus.emit(&TransportEvent::SyncPush(push));
            return;
        }

        debug!(
            "No pending request for {} ({})",
            frame.mid().unwrap_or("no mid"),
            frame.lwp.as_deref().unwrap_or("-")
        );
        self.bus.emit(&TransportEvent::Unmatched(frame));
    }

    async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        if *state != next {
            trace!("Connection state {} -> {next}", *state);
            *state = next;
        }
    }
}

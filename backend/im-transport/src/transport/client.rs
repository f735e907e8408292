//! Public handle to the transport.

use crate::config::{ConnectOptions, TransportConfig};
use crate::error::{ConfigError, TransportError};
use crate::events::{EventBus, EventKind, SubscriptionId, TransportEvent};
use crate::protocol::{Envelope, Frame};
use crate::push::{FormattedMessage, SyncPush, format_message};
use crate::transport::actor::{Command, Snapshot, TransportActor};
use crate::transport::connection_state::ConnectionState;

use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{RwLock, oneshot};

type ActorSeed = (TransportActor, UnboundedReceiver<Command>);

/// Cloneable handle to one multiplexed IM connection.
///
/// All clones drive the same actor. The actor is spawned on the first call
/// made from inside a Tokio runtime and stops once every handle is dropped.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> Result<(), im_transport::CoreError> {
/// use im_transport::{ConnectOptions, Envelope, TransportClient, TransportConfig};
///
/// let client = TransportClient::new(TransportConfig::default())?;
/// client.connect(None, ConnectOptions::default()).await?;
/// let reply = client
///     .send(Envelope::new("/r/SyncStatus/getState").with_body(serde_json::json!([{"topic": "sync"}])))
///     .await?;
/// println!("{:?}", reply.body);
/// client.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransportClient {
    commands: UnboundedSender<Command>,
    seed: Arc<Mutex<Option<ActorSeed>>>,
    state: Arc<RwLock<ConnectionState>>,
    bus: EventBus,
}

impl TransportClient {
    /// Validate `config` and build a disconnected client.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let bus = EventBus::new();
        let actor = TransportActor::new(config, bus.clone(), Arc::clone(&state), tx.downgrade());

        Ok(Self {
            commands: tx,
            seed: Arc::new(Mutex::new(Some((actor, rx)))),
            state,
            bus,
        })
    }

    // ============================================
    // CONNECTION
    // ============================================

    /// Open the socket, at `url` or the configured one.
    ///
    /// Resolves once the socket is open and any queued messages are flushed.
    /// Fails with [`TransportError::AlreadyConnected`] while connecting or
    /// open. A failed initial attempt is returned here; with auto-reconnect on,
    /// the reconnect loop keeps trying in the background.
    pub async fn connect(
        &self,
        url: Option<&str>,
        options: ConnectOptions,
    ) -> Result<(), TransportError> {
        let (responder, reply) = oneshot::channel();
        self.post(Command::Connect {
            url: url.map(str::to_string),
            options,
            responder,
        })?;
        reply.await.map_err(|_| TransportError::actor_stopped())?
    }

    /// Close the socket on purpose.
    ///
    /// Cancels the heartbeat and any scheduled reconnect, and rejects every
    /// pending request with a connection-closed error. No reconnect follows.
    pub fn disconnect(&self) {
        if let Err(e) = self.post(Command::Disconnect) {
            warn!("Disconnect ignored: {e}");
        }
    }

    // ============================================
    // MESSAGING
    // ============================================

    /// Send a correlated request and wait for the matching frame.
    ///
    /// A `mid` is generated when the envelope has none. Resolves with the
    /// frame on status 200; any other status rejects with
    /// [`TransportError::RemoteStatus`] carrying the frame.
    pub async fn send(&self, envelope: Envelope) -> Result<Frame, TransportError> {
        let (responder, reply) = oneshot::channel();
        self.post(Command::Send {
            envelope,
            responder,
        })?;
        reply.await.map_err(|_| TransportError::actor_stopped())?
    }

    /// Fire-and-forget write. Queued until the next open when disconnected.
    pub fn send_raw(&self, envelope: Envelope) {
        if let Err(e) = self.post(Command::SendRaw(envelope)) {
            warn!("Message dropped: {e}");
        }
    }

    // ============================================
    // EVENTS
    // ============================================

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.bus.once(kind, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.bus.off(id)
    }

    /// Subscribe to acknowledged, decoded sync pushes.
    pub fn on_sync_push<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SyncPush) + Send + Sync + 'static,
    {
        self.bus.on(EventKind::SyncPush, move |event| {
            if let TransportEvent::SyncPush(push) = event {
                handler(push);
            }
        })
    }

    /// Subscribe to chat messages, one call per decoded push record.
    pub fn on_formatted_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(FormattedMessage) + Send + Sync + 'static,
    {
        self.on_sync_push(move |push| {
            for value in push.decoded_values() {
                handler(format_message(value));
            }
        })
    }

    // ============================================
    // STATE
    // ============================================

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    pub async fn pending_request_count(&self) -> Result<usize, TransportError> {
        Ok(self.snapshot().await?.pending_requests)
    }

    pub async fn queue_length(&self) -> Result<usize, TransportError> {
        Ok(self.snapshot().await?.queue_length)
    }

    /// Effective configuration, including overrides from the last `connect()`.
    pub async fn config(&self) -> Result<TransportConfig, TransportError> {
        Ok(self.snapshot().await?.config)
    }

    async fn snapshot(&self) -> Result<Snapshot, TransportError> {
        let (responder, reply) = oneshot::channel();
        self.post(Command::Snapshot(responder))?;
        reply.await.map_err(|_| TransportError::actor_stopped())
    }

    fn post(&self, command: Command) -> Result<(), TransportError> {
        self.ensure_actor();
        self.commands
            .send(command)
            .map_err(|_| TransportError::actor_stopped())
    }

    /// Spawn the actor on first use inside a runtime.
    ///
    /// Outside a runtime commands stay buffered in the channel until a later
    /// call spawns it.
    fn ensure_actor(&self) {
        let mut seed = self
            .seed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if seed.is_none() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        if let Some((actor, rx)) = seed.take() {
            runtime.spawn(actor.run(rx));
            info!("Transport actor spawned");
        }
    }
}

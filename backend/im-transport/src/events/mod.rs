//! Publish/subscribe for transport lifecycle and message events.
//!
//! Subscribers register per [`EventKind`] and are called synchronously, in
//! registration order, from the transport actor. A subscriber that panics is
//! isolated: the panic is logged and delivery continues with the next one.
//!
//! Handlers run on the actor task. They may call non-suspending client
//! methods (`send_raw`, `disconnect`, `on`, `off`) but must not block.

use crate::error::TransportError;
use crate::protocol::Frame;
use crate::push::SyncPush;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, trace};
use uuid::Uuid;

/// Everything the transport reports to subscribers.
#[derive(Debug)]
pub enum TransportEvent {
    Open,
    Close { code: u16, reason: String },
    Error(TransportError),
    /// Every parsed inbound frame, before correlation.
    Message(Frame),
    /// A reconnect succeeded on the given attempt number.
    Reconnect(u32),
    /// The attempt cap was reached. Terminal until the next `connect()`.
    ReconnectFailed,
    Heartbeat,
    /// An acknowledged sync push with its records decoded.
    SyncPush(SyncPush),
    /// A frame that matched no pending request and is not a push.
    Unmatched(Frame),
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Open => EventKind::Open,
            TransportEvent::Close { .. } => EventKind::Close,
            TransportEvent::Error(_) => EventKind::Error,
            TransportEvent::Message(_) => EventKind::Message,
            TransportEvent::Reconnect(_) => EventKind::Reconnect,
            TransportEvent::ReconnectFailed => EventKind::ReconnectFailed,
            TransportEvent::Heartbeat => EventKind::Heartbeat,
            TransportEvent::SyncPush(_) => EventKind::SyncPush,
            TransportEvent::Unmatched(_) => EventKind::Unmatched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Error,
    Message,
    Reconnect,
    ReconnectFailed,
    Heartbeat,
    SyncPush,
    Unmatched,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Error => "error",
            EventKind::Message => "message",
            EventKind::Reconnect => "reconnect",
            EventKind::ReconnectFailed => "reconnect-failed",
            EventKind::Heartbeat => "heartbeat",
            EventKind::SyncPush => "sync-push",
            EventKind::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`EventBus::on`]; pass it to [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

type Handler = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
    once: bool,
}

/// Event-kind to ordered subscriber list.
///
/// `Clone` shares the registry; the client and its actor hold the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<HashMap<EventKind, Vec<Subscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to every future event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.insert(kind, Arc::new(handler), false)
    }

    /// Subscribe `handler` to the next event of `kind` only.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.insert(kind, Arc::new(handler), true)
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        for subscribers in registry.values_mut() {
            if let Some(index) = subscribers.iter().position(|s| s.id == id) {
                subscribers.remove(index);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Returns how many subscribers completed without panicking.
    pub fn emit(&self, event: &TransportEvent) -> usize {
        let kind = event.kind();

        // Snapshot under the lock, call without it so handlers may (un)subscribe.
        let targets: Vec<Subscriber> = {
            let mut registry = self.lock();
            let Some(subscribers) = registry.get_mut(&kind) else {
                return 0;
            };
            let snapshot = subscribers.clone();
            subscribers.retain(|s| !s.once);
            snapshot
        };

        trace!("Emitting {kind} to {} subscriber(s)", targets.len());

        let mut delivered = 0;
        for subscriber in targets {
            let handler = subscriber.handler;
            match catch_unwind(AssertUnwindSafe(|| (*handler)(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        "Event subscriber panicked [{kind}]: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    fn insert(&self, kind: EventKind, handler: Handler, once: bool) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.lock().entry(kind).or_default().push(Subscriber { id, handler, once });
        id
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Subscriber>>> {
        // Handlers never run under this lock; a poisoned map is still consistent.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

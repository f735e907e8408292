//! Pending correlated requests keyed by `mid`.
//!
//! Every entry is settled at most once: whichever of frame arrival, deadline
//! or teardown removes it first wins, and later attempts find nothing.

use crate::error::TransportError;
use crate::protocol::Frame;
use crate::transport::timer::Timer;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;

use log::{debug, trace, warn};
use tokio::sync::oneshot;

pub(crate) type Responder = oneshot::Sender<Result<Frame, TransportError>>;

struct PendingRequest {
    path: Option<String>,
    responder: Responder,
    // Dropped with the entry, which cancels the deadline.
    _deadline: Timer,
}

impl PendingRequest {
    fn settle(self, result: Result<Frame, TransportError>) {
        if self.responder.send(result).is_err() {
            trace!("Caller stopped waiting before settlement");
        }
    }
}

#[derive(Default)]
pub(crate) struct CorrelationTable {
    pending: HashMap<String, PendingRequest>,
}

impl CorrelationTable {
    pub(crate) fn contains(&self, mid: &str) -> bool {
        self.pending.contains_key(mid)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Register a request before it is written to the socket.
    ///
    /// The caller checks [`contains`](Self::contains) first; an existing entry
    /// under the same id is never overwritten.
    pub(crate) fn register(
        &mut self,
        mid: String,
        path: Option<String>,
        responder: Responder,
        deadline: Timer,
    ) {
        if self.pending.contains_key(&mid) {
            warn!("Refusing to overwrite pending request {mid}");
            let _ = responder.send(Err(TransportError::DuplicateRequestId {
                message: format!("Request id {mid} is already pending"),
                location: ErrorLocation::from(Location::caller()),
            }));
            return;
        }

        self.pending.insert(
            mid,
            PendingRequest {
                path,
                responder,
                _deadline: deadline,
            },
        );
    }

    /// Settle the entry matching `frame`'s `mid`.
    ///
    /// Returns the frame back when nothing was pending under its id.
    pub(crate) fn settle(&mut self, frame: Frame) -> Option<Frame> {
        let Some(entry) = frame.mid().and_then(|mid| self.pending.remove(mid)) else {
            return Some(frame);
        };

        debug!(
            "Settling request {} ({}) with code {:?}",
            frame.mid().unwrap_or_default(),
            entry.path.as_deref().unwrap_or("-"),
            frame.code
        );

        if frame.is_ok() {
            entry.settle(Ok(frame));
        } else {
            let path = entry.path.as_deref().unwrap_or("-");
            match frame.status() {
                Some(status) if status.is_server_error() => {
                    warn!("Server failed request {path}: {status}")
                }
                Some(status) if status.is_client_error() => {
                    debug!("Server rejected request {path}: {status}")
                }
                status => debug!("Request {path} settled with status {status:?}"),
            }
            entry.settle(Err(TransportError::RemoteStatus {
                code: frame.code,
                frame: Box::new(frame),
                location: ErrorLocation::from(Location::caller()),
            }));
        }
        None
    }

    /// Reject the entry for `mid` with a timeout. `false` if already settled.
    pub(crate) fn expire(&mut self, mid: &str) -> bool {
        let Some(entry) = self.pending.remove(mid) else {
            return false;
        };

        let path = entry.path.clone().unwrap_or_default();
        warn!("Request {mid} timed out: {path}");
        entry.settle(Err(TransportError::Timeout {
            message: format!("Request timed out: {path}"),
            location: ErrorLocation::from(Location::caller()),
        }));
        true
    }

    /// Reject the entry for `mid` with `error`. `false` if already settled.
    pub(crate) fn fail(&mut self, mid: &str, error: TransportError) -> bool {
        match self.pending.remove(mid) {
            Some(entry) => {
                entry.settle(Err(error));
                true
            }
            None => false,
        }
    }

    /// Reject every outstanding entry with a connection-closed error.
    pub(crate) fn reject_all(&mut self, reason: &str) -> usize {
        let count = self.pending.len();
        for (mid, entry) in self.pending.drain() {
            trace!("Rejecting pending request {mid}: {reason}");
            entry.settle(Err(TransportError::connection_closed(reason)));
        }
        if count > 0 {
            debug!("Rejected {count} pending request(s): {reason}");
        }
        count
    }
}

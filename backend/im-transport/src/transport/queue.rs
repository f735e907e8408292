//! Fire-and-forget envelopes written while no socket is open.

use crate::protocol::Envelope;

use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct OutboundQueue {
    envelopes: VecDeque<Envelope>,
}

impl OutboundQueue {
    pub(crate) fn push(&mut self, envelope: Envelope) {
        self.envelopes.push_back(envelope);
    }

    /// Take everything in FIFO order, leaving the queue empty.
    pub(crate) fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.envelopes).into()
    }

    pub(crate) fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

//! Bounded fixed-interval reconnection.

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};

pub(crate) struct ReconnectPolicy {
    backoff: Constant,
    attempts: u32,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub(crate) fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            backoff: Constant::new(interval),
            attempts: 0,
            max_attempts,
        }
    }

    /// Delay before the next attempt, or `None` once the cap is reached.
    ///
    /// Counts the attempt when it returns `Some`.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        self.backoff.next_backoff()
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.backoff.reset();
    }
}

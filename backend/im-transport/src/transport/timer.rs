//! Scheduled work owned by a single holder.
//!
//! A [`Timer`] wraps the spawned task that performs the wait. Dropping the
//! timer aborts the task, so removing a timer from wherever it is stored
//! (pending request, heartbeat slot, reconnect slot) is the cancellation.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};

pub(crate) struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Run `fire` once after `delay`.
    pub(crate) fn after<F>(delay: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            fire();
        });
        Self { handle }
    }

    /// Run `tick` every `period`, first one `period` from now.
    pub(crate) fn every<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick();
            }
        });
        Self { handle }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

//! Keep-alive ticks while a socket is open.

use crate::transport::actor::{Command, post};
use crate::transport::timer::Timer;

use std::time::Duration;

use log::debug;
use tokio::sync::mpsc::WeakUnboundedSender;

/// Posts [`Command::HeartbeatTick`] every interval for one connection attempt.
///
/// Dropping the supervisor stops the ticks.
pub(crate) struct Heartbeat {
    _timer: Timer,
}

impl Heartbeat {
    /// `None` when `interval` is `None` (heartbeat disabled).
    pub(crate) fn start(
        interval: Option<Duration>,
        generation: u64,
        commands: WeakUnboundedSender<Command>,
    ) -> Option<Self> {
        let interval = interval?;
        debug!("Starting heartbeat every {interval:?}");
        let timer = Timer::every(interval, move || {
            post(&commands, Command::HeartbeatTick { generation });
        });
        Some(Self { _timer: timer })
    }
}

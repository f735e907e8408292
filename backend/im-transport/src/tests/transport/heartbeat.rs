use crate::transport::{Command, Heartbeat};

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};

fn tick_generations(commands: &mut UnboundedReceiver<Command>) -> Vec<u64> {
    let mut generations = Vec::new();
    while let Ok(command) = commands.try_recv() {
        if let Command::HeartbeatTick { generation } = command {
            generations.push(generation);
        }
    }
    generations
}

/// **VALUE**: No interval means no supervisor at all.
#[tokio::test]
async fn given_no_interval_when_started_then_disabled() {
    let (tx, _rx) = mpsc::unbounded_channel();

    assert!(Heartbeat::start(None, 1, tx.downgrade()).is_none());
}

/// **VALUE**: Ticks are tagged with the generation they were started for.
///
/// **BUG THIS CATCHES**: Would catch ticks from an old socket being
/// indistinguishable from the current one after a reconnect.
#[tokio::test(start_paused = true)]
async fn given_running_heartbeat_when_periods_elapse_then_ticks_carry_generation() {
    // GIVEN
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _heartbeat = Heartbeat::start(Some(Duration::from_millis(100)), 7, tx.downgrade());

    // WHEN
    tokio::time::sleep(Duration::from_millis(250)).await;

    // THEN
    assert_eq!(tick_generations(&mut rx), vec![7, 7]);
}

/// **VALUE**: Dropping the supervisor stops the ticks.
///
/// **WHY THIS MATTERS**: The actor drops it on close; a surviving timer would
/// keep writing keep-alives for a socket that no longer exists.
#[tokio::test(start_paused = true)]
async fn given_running_heartbeat_when_dropped_then_no_more_ticks() {
    // GIVEN
    let (tx, mut rx) = mpsc::unbounded_channel();
    let heartbeat = Heartbeat::start(Some(Duration::from_millis(100)), 3, tx.downgrade());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(tick_generations(&mut rx), vec![3]);

    // WHEN
    drop(heartbeat);
    tokio::time::sleep(Duration::from_millis(500)).await;

    // THEN
    assert!(tick_generations(&mut rx).is_empty());
}

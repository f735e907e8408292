use crate::transport::Timer;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// **VALUE**: Dropping a timer before it fires cancels it.
///
/// **WHY THIS MATTERS**: Request deadlines are cancelled by dropping them
/// when a reply arrives; a stray expiry would reject the next request that
/// happens to reuse the slot.
#[tokio::test(start_paused = true)]
async fn given_pending_timer_when_dropped_then_never_fires() {
    // GIVEN
    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&fired);
    let timer = Timer::after(Duration::from_millis(100), move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    // WHEN
    drop(timer);
    tokio::time::sleep(Duration::from_millis(500)).await;

    // THEN
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

/// **VALUE**: A repeating timer first fires one period after start.
///
/// **BUG THIS CATCHES**: Would catch `tokio::time::interval` semantics
/// (immediate first tick) sending a heartbeat the instant the socket opens.
#[tokio::test(start_paused = true)]
async fn given_repeating_timer_when_time_advances_then_ticks_once_per_period() {
    // GIVEN
    let ticks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&ticks);
    let _timer = Timer::every(Duration::from_millis(100), move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    // WHEN / THEN
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(260)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
}

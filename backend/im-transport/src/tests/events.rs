use crate::events::{EventBus, EventKind, TransportEvent};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// **VALUE**: Subscribers of a kind run in registration order.
#[test]
fn given_two_subscribers_when_emitted_then_called_in_registration_order() {
    // GIVEN
    let bus = EventBus::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second"] {
        let calls = Arc::clone(&calls);
        bus.on(EventKind::Open, move |_| calls.lock().unwrap().push(name));
    }

    // WHEN
    let delivered = bus.emit(&TransportEvent::Open);

    // THEN
    assert_eq!(delivered, 2);
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
}

/// **VALUE**: Events only reach subscribers of their own kind.
#[test]
fn given_subscriber_of_other_kind_when_emitted_then_not_called() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    bus.on(EventKind::Close, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(bus.emit(&TransportEvent::Heartbeat), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// **VALUE**: A `once` subscriber fires a single time.
///
/// **BUG THIS CATCHES**: Would catch once-subscriptions not being removed
/// before delivery, firing again on the next event.
#[test]
fn given_once_subscriber_when_emitted_twice_then_called_once() {
    // GIVEN
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    bus.once(EventKind::Reconnect, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    // WHEN
    bus.emit(&TransportEvent::Reconnect(1));
    bus.emit(&TransportEvent::Reconnect(2));

    // THEN
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(EventKind::Reconnect), 0);
}

/// **VALUE**: `off` removes exactly the given subscription.
#[test]
fn given_subscription_when_off_called_then_no_longer_delivered() {
    // GIVEN
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let id = bus.on(EventKind::Heartbeat, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    bus.on(EventKind::Heartbeat, |_| {});

    // WHEN
    let removed = bus.off(id);
    bus.emit(&TransportEvent::Heartbeat);

    // THEN
    assert!(removed);
    assert!(!bus.off(id), "Second off() should report already removed");
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(bus.subscriber_count(EventKind::Heartbeat), 1);
}

/// **VALUE**: A panicking subscriber does not stop delivery to later ones.
///
/// **WHY THIS MATTERS**: Subscribers run on the actor task; an escaping panic
/// would kill the connection for every caller.
///
/// **BUG THIS CATCHES**: Would catch removal of the unwind guard around
/// handler calls.
#[test]
fn given_panicking_subscriber_when_emitted_then_later_subscribers_still_called() {
    // GIVEN
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    bus.on(EventKind::Open, |_| panic!("subscriber failure"));
    let seen = Arc::clone(&count);
    bus.on(EventKind::Open, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    // WHEN
    let delivered = bus.emit(&TransportEvent::Open);

    // THEN
    assert_eq!(delivered, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// **VALUE**: A handler may subscribe from inside a delivery without deadlock.
#[test]
fn given_handler_that_subscribes_when_emitted_then_does_not_deadlock() {
    let bus = EventBus::new();
    let inner = bus.clone();
    bus.on(EventKind::Open, move |_| {
        inner.on(EventKind::Close, |_| {});
    });

    bus.emit(&TransportEvent::Open);

    assert_eq!(bus.subscriber_count(EventKind::Close), 1);
}

#[test]
fn given_event_kinds_when_displayed_then_use_wire_names() {
    assert_eq!(EventKind::ReconnectFailed.to_string(), "reconnect-failed");
    assert_eq!(EventKind::SyncPush.as_str(), "sync-push");
    assert_eq!(TransportEvent::Close { code: 1000, reason: String::new() }.kind(), EventKind::Close);
}

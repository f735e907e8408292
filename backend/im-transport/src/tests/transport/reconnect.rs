use crate::transport::ReconnectPolicy;

use std::time::Duration;

/// **VALUE**: The policy yields exactly `max_attempts` fixed delays, then stops.
///
/// **WHY THIS MATTERS**: `reconnect-failed` is emitted when this returns
/// `None`; an extra attempt or an early stop changes when users are told.
#[test]
fn given_max_two_when_next_delay_called_repeatedly_then_two_delays_then_none() {
    // GIVEN
    let mut policy = ReconnectPolicy::new(Duration::from_millis(50), 2);

    // WHEN / THEN
    assert_eq!(policy.next_delay(), Some(Duration::from_millis(50)));
    assert_eq!(policy.next_delay(), Some(Duration::from_millis(50)));
    assert_eq!(policy.next_delay(), None);
    assert_eq!(policy.attempts(), 2);
}

/// **VALUE**: Reset after a successful reconnect restores the full budget.
#[test]
fn given_exhausted_policy_when_reset_then_attempts_available_again() {
    let mut policy = ReconnectPolicy::new(Duration::from_millis(10), 1);
    policy.next_delay();
    assert_eq!(policy.next_delay(), None);

    policy.reset();

    assert_eq!(policy.attempts(), 0);
    assert!(policy.next_delay().is_some());
}

#[test]
fn given_zero_max_when_next_delay_called_then_none_immediately() {
    let mut policy = ReconnectPolicy::new(Duration::from_millis(10), 0);

    assert_eq!(policy.next_delay(), None);
    assert_eq!(policy.max_attempts(), 0);
}

use crate::error::TransportError;
use crate::protocol::Frame;
use crate::transport::{CorrelationTable, Timer};

use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;

fn idle_deadline() -> Timer {
    Timer::after(Duration::from_secs(3600), || {})
}

fn frame(mid: &str, code: u16) -> Frame {
    Frame {
        headers: json!({ "mid": mid }).as_object().cloned().unwrap(),
        code: Some(code),
        body: Some(json!({ "ok": true })),
        ..Default::default()
    }
}

/// **VALUE**: A 200 frame resolves the matching request with the frame.
#[tokio::test]
async fn given_pending_request_when_200_frame_settles_then_resolves_with_frame() {
    // GIVEN
    let mut table = CorrelationTable::default();
    let (tx, rx) = oneshot::channel();
    table.register("1 0".to_string(), Some("/r/Test".to_string()), tx, idle_deadline());

    // WHEN
    let leftover = table.settle(frame("1 0", 200));

    // THEN
    assert!(leftover.is_none());
    assert_eq!(table.len(), 0);
    let reply = rx.await.unwrap().unwrap();
    assert_eq!(reply.body, Some(json!({ "ok": true })));
}

/// **VALUE**: A non-200 frame rejects with the status and the frame attached.
///
/// **BUG THIS CATCHES**: Would catch error frames resolving as success, which
/// hides auth failures from the registration step.
#[tokio::test]
async fn given_pending_request_when_401_frame_settles_then_remote_status_error() {
    let mut table = CorrelationTable::default();
    let (tx, rx) = oneshot::channel();
    table.register("2 0".to_string(), None, tx, idle_deadline());

    table.settle(frame("2 0", 401));

    match rx.await.unwrap() {
        Err(TransportError::RemoteStatus { code, frame, .. }) => {
            assert_eq!(code, Some(401));
            assert_eq!(frame.mid(), Some("2 0"));
        }
        other => panic!("Expected RemoteStatus, got {other:?}"),
    }
}

/// **VALUE**: A frame with an unknown id is handed back to the caller.
#[tokio::test]
async fn given_unknown_mid_when_settled_then_frame_returned() {
    let mut table = CorrelationTable::default();

    let leftover = table.settle(frame("nobody 0", 200));

    assert_eq!(leftover.unwrap().mid(), Some("nobody 0"));
}

/// **VALUE**: An expired request is rejected once and a late frame is orphaned.
///
/// **WHY THIS MATTERS**: Requests must settle at most once; a late reply must
/// not resurrect a request the caller has already given up on.
///
/// **BUG THIS CATCHES**: Would catch expiry leaving the entry in place, so
/// the late frame resolves an already-rejected request.
#[tokio::test]
async fn given_expired_request_when_late_frame_arrives_then_frame_is_unmatched() {
    // GIVEN
    let mut table = CorrelationTable::default();
    let (tx, rx) = oneshot::channel();
    table.register("3 0".to_string(), Some("/r/Slow".to_string()), tx, idle_deadline());

    // WHEN
    let expired = table.expire("3 0");
    let expired_again = table.expire("3 0");
    let late = table.settle(frame("3 0", 200));

    // THEN
    assert!(expired);
    assert!(!expired_again);
    assert!(late.is_some());
    let error = rx.await.unwrap().unwrap_err();
    assert!(error.is_timeout());
    assert!(error.to_string().contains("/r/Slow"));
}

/// **VALUE**: Teardown rejects every pending request with connection-closed.
#[tokio::test]
async fn given_pending_requests_when_reject_all_called_then_each_connection_closed() {
    // GIVEN
    let mut table = CorrelationTable::default();
    let mut receivers = Vec::new();
    for i in 0..3 {
        let (tx, rx) = oneshot::channel();
        table.register(format!("{i} 0"), None, tx, idle_deadline());
        receivers.push(rx);
    }

    // WHEN
    let rejected = table.reject_all("Connection closed");

    // THEN
    assert_eq!(rejected, 3);
    assert_eq!(table.len(), 0);
    for rx in receivers {
        assert!(rx.await.unwrap().unwrap_err().is_connection_closed());
    }
}

/// **VALUE**: Registering an id that is already pending leaves the first
/// request untouched.
///
/// **BUG THIS CATCHES**: Would catch a HashMap insert silently replacing the
/// first caller's responder, leaving it waiting until its deadline.
#[tokio::test]
async fn given_pending_id_when_registered_again_then_second_rejected_first_kept() {
    // GIVEN
    let mut table = CorrelationTable::default();
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    table.register("dup 0".to_string(), None, first_tx, idle_deadline());

    // WHEN
    table.register("dup 0".to_string(), None, second_tx, idle_deadline());
    table.settle(frame("dup 0", 200));

    // THEN
    assert!(matches!(
        second_rx.await.unwrap(),
        Err(TransportError::DuplicateRequestId { .. })
    ));
    assert!(first_rx.await.unwrap().is_ok());
}

/// **VALUE**: `fail` rejects with the given error and reports whether it did.
#[tokio::test]
async fn given_pending_request_when_failed_then_error_delivered_once() {
    let mut table = CorrelationTable::default();
    let (tx, rx) = oneshot::channel();
    table.register("4 0".to_string(), None, tx, idle_deadline());

    assert!(table.fail("4 0", TransportError::connection_closed("write failed")));
    assert!(!table.fail("4 0", TransportError::connection_closed("write failed")));
    assert!(rx.await.unwrap().is_err());
}

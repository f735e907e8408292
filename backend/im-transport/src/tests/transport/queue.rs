use crate::protocol::Envelope;
use crate::transport::OutboundQueue;

/// **VALUE**: Drain returns envelopes in the order they were queued and
/// empties the queue.
///
/// **BUG THIS CATCHES**: Would catch a stack (LIFO) or a drain that leaves
/// the queue populated, which would resend on every reconnect.
#[test]
fn given_three_queued_envelopes_when_drained_then_fifo_order_and_empty() {
    // GIVEN
    let mut queue = OutboundQueue::default();
    for path in ["/a", "/b", "/c"] {
        queue.push(Envelope::new(path));
    }
    assert_eq!(queue.len(), 3);

    // WHEN
    let drained = queue.drain();

    // THEN
    let paths: Vec<_> = drained.iter().filter_map(|e| e.lwp.as_deref()).collect();
    assert_eq!(paths, vec!["/a", "/b", "/c"]);
    assert!(queue.is_empty());
}

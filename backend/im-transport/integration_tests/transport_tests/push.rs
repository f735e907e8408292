use crate::transport_tests::helpers::{
    EventLog, MockServer, encoded_chat_record, sync_push, test_client, wait_until,
};

use im_transport::push::{FormattedMessage, SyncPush};
use im_transport::{ConnectOptions, EventKind};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

/// **VALUE**: A sync push is acknowledged exactly once, however many
/// subscribers are listening.
///
/// **WHY THIS MATTERS**: The server redelivers unacknowledged pushes; a
/// missing ack duplicates messages and a double ack confuses its cursor.
///
/// **BUG THIS CATCHES**: Would catch the ack being sent from inside the
/// subscriber fan-out (once per subscriber) or only when someone subscribed.
#[tokio::test]
async fn given_two_push_subscribers_when_push_arrives_then_single_ack_and_both_notified() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let received: Arc<Mutex<Vec<SyncPush>>> = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let received = Arc::clone(&received);
        client.on_sync_push(move |push| received.lock().unwrap().push(push.clone()));
    }
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    // WHEN
    conn.send_json(sync_push(
        "push-1 0",
        vec![json!({ "bizType": 40, "data": encoded_chat_record("hi") })],
    ))
    .await;

    // THEN
    let ack = conn.recv_json().await;
    assert_eq!(ack["code"], json!(200));
    assert_eq!(ack["headers"]["mid"], json!("push-1 0"));
    assert_eq!(ack["headers"]["sid"], json!("server-sid"));
    assert!(ack.get("lwp").is_none());
    assert!(
        conn.try_recv_json(Duration::from_millis(200)).await.is_none(),
        "Push must be acknowledged only once"
    );

    wait_until(|| received.lock().unwrap().len() == 2).await;
    let pushes = received.lock().unwrap();
    assert_eq!(pushes[0].items.len(), 1);
    assert!(pushes[0].items[0].is_decoded());
}

/// **VALUE**: Pushes are acknowledged even when nobody subscribed.
#[tokio::test]
async fn given_no_subscribers_when_push_arrives_then_still_acknowledged() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    conn.send_json(sync_push("push-2 0", vec![])).await;

    let ack = conn.recv_json().await;
    assert_eq!(ack["headers"]["mid"], json!("push-2 0"));
}

/// **VALUE**: One bad record in a push does not hide its neighbours.
#[tokio::test]
async fn given_mixed_records_when_push_arrives_then_items_aligned_with_records() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let received: Arc<Mutex<Option<SyncPush>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&received);
    client.on_sync_push(move |push| *slot.lock().unwrap() = Some(push.clone()));
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    // WHEN
    conn.send_json(sync_push(
        "push-3 0",
        vec![
            json!({ "data": encoded_chat_record("one") }),
            json!({ "data": "@@invalid@@" }),
            json!({ "data": encoded_chat_record("three") }),
        ],
    ))
    .await;

    // THEN
    wait_until(|| received.lock().unwrap().is_some()).await;
    let push = received.lock().unwrap().clone().unwrap();
    let outcome: Vec<bool> = push.items.iter().map(|item| item.is_decoded()).collect();
    assert_eq!(outcome, vec![true, false, true]);
}

/// **VALUE**: Formatted-message subscribers get one flat message per record.
#[tokio::test]
async fn given_chat_push_when_arrives_then_formatted_messages_delivered() {
    // GIVEN
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let messages: Arc<Mutex<Vec<FormattedMessage>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    client.on_formatted_message(move |message| sink.lock().unwrap().push(message));
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    // WHEN
    conn.send_json(sync_push(
        "push-4 0",
        vec![
            json!({ "data": encoded_chat_record("hello") }),
            json!({ "data": encoded_chat_record("world") }),
        ],
    ))
    .await;

    // THEN
    wait_until(|| messages.lock().unwrap().len() == 2).await;
    let messages = messages.lock().unwrap();
    assert_eq!(messages[0].text.as_deref(), Some("hello"));
    assert_eq!(messages[1].text.as_deref(), Some("world"));
    assert_eq!(messages[0].sender_id.as_deref(), Some("sender@goofish"));
}

/// **VALUE**: A push is not reported as unmatched.
#[tokio::test]
async fn given_push_without_pending_request_when_arrives_then_not_unmatched() {
    let mut server = MockServer::start().await;
    let client = test_client(&server.url);
    let events = EventLog::attach(
        &client,
        &[EventKind::Message, EventKind::SyncPush, EventKind::Unmatched],
    );
    client.connect(None, ConnectOptions::default()).await.unwrap();
    let mut conn = server.accept().await;

    conn.send_json(sync_push("push-5 0", vec![])).await;

    wait_until(|| events.count(EventKind::SyncPush) == 1).await;
    assert_eq!(events.kinds(), vec![EventKind::Message, EventKind::SyncPush]);
}

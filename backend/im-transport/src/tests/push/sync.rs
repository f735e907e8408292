use crate::error::DecodeError;
use crate::protocol::Frame;
use crate::push::{SyncMessageData, decode_items, decode_sync_push};
use crate::tests::{chat_record, encode_record};

use serde_json::json;

fn push_frame(records: serde_json::Value) -> Frame {
    Frame {
        lwp: Some("/s/sync".to_string()),
        body: Some(json!({
            "syncPushPackage": { "data": records, "hasMore": 0, "maxPts": 10 },
            "syncExtensionModel": { "reconnectType": 0 }
        })),
        ..Default::default()
    }
}

/// **VALUE**: Mixed valid and invalid records yield one aligned item each.
///
/// **WHY THIS MATTERS**: One corrupt record must not hide the messages around it.
///
/// **BUG THIS CATCHES**: Would catch decoding that aborts on the first failure
/// or that drops failed items and shifts the rest out of position.
#[test]
fn given_valid_invalid_valid_records_when_decoded_then_three_aligned_items() {
    // GIVEN
    let frame = push_frame(json!([
        { "bizType": 40, "data": encode_record(&[chat_record("first")]) },
        { "bizType": 40, "data": "%%%" },
        { "bizType": 40, "data": encode_record(&[chat_record("third")]) },
    ]));

    // WHEN
    let push = decode_sync_push(frame);

    // THEN
    assert_eq!(push.items.len(), 3);
    assert!(push.items[0].is_decoded());
    assert!(matches!(push.items[1].error, Some(DecodeError::Base64 { .. })));
    assert!(push.items[1].decoded.is_none());
    assert!(push.items[2].is_decoded());
    assert_eq!(push.items[2].raw.data.as_deref(), Some(encode_record(&[chat_record("third")]).as_str()));
    assert_eq!(push.decoded_values().count(), 2);
}

/// **VALUE**: A record without `data` becomes a missing-data error item.
#[test]
fn given_record_without_data_when_decoded_then_missing_data_item() {
    let items = decode_items(&[SyncMessageData {
        biz_type: Some(40),
        ..Default::default()
    }]);

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0].error, Some(DecodeError::MissingData { .. })));
}

/// **VALUE**: Package cursors are exposed on the typed body.
#[test]
fn given_push_body_when_decoded_then_package_fields_available() {
    let push = decode_sync_push(push_frame(json!([])));

    let package = push.package().unwrap();
    assert_eq!(package.max_pts, Some(10));
    assert!(!package.has_more());
    assert!(push.items.is_empty());
    assert_eq!(push.body.sync_extension_model.unwrap().reconnect_type, Some(0));
}

/// **VALUE**: A push without a body decodes to no items rather than failing.
#[test]
fn given_push_without_body_when_decoded_then_no_items() {
    let frame = Frame {
        lwp: Some("/s/sync".to_string()),
        ..Default::default()
    };

    let push = decode_sync_push(frame);

    assert!(push.items.is_empty());
    assert!(push.package().is_none());
}

/// **VALUE**: Fields with unexpected types cost only that field: cursors,
/// raw record fields and record payloads all survive.
///
/// **WHY THIS MATTERS**: The server is loose with number-vs-string encoding;
/// consumers resume from `maxPts` and route on `bizType`.
///
/// **BUG THIS CATCHES**: Would catch a strict body parse where one string
/// `bizType` drops the package cursors, blanks the raw record, or fails a
/// record whose `data` is perfectly valid.
#[test]
fn given_package_with_odd_field_types_when_decoded_then_cursors_and_records_survive() {
    // GIVEN
    let frame = Frame {
        lwp: Some("/s/sync".to_string()),
        body: Some(json!({
            "syncPushPackage": {
                "maxPts": 77,
                "startSeq": "12",
                "endSeq": "not a number",
                "hasMore": 1,
                "data": [
                    { "bizType": "40", "data": encode_record(&[chat_record("first")]), "streamId": "s1" },
                    { "bizType": 40, "data": encode_record(&[chat_record("second")]) }
                ]
            }
        })),
        ..Default::default()
    };

    // WHEN
    let push = decode_sync_push(frame);

    // THEN
    let package = push.package().expect("package should survive");
    assert_eq!(package.max_pts, Some(77));
    assert_eq!(package.start_seq, Some(12));
    assert_eq!(package.end_seq, None);
    assert!(package.has_more());

    assert_eq!(push.items.len(), 2);
    assert!(push.items.iter().all(|item| item.is_decoded()));
    assert_eq!(push.items[0].raw.biz_type, Some(40));
    assert_eq!(push.items[0].raw.stream_id.as_deref(), Some("s1"));
    assert_eq!(
        push.items[0].raw.data.as_deref(),
        Some(encode_record(&[chat_record("first")]).as_str())
    );
}

/// **VALUE**: A record that is not an object keeps its slot as an error item.
#[test]
fn given_non_object_record_when_decoded_then_missing_data_in_its_slot() {
    let push = decode_sync_push(push_frame(json!([
        "garbage",
        { "bizType": 40, "data": encode_record(&[chat_record("ok")]) },
    ])));

    assert_eq!(push.items.len(), 2);
    assert!(matches!(push.items[0].error, Some(DecodeError::MissingData { .. })));
    assert!(push.items[1].is_decoded());
    assert_eq!(push.package().unwrap().max_pts, Some(10));
}

/// **VALUE**: A body that is not an object yields no items and no package.
#[test]
fn given_non_object_body_when_decoded_then_empty_push() {
    let frame = Frame {
        lwp: Some("/s/sync".to_string()),
        body: Some(json!("unexpected")),
        ..Default::default()
    };

    let push = decode_sync_push(frame);

    assert!(push.items.is_empty());
    assert!(push.package().is_none());
}

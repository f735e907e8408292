use crate::codec::decode_envelope;
use crate::push::format_message;
use crate::tests::{chat_record, chat_record_with_content, encode_record};

use serde_json::json;

/// **VALUE**: Positional fields of a chat record map onto named fields.
///
/// **WHY THIS MATTERS**: Consumers read `text` and `senderId`, never the raw
/// numeric tags; a wrong path silently yields empty messages.
///
/// **BUG THIS CATCHES**: Would catch any of the paths (`1.1`, `1.3`,
/// `1.6.3.2`, `1.10.*`) being off by one level.
#[test]
fn given_decoded_chat_record_when_formatted_then_named_fields_populated() {
    // GIVEN
    let decoded = decode_envelope(&encode_record(&[chat_record("hello there")])).unwrap();

    // WHEN
    let message = format_message(&decoded);

    // THEN
    assert_eq!(message.sender_id.as_deref(), Some("sender@goofish"));
    assert_eq!(message.receiver_id.as_deref(), Some("receiver@goofish"));
    assert_eq!(message.message_id.as_deref(), Some("3000000000001.PNM"));
    assert_eq!(message.text.as_deref(), Some("hello there"));
    assert_eq!(message.timestamp.as_deref(), Some("1760000000000"));
    assert_eq!(message.message_type, Some(1));
    assert_eq!(message.session_type.as_deref(), Some("1"));
    assert_eq!(
        message.reminder_url.as_deref(),
        Some("fleamarket://message_chat?sid=1")
    );
    assert_eq!(message.raw, decoded);
}

/// **VALUE**: Embedded JSON strings are parsed independently.
///
/// **BUG THIS CATCHES**: Would catch a single parse failure (`bizTag` here)
/// discarding the other embedded fields.
#[test]
fn given_one_unparseable_embedded_field_when_formatted_then_others_still_parsed() {
    // GIVEN
    let decoded = decode_envelope(&encode_record(&[chat_record("hi")])).unwrap();

    // WHEN
    let message = format_message(&decoded);

    // THEN
    let content = message.content.unwrap();
    assert_eq!(content["contentType"], json!(1));
    assert_eq!(content["text"]["text"], json!("hi"));
    assert_eq!(
        message.ext_json.unwrap(),
        json!({ "messageId": "m-1", "tag": "t" })
    );
    assert!(message.biz_tag.is_none());
}

/// **VALUE**: Non-text content keeps its full payload.
///
/// **WHY THIS MATTERS**: Image, card and custom messages carry everything
/// interesting outside `text`; consumers render from `content` directly.
///
/// **BUG THIS CATCHES**: Would catch the embedded JSON being narrowed to a
/// fixed set of text fields, silently dropping `image` and friends.
#[test]
fn given_image_content_when_formatted_then_whole_payload_kept() {
    // GIVEN
    let content = r#"{"contentType":2,"image":{"pics":[{"url":"https://x/y.jpg","width":640}]}}"#;
    let record = chat_record_with_content("[image]", content);
    let decoded = decode_envelope(&encode_record(&[record])).unwrap();

    // WHEN
    let message = format_message(&decoded);

    // THEN
    let expected: serde_json::Value = serde_json::from_str(content).unwrap();
    assert_eq!(message.content.as_ref(), Some(&expected));
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["content"], expected);
}

/// **VALUE**: Embedded JSON that is valid but not an object is still kept.
#[test]
fn given_scalar_embedded_json_when_formatted_then_kept_as_is() {
    let record = chat_record_with_content("hi", r#""just a string""#);
    let decoded = decode_envelope(&encode_record(&[record])).unwrap();

    let message = format_message(&decoded);

    assert_eq!(message.content, Some(json!("just a string")));
}

/// **VALUE**: Values without the chat layout format to raw-only messages.
#[test]
fn given_non_chat_value_when_formatted_then_only_raw_set() {
    let value = json!({ "2": "something else" });

    let message = format_message(&value);

    assert!(message.sender_id.is_none());
    assert!(message.text.is_none());
    assert_eq!(message.raw, value);
}

/// **VALUE**: Serialized output uses camelCase and omits absent fields.
#[test]
fn given_formatted_message_when_serialized_then_camel_case_without_nulls() {
    let decoded = decode_envelope(&encode_record(&[chat_record("hi")])).unwrap();

    let json = serde_json::to_value(format_message(&decoded)).unwrap();

    assert_eq!(json["senderId"], json!("sender@goofish"));
    assert!(json.get("bizTag").is_none());
}

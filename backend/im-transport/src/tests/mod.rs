// Unit tests for crate-private pieces and pure functions.
// End-to-end socket behavior lives in integration_tests/.

mod config;
mod events;
mod push;
mod session;
mod transport;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rmpv::Value as MsgPackValue;

/// Encode `values` back to back as MessagePack, then as unpadded URL-safe base64.
pub(crate) fn encode_record(values: &[MsgPackValue]) -> String {
    let mut bytes = Vec::new();
    for value in values {
        rmpv::encode::write_value(&mut bytes, value).expect("encode msgpack");
    }
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `{1: {1: sender, 2: receiver, 3: id, 5: ts, 6: {1: 1, 3: {2: text, 5: content}}, 10: detail}}`
pub(crate) fn chat_record(text: &str) -> MsgPackValue {
    let content = format!(r#"{{"contentType":1,"text":{{"text":"{text}"}}}}"#);
    chat_record_with_content(text, &content)
}

/// [`chat_record`] with an arbitrary JSON string at `1.6.3.5`.
pub(crate) fn chat_record_with_content(text: &str, content: &str) -> MsgPackValue {
    use MsgPackValue::{Integer, Map, String as Str};

    let payload = Map(vec![
        (Integer(2.into()), Str(text.into())),
        (Integer(5.into()), Str(content.into())),
    ]);
    let message_data = Map(vec![
        (Integer(1.into()), Integer(1.into())),
        (Integer(3.into()), payload),
    ]);
    let detail = Map(vec![
        (Str("sessionType".into()), Str("1".into())),
        (Str("reminderUrl".into()), Str("fleamarket://message_chat?sid=1".into())),
        (Str("extJson".into()), Str(r#"{"messageId":"m-1","tag":"t"}"#.into())),
        (Str("bizTag".into()), Str("{not json".into())),
    ]);
    let body = Map(vec![
        (Integer(1.into()), Str("sender@goofish".into())),
        (Integer(2.into()), Str("receiver@goofish".into())),
        (Integer(3.into()), Str("3000000000001.PNM".into())),
        (Integer(5.into()), Integer(1_760_000_000_000_i64.into())),
        (Integer(6.into()), message_data),
        (Integer(10.into()), detail),
    ]);
    Map(vec![(Integer(1.into()), body)])
}

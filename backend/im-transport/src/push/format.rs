use log::trace;
use serde::Serialize;
use serde_json::Value;

/// Flat view over a decoded chat record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    /// Parsed `1.6.3.5`, kept whole: its shape depends on the content type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biz_tag: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_url: Option<String>,
    pub raw: Value,
}

/// Extract the addressable fields of a decoded chat record.
///
/// Field positions:
///
/// | field | path |
/// |---|---|
/// | sender | `1.1` |
/// | receiver | `1.2` |
/// | message id | `1.3` |
/// | timestamp | `1.5` |
/// | message type | `1.6.1` |
/// | text | `1.6.3.2` |
/// | content (JSON string) | `1.6.3.5` |
/// | session type, reminder url | `1.10.sessionType`, `1.10.reminderUrl` |
/// | ext json, biz tag (JSON strings) | `1.10.extJson`, `1.10.bizTag` |
///
/// The three embedded JSON strings are parsed independently into whatever
/// JSON they hold; one that fails to parse is left out without affecting the
/// others.
pub fn format_message(decoded: &Value) -> FormattedMessage {
    let Some(body) = decoded.get("1").filter(|b| b.is_object()) else {
        return FormattedMessage {
            raw: decoded.clone(),
            ..Default::default()
        };
    };

    let message_data = body.get("6");
    let payload = message_data.and_then(|m| m.get("3"));
    let detail = body.get("10");

    FormattedMessage {
        message_id: string_at(body.get("3")),
        sender_id: string_at(body.get("1")),
        receiver_id: string_at(body.get("2")),
        text: string_at(payload.and_then(|p| p.get("2"))),
        timestamp: string_at(body.get("5")),
        message_type: message_data.and_then(|m| m.get("1")).and_then(Value::as_i64),
        session_type: string_at(detail.and_then(|d| d.get("sessionType"))),
        content: parse_embedded("content", payload.and_then(|p| p.get("5"))),
        ext_json: parse_embedded("extJson", detail.and_then(|d| d.get("extJson"))),
        biz_tag: parse_embedded("bizTag", detail.and_then(|d| d.get("bizTag"))),
        reminder_url: string_at(detail.and_then(|d| d.get("reminderUrl"))),
        raw: decoded.clone(),
    }
}

fn string_at(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_embedded(field: &str, value: Option<&Value>) -> Option<Value> {
    let text = value?.as_str()?;
    match serde_json::from_str(text) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            trace!("Skipping unparseable embedded {field}: {e}");
            None
        }
    }
}

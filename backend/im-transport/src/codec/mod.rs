//! Envelope codec for business records.
//!
//! Records inside a sync push are URL-safe base64 strings wrapping one or
//! more concatenated MessagePack values. Decoding normalizes the alphabet and
//! padding, then reads self-delimited values until the buffer is exhausted.
//!
//! Decoded values are exposed as [`serde_json::Value`]. MessagePack maps keyed
//! by integers become objects keyed by the decimal string, so a field tagged
//! `3` is looked up as `"3"` regardless of how the sender encoded the key.

use crate::error::DecodeError;

use std::io::Cursor;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use log::trace;
use rmpv::Value as MsgPackValue;
use serde_json::{Map, Number, Value};

/// Decoder matching the sender's tolerance for non-canonical trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode one encoded record.
///
/// A single MessagePack value is returned as-is; several values are returned
/// in arrival order as a JSON array. Empty input decodes to `null`.
///
/// # Errors
///
/// - [`DecodeError::Base64`] if the text is not valid base64 after normalization
/// - [`DecodeError::MessagePack`] if the byte stream is truncated or malformed
pub fn decode_envelope(encoded: &str) -> Result<Value, DecodeError> {
    if encoded.is_empty() {
        return Ok(Value::Null);
    }

    let bytes = LENIENT.decode(normalize_base64url(encoded))?;
    let mut values = decode_values(&bytes)?;

    trace!("Decoded {} value(s) from {} bytes", values.len(), bytes.len());

    Ok(match values.len() {
        1 => values.swap_remove(0),
        _ => Value::Array(values),
    })
}

/// Read every self-delimited MessagePack value from `bytes`, in order.
pub fn decode_values(bytes: &[u8]) -> Result<Vec<Value>, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let value = rmpv::decode::read_value(&mut cursor)?;
        values.push(msgpack_to_json(value));
    }

    Ok(values)
}

/// Map the URL-safe alphabet back to the standard one and restore padding.
pub fn normalize_base64url(encoded: &str) -> String {
    let mut normalized: String = encoded
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let remainder = normalized.len() % 4;
    if remainder != 0 {
        normalized.extend(std::iter::repeat_n('=', 4 - remainder));
    }

    normalized
}

pub(crate) fn msgpack_to_json(value: MsgPackValue) -> Value {
    match value {
        MsgPackValue::Nil => Value::Null,
        MsgPackValue::Boolean(b) => Value::Bool(b),
        MsgPackValue::Integer(i) => i
            .as_i64()
            .map(Number::from)
            .or_else(|| i.as_u64().map(Number::from))
            .map_or(Value::Null, Value::Number),
        MsgPackValue::F32(f) => float_to_json(f64::from(f)),
        MsgPackValue::F64(f) => float_to_json(f),
        MsgPackValue::String(s) => match s.into_str() {
            Some(s) => Value::String(s),
            None => Value::Null,
        },
        MsgPackValue::Binary(bytes) => Value::String(STANDARD.encode(bytes)),
        MsgPackValue::Array(items) => Value::Array(items.into_iter().map(msgpack_to_json).collect()),
        MsgPackValue::Map(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(map_key(key), msgpack_to_json(value));
            }
            Value::Object(object)
        }
        MsgPackValue::Ext(kind, data) => {
            let mut object = Map::new();
            object.insert("type".to_string(), Value::from(kind));
            object.insert("data".to_string(), Value::String(STANDARD.encode(data)));
            Value::Object(object)
        }
    }
}

fn float_to_json(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn map_key(key: MsgPackValue) -> String {
    match key {
        MsgPackValue::String(s) => match s.into_str() {
            Some(s) => s,
            None => String::new(),
        },
        MsgPackValue::Integer(i) => i.to_string(),
        other => msgpack_to_json(other).to_string(),
    }
}

use crate::codec::decode_envelope;
use crate::error::DecodeError;
use crate::protocol::Frame;

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of a sync push frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPushBody {
    #[serde(default, deserialize_with = "lenient")]
    pub sync_push_package: Option<SyncPushPackage>,
    #[serde(default, deserialize_with = "lenient")]
    pub sync_extension_model: Option<SyncExtensionModel>,
}

/// Ordered business records plus the cursors for resuming after them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPushPackage {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub max_high_pts: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub start_seq: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub end_seq: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub min_create_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub data: Vec<SyncMessageData>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub max_pts: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub has_more: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp: Option<i64>,
}

impl SyncPushPackage {
    /// The server signals more pending records with a non-zero `hasMore`.
    pub fn has_more(&self) -> bool {
        self.has_more.is_some_and(|flag| flag != 0)
    }
}

/// One encoded business record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessageData {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub biz_type: Option<i64>,
    /// URL-safe base64 MessagePack payload.
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub object_type: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncExtensionModel {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub reconnect_type: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub failover: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub fingerprint: Option<i64>,
}

/// A record paired with its decoded value or the error that prevented it.
///
/// Exactly one of `decoded` and `error` is set.
#[derive(Debug, Clone)]
pub struct DecodedSyncItem {
    pub raw: SyncMessageData,
    pub decoded: Option<Value>,
    pub error: Option<DecodeError>,
}

impl DecodedSyncItem {
    pub fn is_decoded(&self) -> bool {
        self.decoded.is_some()
    }
}

/// An acknowledged push: the original frame, its typed body and one decoded
/// item per record, in record order.
#[derive(Debug, Clone)]
pub struct SyncPush {
    pub frame: Frame,
    pub body: SyncPushBody,
    pub items: Vec<DecodedSyncItem>,
}

impl SyncPush {
    pub fn package(&self) -> Option<&SyncPushPackage> {
        self.body.sync_push_package.as_ref()
    }

    pub fn decoded_values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().filter_map(|item| item.decoded.as_ref())
    }
}

/// Decode every record of a push frame.
///
/// Never fails. Fields of the wrong type read as absent, so one odd cursor or
/// record field costs only that field, and each record's decode failure is
/// captured on its own item.
pub fn decode_sync_push(frame: Frame) -> SyncPush {
    let body = match frame.body.clone() {
        None => SyncPushBody::default(),
        Some(raw_body) => serde_json::from_value(raw_body).unwrap_or_else(|e| {
            warn!("Sync push body is not an object, ignoring it: {e}");
            SyncPushBody::default()
        }),
    };
    let items = body
        .sync_push_package
        .as_ref()
        .map(|package| decode_items(&package.data))
        .unwrap_or_default();

    debug!(
        "Decoded sync push: {} record(s), {} failed",
        items.len(),
        items.iter().filter(|item| !item.is_decoded()).count()
    );

    SyncPush { frame, body, items }
}

/// Decode records in order; one item per record.
pub fn decode_items(records: &[SyncMessageData]) -> Vec<DecodedSyncItem> {
    records.iter().cloned().map(decode_record).collect()
}

fn decode_record(raw: SyncMessageData) -> DecodedSyncItem {
    let result = match raw.data.as_deref() {
        Some(data) if !data.is_empty() => decode_envelope(data),
        _ => Err(missing_data()),
    };

    match result {
        Ok(decoded) => DecodedSyncItem {
            raw,
            decoded: Some(decoded),
            error: None,
        },
        Err(error) => DecodedSyncItem {
            raw,
            decoded: None,
            error: Some(error),
        },
    }
}

// ============================================
// LENIENT FIELD READERS
// ============================================

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Numbers, numeric strings and booleans; anything else reads as absent.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(b)),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Every element becomes a record; a non-object one becomes an empty record
/// so later items keep their positions.
fn lenient_records<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<SyncMessageData>, D::Error> {
    let Value::Array(records) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(records
        .into_iter()
        .map(|record| serde_json::from_value(record).unwrap_or_default())
        .collect())
}

#[track_caller]
fn missing_data() -> DecodeError {
    DecodeError::MissingData {
        message: "Record has no data field".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

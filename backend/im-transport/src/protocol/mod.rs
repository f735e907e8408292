//! Wire model for the IM socket.
//!
//! Both directions are JSON text frames. Outbound [`Envelope`]s carry a path
//! (`lwp`), a header map and an optional body; inbound [`Frame`]s add an
//! optional status code. Correlation uses the `mid` header.
//!
//! Bodies stay as [`serde_json::Value`] until path-based dispatch decides what
//! they are; nothing here assumes their shape.

pub mod paths;

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header name carrying the correlation id.
pub const MID_HEADER: &str = "mid";

pub type Headers = Map<String, Value>;

/// Outbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lwp: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Headers,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl Envelope {
    /// Envelope addressed to `path` with no headers or body.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            lwp: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_mid(self, mid: impl Into<String>) -> Self {
        self.with_header(MID_HEADER, mid.into())
    }

    /// Keep-alive on the heartbeat path. The fresh `mid` is informational;
    /// nothing waits for a reply to it.
    pub fn heartbeat() -> Self {
        Self::new(paths::HEARTBEAT).with_mid(generate_mid())
    }

    /// Status-200 acknowledgment echoing the headers of an inbound push.
    pub fn ack(frame: &Frame) -> Self {
        Self {
            lwp: None,
            headers: frame.headers.clone(),
            body: None,
            code: Some(common::StatusCode::OK.0),
        }
    }

    pub fn mid(&self) -> Option<&str> {
        self.headers.get(MID_HEADER).and_then(Value::as_str)
    }

    /// Returns the envelope's `mid`, generating and storing one if absent.
    pub fn ensure_mid(&mut self) -> String {
        if let Some(mid) = self.mid() {
            return mid.to_string();
        }
        let mid = generate_mid();
        self.headers
            .insert(MID_HEADER.to_string(), Value::String(mid.clone()));
        mid
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub headers: Headers,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lwp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn mid(&self) -> Option<&str> {
        self.headers.get(MID_HEADER).and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<common::StatusCode> {
        self.code.map(common::StatusCode::from)
    }

    pub fn is_ok(&self) -> bool {
        self.status().is_some_and(|code| code.is_ok())
    }

    pub fn is_sync_push(&self) -> bool {
        self.lwp.as_deref() == Some(paths::SYNC_PUSH)
    }
}

/// Correlation id in the server's format: `<0-999 random><unix-ms epoch> 0`.
pub fn generate_mid() -> String {
    let random: u32 = rand::rng().random_range(0..1000);
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{random}{epoch_ms} 0")
}

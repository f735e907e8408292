//! Session bootstrap on top of the transport.
//!
//! The server only starts delivering sync pushes after the connection is
//! registered and the sync state has been fetched and acknowledged.
//! [`ImSession::register`] runs those three requests in order.

use crate::error::TransportError;
use crate::protocol::{Envelope, Frame, paths};
use crate::transport::TransportClient;
use crate::{DEFAULT_APP_KEY, DEFAULT_USER_AGENT};

use common::RedactedToken;

use log::{debug, info};
use serde_json::{Value, json};

pub const CACHE_HEADER: &str = "app-key token ua wv";
pub const DATA_TYPE: &str = "j";
pub const WS_VERSION: &str = "im:3,au:3,sy:6";
pub const SYNC_CURSOR: &str = "0,0;0;0;";
pub const SYNC_TOPIC: &str = "sync";

/// Headers of the `/reg` request.
///
/// Every field starts at the well-known client value; `token` and
/// `device_id` are omitted from the envelope when unset.
#[derive(Debug, Clone)]
pub struct Registration {
    cache_header: String,
    app_key: String,
    token: Option<RedactedToken>,
    user_agent: String,
    data_type: String,
    ws_version: String,
    sync: String,
    device_id: Option<String>,
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            cache_header: CACHE_HEADER.to_string(),
            app_key: DEFAULT_APP_KEY.to_string(),
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            data_type: DATA_TYPE.to_string(),
            ws_version: WS_VERSION.to_string(),
            sync: SYNC_CURSOR.to_string(),
            device_id: None,
        }
    }
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: RedactedToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = app_key.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_cache_header(mut self, cache_header: impl Into<String>) -> Self {
        self.cache_header = cache_header.into();
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    pub fn with_ws_version(mut self, ws_version: impl Into<String>) -> Self {
        self.ws_version = ws_version.into();
        self
    }

    pub fn with_sync(mut self, sync: impl Into<String>) -> Self {
        self.sync = sync.into();
        self
    }

    /// Build the `/reg` envelope. The token is exposed only here.
    pub fn to_envelope(&self) -> Envelope {
        let mut envelope = Envelope::new(paths::REGISTER)
            .with_header("cache-header", self.cache_header.as_str())
            .with_header("app-key", self.app_key.as_str());

        if let Some(token) = &self.token {
            envelope = envelope.with_header("token", token.expose());
        }

        envelope = envelope
            .with_header("ua", self.user_agent.as_str())
            .with_header("dt", self.data_type.as_str())
            .with_header("wv", self.ws_version.as_str())
            .with_header("sync", self.sync.as_str());

        if let Some(device_id) = &self.device_id {
            envelope = envelope.with_header("did", device_id.as_str());
        }

        envelope
    }
}

/// Requests that prepare a connection to receive pushes.
#[derive(Clone)]
pub struct ImSession {
    client: TransportClient,
}

impl ImSession {
    pub fn new(client: TransportClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &TransportClient {
        &self.client
    }

    /// Register, fetch the sync state and acknowledge it.
    ///
    /// Returns the registration frame. Any failing step aborts the sequence
    /// with that step's error.
    pub async fn register(&self, registration: &Registration) -> Result<Frame, TransportError> {
        let registered = self.client.send(registration.to_envelope()).await?;
        info!("Registered with IM server");

        let status = self.sync_status(SYNC_TOPIC).await?;
        self.ack_diff(status.body.unwrap_or(Value::Null)).await?;
        debug!("Sync state acknowledged");

        Ok(registered)
    }

    /// `/r/SyncStatus/getState` for `topic`.
    pub async fn sync_status(&self, topic: &str) -> Result<Frame, TransportError> {
        self.client
            .send(Envelope::new(paths::SYNC_STATUS).with_body(json!([{ "topic": topic }])))
            .await
    }

    /// `/r/SyncStatus/ackDiff` with `status` as the single body element.
    pub async fn ack_diff(&self, status: Value) -> Result<Frame, TransportError> {
        self.client
            .send(Envelope::new(paths::ACK_DIFF).with_body(json!([status])))
            .await
    }
}

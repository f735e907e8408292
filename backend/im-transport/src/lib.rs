pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod push;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::{ConnectOptions, TransportConfig};
pub use error::{CoreError, DecodeError, TransportError};
pub use events::{EventBus, EventKind, SubscriptionId, TransportEvent};
pub use protocol::{Envelope, Frame, Headers};
pub use session::{ImSession, Registration};
pub use transport::{ConnectionState, TransportClient};

pub const DEFAULT_WS_URL: &str = "wss://wss-goofish.dingtalk.com/";
pub const DEFAULT_APP_KEY: &str = "444e9908a51d1cb236a27862abc769c9";
pub const DEFAULT_USER_AGENT: &str = const_format::concatcp!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36 ",
    "DingTalk(2.2.0) OS(Mac OS/10.15.7) Browser(Chrome/141.0.0.0) ",
    "DingWeb/2.2.0 IMPaaS DingWeb/2.2.0"
);

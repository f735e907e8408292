//! Connection management for the IM socket.
//!
//! [`TransportClient`] is the public face; everything else is owned by the
//! actor task behind it.

mod actor;
mod client;
mod connection_state;
mod correlation;
mod heartbeat;
mod queue;
mod reconnect;
mod socket;
mod timer;

pub use client::TransportClient;
pub use connection_state::ConnectionState;

#[cfg(test)]
pub(crate) use actor::Command;
#[cfg(test)]
pub(crate) use correlation::CorrelationTable;
#[cfg(test)]
pub(crate) use heartbeat::Heartbeat;
#[cfg(test)]
pub(crate) use queue::OutboundQueue;
#[cfg(test)]
pub(crate) use reconnect::ReconnectPolicy;
#[cfg(test)]
pub(crate) use timer::Timer;

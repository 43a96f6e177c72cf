//! The transport seam between the gateway and a relay.
//!
//! The gateway never touches sockets. It asks a [`RelayConnector`] for a
//! [`RelayConnection`] to a URL and then speaks [`ClientMessage`] /
//! [`RelayMessage`] over it. Production wires in
//! [`WebSocketConnector`](super::websocket::WebSocketConnector); tests and
//! offline runs use [`MemoryConnector`](super::memory::MemoryConnector).

use async_trait::async_trait;
use thiserror::Error;

use super::message::{ClientMessage, RelayMessage};

/// Per-relay failure. These are reported in a
/// [`PublishReport`](super::gateway::PublishReport) or logged by a
/// subscription task; they never abort an operation across relays.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Could not open a connection.
    #[error("relay {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// The relay answered `OK false`.
    #[error("relay {url} rejected event: {reason}")]
    Rejected { url: String, reason: String },

    /// No answer within the configured timeout.
    #[error("relay {url} timed out")]
    Timeout { url: String },

    /// A frame could not be parsed or made no sense.
    #[error("relay protocol error: {0}")]
    Protocol(String),

    /// The connection is gone.
    #[error("relay connection closed")]
    Closed,
}

/// Opens connections to relays by URL.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, RelayError>;
}

/// One open, bidirectional relay connection.
#[async_trait]
pub trait RelayConnection: Send {
    fn url(&self) -> &str;

    async fn send(&mut self, message: &ClientMessage) -> Result<(), RelayError>;

    /// Next frame from the relay. [`RelayError::Closed`] once the
    /// connection has ended; anything unparseable is
    /// [`RelayError::Protocol`].
    async fn recv(&mut self) -> Result<RelayMessage, RelayError>;

    /// Best-effort graceful close.
    async fn close(&mut self);
}

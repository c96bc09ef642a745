//! Error types for gqlws
//!
//! A single `Error` enum covers every failure the subscription client can
//! surface synchronously. Outcomes that the protocol reports asynchronously
//! (a rejected handshake, exhausted reconnection attempts) are not errors in
//! this sense: they are delivered through the callbacks configured on the
//! client builder.
//!
//! # Error Categories
//!
//! - **Configuration**: `InvalidConfiguration` is raised while building a
//!   client and is fatal to construction.
//! - **Contract**: `ConnectionNotReady` means an operation was started before
//!   the peer acknowledged the handshake.
//! - **Protocol**: `MessageInvalid` is raised for inbound frames that are not
//!   valid JSON or carry a type the active protocol does not define.
//! - **Transport**: `WebSocket`, `ConnectionClosed`, `ConnectionInitPayload`
//!   and `Serialization` cover the plumbing around the socket.
//!
//! # Examples
//!
//! ```rust
//! use gqlws_core::Error;
//!
//! let error = Error::MessageInvalid("Invalid message type \"bogus\"".into());
//! assert_eq!(
//!     error.to_string(),
//!     "Invalid message received: Invalid message type \"bogus\""
//! );
//! ```

use thiserror::Error;

/// Result type for gqlws operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for gqlws operations
///
/// The enum is `Clone` so that a single failure can be reported to several
/// observers (logs, metrics, callers) without re-creating it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid client options
    ///
    /// Raised when the first configured protocol name does not match any
    /// known protocol table, or when other options are inconsistent.
    #[error("Invalid options: {0}")]
    InvalidConfiguration(String),

    /// An operation start was attempted before the handshake completed
    ///
    /// Callers must only create subscriptions after the client reports
    /// readiness, or accept that creation before readiness fails.
    #[error("Connection is not ready")]
    ConnectionNotReady,

    /// An inbound frame could not be decoded or has an unknown type
    #[error("Invalid message received: {0}")]
    MessageInvalid(String),

    /// Serialization of an outbound frame failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    ///
    /// Covers failures to open the socket and failures while reading from
    /// or writing to it.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The connection-init payload provider failed
    #[error("Connection init payload failed: {0}")]
    ConnectionInitPayload(String),

    /// There is no live transport to send on
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Short, stable label for metrics attributes and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "invalid_configuration",
            Error::ConnectionNotReady => "connection_not_ready",
            Error::MessageInvalid(_) => "message_invalid",
            Error::Serialization(_) => "serialization",
            Error::WebSocket(_) => "websocket",
            Error::ConnectionInitPayload(_) => "connection_init_payload",
            Error::ConnectionClosed => "connection_closed",
        }
    }
}

//! GraphQL over WebSocket protocol tables
//!
//! Two sub-protocols are in common use and they disagree on the literal
//! `type` strings carried by each frame:
//!
//! - **`graphql-ws`**: the legacy `subscriptions-transport-ws` protocol
//!   (`start` / `data` / `stop`, server-only `ka` heartbeats)
//! - **`graphql-transport-ws`**: the newer protocol from the `graphql-ws`
//!   library (`subscribe` / `next` / `complete`, bidirectional `ping` / `pong`)
//!
//! The client only ever reasons about logical roles ([`MessageKind`]); a
//! [`ProtocolMessageTypes`] table translates those roles to and from the wire
//! strings of one variant. Exactly one table is active per client.
//!
//! # Examples
//!
//! ```rust
//! use gqlws_core::protocol::{protocol_by_name, MessageKind, GRAPHQL_WS};
//!
//! let table = protocol_by_name(GRAPHQL_WS).unwrap();
//! assert_eq!(table.wire_type(MessageKind::Start), Some("start"));
//! assert_eq!(table.classify("data"), Some(MessageKind::Data));
//! assert!(table.keep_alive_ack.is_none());
//! ```

use std::fmt;

/// Name of the legacy `subscriptions-transport-ws` sub-protocol
pub const GRAPHQL_WS: &str = "graphql-ws";

/// Name of the `graphql-transport-ws` sub-protocol
pub const GRAPHQL_TRANSPORT_WS: &str = "graphql-transport-ws";

/// Logical role of a frame, independent of the protocol variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Client -> Server: open the session
    ConnectionInit,
    /// Server -> Client: session accepted
    ConnectionAck,
    /// Server -> Client: session rejected
    ConnectionError,
    /// Client -> Server: close the session
    ConnectionTerminate,
    /// Heartbeat
    KeepAlive,
    /// Heartbeat reply (bidirectional protocols only)
    KeepAliveAck,
    /// Client -> Server: start an operation
    Start,
    /// Server -> Client: operation result
    Data,
    /// Operation failed
    Error,
    /// Server -> Client: operation finished
    Complete,
    /// Client -> Server: stop an operation
    Stop,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::ConnectionInit => "CONNECTION_INIT",
            MessageKind::ConnectionAck => "CONNECTION_ACK",
            MessageKind::ConnectionError => "CONNECTION_ERROR",
            MessageKind::ConnectionTerminate => "CONNECTION_TERMINATE",
            MessageKind::KeepAlive => "KEEP_ALIVE",
            MessageKind::KeepAliveAck => "KEEP_ALIVE_ACK",
            MessageKind::Start => "START",
            MessageKind::Data => "DATA",
            MessageKind::Error => "ERROR",
            MessageKind::Complete => "COMPLETE",
            MessageKind::Stop => "STOP",
        };
        f.write_str(name)
    }
}

/// Wire-level type strings for one protocol variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolMessageTypes {
    /// Canonical name of the variant
    pub name: &'static str,
    pub connection_init: &'static str,
    pub connection_ack: &'static str,
    pub connection_error: &'static str,
    pub connection_terminate: &'static str,
    pub keep_alive: &'static str,
    /// Only defined by protocols with bidirectional ping/pong
    pub keep_alive_ack: Option<&'static str>,
    pub start: &'static str,
    pub data: &'static str,
    pub error: &'static str,
    pub complete: &'static str,
    pub stop: &'static str,
}

static GRAPHQL_WS_TYPES: ProtocolMessageTypes = ProtocolMessageTypes {
    name: GRAPHQL_WS,
    connection_init: "connection_init",
    connection_ack: "connection_ack",
    connection_error: "connection_error",
    connection_terminate: "connection_terminate",
    keep_alive: "ka",
    keep_alive_ack: None,
    start: "start",
    data: "data",
    error: "error",
    complete: "complete",
    stop: "stop",
};

static GRAPHQL_TRANSPORT_WS_TYPES: ProtocolMessageTypes = ProtocolMessageTypes {
    name: GRAPHQL_TRANSPORT_WS,
    connection_init: "connection_init",
    connection_ack: "connection_ack",
    connection_error: "connection_error",
    connection_terminate: "connection_terminate",
    keep_alive: "ping",
    keep_alive_ack: Some("pong"),
    start: "subscribe",
    data: "next",
    error: "error",
    complete: "complete",
    // graphql-transport-ws reuses `complete` in both directions
    stop: "complete",
};

/// Look up the protocol table for a sub-protocol name
///
/// A name selects a table when it contains the variant name, so decorated
/// names such as `"graphql-transport-ws+v2"` still resolve. The newer variant
/// is checked first. Returns `None` for unknown protocols.
pub fn protocol_by_name(name: &str) -> Option<&'static ProtocolMessageTypes> {
    if name.contains(GRAPHQL_TRANSPORT_WS) {
        Some(&GRAPHQL_TRANSPORT_WS_TYPES)
    } else if name.contains(GRAPHQL_WS) {
        Some(&GRAPHQL_WS_TYPES)
    } else {
        None
    }
}

impl ProtocolMessageTypes {
    /// Wire string for a logical role, if this protocol defines it
    pub fn wire_type(&self, kind: MessageKind) -> Option<&'static str> {
        match kind {
            MessageKind::ConnectionInit => Some(self.connection_init),
            MessageKind::ConnectionAck => Some(self.connection_ack),
            MessageKind::ConnectionError => Some(self.connection_error),
            MessageKind::ConnectionTerminate => Some(self.connection_terminate),
            MessageKind::KeepAlive => Some(self.keep_alive),
            MessageKind::KeepAliveAck => self.keep_alive_ack,
            MessageKind::Start => Some(self.start),
            MessageKind::Data => Some(self.data),
            MessageKind::Error => Some(self.error),
            MessageKind::Complete => Some(self.complete),
            MessageKind::Stop => Some(self.stop),
        }
    }

    /// Resolve an inbound wire type to its logical role
    ///
    /// Only roles a server may send are considered, so the shared
    /// `complete` string of `graphql-transport-ws` resolves to
    /// [`MessageKind::Complete`] rather than [`MessageKind::Stop`].
    pub fn classify(&self, wire_type: &str) -> Option<MessageKind> {
        const INBOUND: [MessageKind; 7] = [
            MessageKind::ConnectionAck,
            MessageKind::Data,
            MessageKind::Error,
            MessageKind::Complete,
            MessageKind::ConnectionError,
            MessageKind::KeepAlive,
            MessageKind::KeepAliveAck,
        ];

        INBOUND
            .iter()
            .copied()
            .find(|kind| self.wire_type(*kind) == Some(wire_type))
    }
}

//! Core types for GraphQL subscriptions over WebSocket
//!
//! This crate holds everything the subscription client needs that does not
//! touch a socket:
//!
//! - **Protocol tables**: wire type strings for `graphql-ws` and
//!   `graphql-transport-ws`
//! - **Frames**: the `{id, type, payload, extensions}` envelope and its codec
//! - **Error handling**: the shared `Error` type
//! - **Observability**: tracing subscriber and OpenTelemetry pipeline setup
//!
//! # Example
//!
//! ```rust
//! use gqlws_core::{frame, protocol_by_name, Frame, MessageKind, GRAPHQL_TRANSPORT_WS};
//!
//! let table = protocol_by_name(GRAPHQL_TRANSPORT_WS).unwrap();
//! let incoming = frame::decode(r#"{"id":"1","type":"next","payload":{"data":{}}}"#).unwrap();
//! assert_eq!(table.classify(&incoming.frame_type), Some(MessageKind::Data));
//! ```

pub mod error;
pub mod frame;
pub mod observability;
pub mod protocol;

pub use error::{Error, Result};
pub use frame::{ConnectionInitExtension, Frame, StartPayload};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use protocol::{
    protocol_by_name, MessageKind, ProtocolMessageTypes, GRAPHQL_TRANSPORT_WS, GRAPHQL_WS,
};

//! Wire frames and their JSON codec
//!
//! Every message exchanged over a GraphQL WebSocket is a JSON object of the
//! shape:
//!
//! ```text
//! { "id"?: string, "type": string, "payload"?: any, "extensions"?: any }
//! ```
//!
//! `id` is absent for connection-scoped frames (init, ack, connection error,
//! heartbeats) and present for operation-scoped frames (start, data, error,
//! complete, stop). The `type` string is protocol specific; see
//! [`crate::protocol`] for the tables that give it meaning.
//!
//! # Examples
//!
//! ```rust
//! use gqlws_core::frame::{self, Frame};
//! use serde_json::json;
//!
//! let frame = Frame::new("subscribe")
//!     .with_id("1")
//!     .with_payload(json!({"query": "subscription { ticks }", "variables": {}}));
//!
//! let text = frame::encode(&frame).unwrap();
//! assert_eq!(frame::decode(&text).unwrap(), frame);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single protocol frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Operation identifier, absent for connection-scoped frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Protocol-specific wire type
    #[serde(rename = "type")]
    pub frame_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Arbitrary frame metadata, used to carry per-operation connection init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl Frame {
    /// Create a connection-scoped frame with no payload
    pub fn new(frame_type: impl Into<String>) -> Self {
        Self {
            id: None,
            frame_type: frame_type.into(),
            payload: None,
            extensions: None,
        }
    }

    /// Scope the frame to an operation
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_extensions(mut self, extensions: Value) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// The `data` member of the payload, as carried by DATA frames
    ///
    /// A missing payload or missing `data` member yields `Value::Null`.
    pub fn data(&self) -> Value {
        self.payload
            .as_ref()
            .and_then(|payload| payload.get("data"))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Payload of a start frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    pub query: String,
    pub variables: Value,
}

/// Extension entry attaching a connection init value to one operation
///
/// Serializes as `{"type": "connectionInit", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInitExtension {
    #[serde(rename = "type")]
    pub extension_type: String,
    pub payload: Value,
}

impl ConnectionInitExtension {
    pub const TYPE: &'static str = "connectionInit";

    pub fn new(payload: Value) -> Self {
        Self {
            extension_type: Self::TYPE.to_string(),
            payload,
        }
    }
}

/// Encode a frame to its JSON text form
pub fn encode(frame: &Frame) -> Result<String> {
    serde_json::to_string(frame).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode an inbound text message into a frame
///
/// Anything that is not a JSON object with a string `type` member is a
/// protocol violation by the peer and yields [`Error::MessageInvalid`].
pub fn decode(text: &str) -> Result<Frame> {
    serde_json::from_str(text)
        .map_err(|_| Error::MessageInvalid(format!("\"{}\" must be JSON parsable.", text)))
}

//! GraphQL subscription client over WebSocket
//!
//! This crate subscribes to a remote GraphQL service over a single WebSocket
//! and relays every result to a publish callback, the way a gateway forwards
//! a downstream service's live data to its own subscribers.
//!
//! # Core Features
//!
//! - **Both protocols**: `graphql-transport-ws` (default) and the legacy
//!   `graphql-ws`
//! - **Multiplexing**: many operations over one socket, identical
//!   subscriptions shared and reference counted
//! - **Auto-Reconnection**: exponential backoff with an optional attempt
//!   limit; operations are restarted after every acknowledged handshake
//! - **Keep-Alive**: optional heartbeat, and automatic pong replies
//! - **Lifecycle events**: socket open/close/error and readiness on a
//!   broadcast channel
//! - **Observability**: tracing and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gqlws_client::{ClientBuilder, ClientEvent};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:4000/graphql")
//!         .service_name("inventory")
//!         .reconnect(true)
//!         .build()?;
//!
//!     let mut events = client.events();
//!     client.connect().await;
//!     while events.recv().await? != ClientEvent::Ready {}
//!
//!     let id = client
//!         .create_subscription(
//!             "subscription { stockChanged { sku level } }",
//!             json!({}),
//!             |message| async move {
//!                 println!("{}: {:?}", message.topic, message.payload);
//!             },
//!             None,
//!         )
//!         .await?;
//!
//!     client.unsubscribe(&id, false).await;
//!     client.close(false).await;
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod events;
mod keep_alive;
mod metrics;
mod operation;
mod reconnect;

pub use client::{PublishMessage, SubscriptionClient};
pub use client_builder::ClientBuilder;
pub use connection_state::{ConnectionManager, ConnectionState, ReconnectDecision};
pub use events::{ClientEvent, EventBus};
pub use keep_alive::KeepAlive;
pub use metrics::ClientMetrics;
pub use operation::{dedup_key, Operation, OperationHandler, OperationRegistry, Release};
pub use reconnect::{
    ExponentialBackoff, ReconnectionStrategy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
};

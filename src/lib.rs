//! gqlws - GraphQL subscriptions over WebSocket
//!
//! This is the main convenience crate that re-exports the gqlws sub-crates.
//! Use this crate if you want a single dependency for the subscription
//! client and its core types.
//!
//! # Architecture
//!
//! - **gqlws-core**: protocol tables, frame codec, error handling, observability
//! - **gqlws-client**: WebSocket subscription client with reconnection and
//!   keep-alive
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gqlws::{ClientBuilder, ClientEvent};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:4000/graphql")
//!         .protocols(["graphql-ws"])
//!         .build()?;
//!
//!     let mut events = client.events();
//!     client.connect().await;
//!     while events.recv().await? != ClientEvent::Ready {}
//!
//!     client
//!         .create_subscription(
//!             "subscription { messageAdded { text } }",
//!             json!({}),
//!             |message| async move { println!("{:?}", message) },
//!             None,
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub use gqlws_client as client;
pub use gqlws_core as core;

pub use gqlws_client::{ClientBuilder, ClientEvent, ConnectionState, PublishMessage, SubscriptionClient};
pub use gqlws_core::{Error, ObservabilityConfig, Result};

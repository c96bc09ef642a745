//! Client builder for configuring a subscription client
//!
//! The `ClientBuilder` provides a fluent API for everything a
//! [`SubscriptionClient`] needs before its first connection:
//! - Sub-protocol selection (`graphql-transport-ws` by default)
//! - Reconnection policy and attempt limit
//! - Connection init payload, literal or computed per connection
//! - Lifecycle callbacks (connected, handshake rejected, retries exhausted)
//! - Keep-alive heartbeat
//! - Observability (OpenTelemetry)
//!
//! Building validates the configuration but does not connect; call
//! [`SubscriptionClient::connect`] afterwards.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gqlws_client::ClientBuilder;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> gqlws_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:4000/graphql")
//!     .protocols(["graphql-ws"])
//!     .service_name("inventory")
//!     .reconnect(true)
//!     .max_reconnect_attempts(5)
//!     .keep_alive(Duration::from_secs(10))
//!     .connection_init_payload(json!({"authorization": "Bearer abc"}))
//!     .on_reconnect_failed(|| async { eprintln!("giving up") })
//!     .build()?;
//!
//! client.connect().await;
//! # Ok(())
//! # }
//! ```

use crate::reconnect::{ExponentialBackoff, ReconnectionStrategy};
use crate::{ClientMetrics, SubscriptionClient};
use futures::future::{BoxFuture, FutureExt};
use gqlws_core::protocol::{protocol_by_name, ProtocolMessageTypes, GRAPHQL_TRANSPORT_WS};
use gqlws_core::{Error, ObservabilityConfig, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SERVICE_NAME: &str = "gqlws";

/// Callback without arguments (connected, reconnection exhausted)
pub(crate) type LifecycleCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback receiving the payload of a rejected handshake
pub(crate) type ConnectionFailedCallback =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Async source of the connection init payload
pub(crate) type InitPayloadProvider = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Transforms a subscription's `_connectionInit` value before it is attached
pub(crate) type RewriteInitPayload =
    Arc<dyn Fn(Option<Value>, Option<&Value>) -> Option<Value> + Send + Sync>;

/// Where the connection init payload comes from
#[derive(Clone)]
pub(crate) enum ConnectionInitPayload {
    Literal(Value),
    Provider(InitPayloadProvider),
}

/// Immutable client configuration produced by [`ClientBuilder::build`]
pub(crate) struct ClientConfig {
    pub(crate) uri: String,
    pub(crate) protocols: Vec<String>,
    pub(crate) protocol: &'static ProtocolMessageTypes,
    pub(crate) service_name: String,
    pub(crate) reconnect: bool,
    pub(crate) keep_alive: Option<Duration>,
    pub(crate) connection_init_payload: Option<ConnectionInitPayload>,
    pub(crate) rewrite_connection_init_payload: Option<RewriteInitPayload>,
    pub(crate) on_connected: Option<LifecycleCallback>,
    pub(crate) on_connection_failed: Option<ConnectionFailedCallback>,
    pub(crate) on_reconnect_failed: Option<LifecycleCallback>,
}

/// Builder for configuring and creating a [`SubscriptionClient`]
pub struct ClientBuilder {
    uri: String,
    protocols: Vec<String>,
    service_name: Option<String>,
    reconnect: bool,
    max_reconnect_attempts: Option<u32>,
    reconnect_jitter: bool,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    keep_alive: Option<Duration>,
    connection_init_payload: Option<ConnectionInitPayload>,
    rewrite_connection_init_payload: Option<RewriteInitPayload>,
    on_connected: Option<LifecycleCallback>,
    on_connection_failed: Option<ConnectionFailedCallback>,
    on_reconnect_failed: Option<LifecycleCallback>,
    observability_config: Option<ObservabilityConfig>,
}

impl ClientBuilder {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            protocols: vec![GRAPHQL_TRANSPORT_WS.to_string()],
            service_name: None,
            reconnect: false,
            max_reconnect_attempts: None,
            reconnect_jitter: false,
            reconnect_strategy: None,
            keep_alive: None,
            connection_init_payload: None,
            rewrite_connection_init_payload: None,
            on_connected: None,
            on_connection_failed: None,
            on_reconnect_failed: None,
            observability_config: None,
        }
    }

    /// Sub-protocols advertised in `Sec-WebSocket-Protocol`
    ///
    /// The first entry selects the message table; an empty list keeps the
    /// default `graphql-transport-ws`.
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let protocols: Vec<String> = protocols.into_iter().map(Into::into).collect();
        if !protocols.is_empty() {
            self.protocols = protocols;
        }
        self
    }

    /// Reconnect automatically after an unplanned close (default: off)
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Give up after this many consecutive unacknowledged reconnects
    ///
    /// `N` means N retries after the first failed connection.
    pub fn max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(max_attempts);
        self
    }

    /// Add random jitter to the default backoff
    pub fn with_reconnect_jitter(mut self) -> Self {
        self.reconnect_jitter = true;
        self
    }

    /// Replace the default exponential backoff
    ///
    /// `max_reconnect_attempts` and `with_reconnect_jitter` only shape the
    /// default backoff and are ignored when a custom strategy is set.
    pub fn reconnect_strategy(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Prefix of every publish topic, also used as the telemetry service name
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Send a KEEP_ALIVE frame at this interval once the handshake is acknowledged
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = if interval.is_zero() { None } else { Some(interval) };
        self
    }

    /// Payload of every CONNECTION_INIT frame (default: `{}`)
    pub fn connection_init_payload(mut self, payload: Value) -> Self {
        self.connection_init_payload = Some(ConnectionInitPayload::Literal(payload));
        self
    }

    /// Compute the CONNECTION_INIT payload each time a connection opens
    ///
    /// An error closes the connection and goes through the reconnection
    /// policy like any other unplanned close.
    pub fn connection_init_payload_with<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.connection_init_payload = Some(ConnectionInitPayload::Provider(Arc::new(move || {
            provider().boxed()
        })));
        self
    }

    /// Transform a subscription's `_connectionInit` context value
    ///
    /// Called for every new operation with the extracted value (if any) and
    /// the whole context (if any). A `None` result attaches no extensions.
    pub fn rewrite_connection_init_payload<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(Option<Value>, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.rewrite_connection_init_payload = Some(Arc::new(rewrite));
        self
    }

    /// Called after every acknowledged handshake
    pub fn on_connected<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connected = Some(Arc::new(move || callback().boxed()));
        self
    }

    /// Called with the payload of a CONNECTION_ERROR frame
    pub fn on_connection_failed<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connection_failed = Some(Arc::new(move |payload| callback(payload).boxed()));
        self
    }

    /// Called once when the reconnection attempt limit is reached
    pub fn on_reconnect_failed<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_reconnect_failed = Some(Arc::new(move || callback().boxed()));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Observability settings, named after the client when a name was given
    fn telemetry_config(&self) -> Option<ObservabilityConfig> {
        let mut config = self.observability_config.clone()?;
        if let Some(ref name) = self.service_name {
            config.service_name = name.clone();
        }
        Some(config)
    }

    /// Validate the configuration and create the client
    pub fn build(self) -> Result<SubscriptionClient> {
        let first = self
            .protocols
            .first()
            .map(String::as_str)
            .unwrap_or(GRAPHQL_TRANSPORT_WS);
        let protocol = protocol_by_name(first).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "{} is not a valid gateway subscription protocol",
                first
            ))
        })?;

        let metrics = if let Some(config) = self.telemetry_config() {
            // A global subscriber may already be installed by the host or by
            // another client; keep going with whatever is in place.
            if let Err(e) = gqlws_core::init_observability(config.clone()) {
                tracing::warn!(error = %e, "Observability already initialized");
            }

            Some(Arc::new(ClientMetrics::new(&config.service_name)))
        } else {
            None
        };

        let service_name = self
            .service_name
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let strategy = self.reconnect_strategy.unwrap_or_else(|| {
            let mut backoff = ExponentialBackoff::default();
            if let Some(max) = self.max_reconnect_attempts {
                backoff = backoff.with_max_attempts(max);
            }
            if self.reconnect_jitter {
                backoff = backoff.with_jitter();
            }
            Box::new(backoff)
        });

        tracing::debug!(
            uri = %self.uri,
            protocol = protocol.name,
            service_name = %service_name,
            reconnect = self.reconnect,
            "Subscription client configured"
        );

        let config = ClientConfig {
            uri: self.uri,
            protocols: self.protocols,
            protocol,
            service_name,
            reconnect: self.reconnect,
            keep_alive: self.keep_alive,
            connection_init_payload: self.connection_init_payload,
            rewrite_connection_init_payload: self.rewrite_connection_init_payload,
            on_connected: self.on_connected,
            on_connection_failed: self.on_connection_failed,
            on_reconnect_failed: self.on_reconnect_failed,
        };

        Ok(SubscriptionClient::new(config, strategy, metrics))
    }
}

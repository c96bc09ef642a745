//! Client metrics definitions
//!
//! OpenTelemetry instruments describing the health of a subscription client.
//! Instruments are created from the global meter provider, so they export to
//! whatever backend `gqlws_core::init_observability` configured and are
//! no-ops otherwise.
//!
//! # Metrics Collected
//!
//! - **connection_state**: Current [`ConnectionState`](crate::ConnectionState) (gauge)
//! - **frames_sent**: Outbound frames by wire type (counter)
//! - **frames_received**: Inbound frames by wire type (counter)
//! - **active_operations**: Registered operations (up-down counter)
//! - **errors_total**: Errors by kind (counter)
//! - **reconnection_attempts**: Scheduled reconnects (counter)
//! - **reconnection_success**: Handshakes acknowledged after a reconnect (counter)
//! - **reconnection_exhausted**: Times the attempt budget ran out (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use gqlws_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("inventory-gateway");
//! metrics.record_frame_sent("subscribe");
//! ```

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter, UpDownCounter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state, encoded by [`ConnectionState::as_gauge`]
    pub connection_state: Gauge<i64>,
    pub frames_sent: Counter<u64>,
    pub frames_received: Counter<u64>,
    pub active_operations: UpDownCounter<i64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub reconnection_exhausted: Counter<u64>,
}

impl ClientMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create instruments on a caller-provided meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("gqlws.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=handshaking, 3=ready, 4=reconnecting, 5=closed, 6=failed)")
                .build(),
            frames_sent: meter
                .u64_counter("gqlws.client.frames.sent")
                .with_description("Total number of frames sent")
                .build(),
            frames_received: meter
                .u64_counter("gqlws.client.frames.received")
                .with_description("Total number of frames received")
                .build(),
            active_operations: meter
                .i64_up_down_counter("gqlws.client.operations.active")
                .with_description("Number of registered operations")
                .build(),
            errors_total: meter
                .u64_counter("gqlws.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("gqlws.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("gqlws.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            reconnection_exhausted: meter
                .u64_counter("gqlws.client.reconnection.exhausted")
                .with_description("Times reconnection gave up after the attempt limit")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    pub fn record_frame_sent(&self, frame_type: &str) {
        let attributes = &[KeyValue::new("frame_type", frame_type.to_string())];
        self.frames_sent.add(1, attributes);
    }

    pub fn record_frame_received(&self, frame_type: &str) {
        let attributes = &[KeyValue::new("frame_type", frame_type.to_string())];
        self.frames_received.add(1, attributes);
    }

    pub fn operation_added(&self) {
        self.active_operations.add(1, &[]);
    }

    pub fn operation_removed(&self) {
        self.active_operations.add(-1, &[]);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_reconnection_attempt(&self, attempt: u32) {
        let attributes = &[KeyValue::new("attempt", attempt as i64)];
        self.reconnection_attempts.add(1, attributes);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_reconnection_exhausted(&self) {
        self.reconnection_exhausted.add(1, &[]);
    }
}

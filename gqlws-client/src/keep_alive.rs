//! Keep-alive heartbeat
//!
//! Once a handshake is acknowledged the client can send the protocol's
//! KEEP_ALIVE frame at a fixed interval. The heartbeat is bound to a single
//! connection: it writes into that connection's outbound channel, exits on
//! its own when the channel closes, and is aborted when the [`KeepAlive`]
//! handle is dropped.

use crate::metrics::ClientMetrics;
use gqlws_core::frame::{self, Frame};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

/// Handle to a running heartbeat; dropping it stops the heartbeat
pub struct KeepAlive {
    handle: JoinHandle<()>,
}

impl KeepAlive {
    /// Start sending `frame_type` frames every `interval`
    ///
    /// The first frame goes out one full interval after the call.
    pub fn spawn(
        interval: Duration,
        frame_type: &'static str,
        tx: mpsc::UnboundedSender<Message>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let text = match frame::encode(&Frame::new(frame_type)) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode keep-alive frame");
                    return;
                }
            };

            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(interval_ms = interval.as_millis() as u64, "Keep-alive started");

            loop {
                ticker.tick().await;
                if tx.send(Message::Text(text.clone())).is_err() {
                    tracing::debug!("Keep-alive stopped, connection gone");
                    break;
                }
                if let Some(ref m) = metrics {
                    m.record_frame_sent(frame_type);
                }
                tracing::trace!(frame_type, "Keep-alive sent");
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

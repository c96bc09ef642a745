//! Connection lifecycle events
//!
//! The client publishes fire-and-forget notifications about its socket on a
//! broadcast channel. Any number of listeners can subscribe; a listener that
//! falls behind loses the oldest events instead of slowing the client down.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gqlws_client::{ClientBuilder, ClientEvent};
//!
//! # async fn example() -> gqlws_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:4000/graphql").build()?;
//! let mut events = client.events();
//!
//! client.connect().await;
//! while let Ok(event) = events.recv().await {
//!     if event == ClientEvent::Ready {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Observable lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// The transport opened
    SocketOpen,
    /// The transport closed, for any reason
    SocketClose,
    /// The transport reported an error
    SocketError,
    /// The peer acknowledged the handshake
    Ready,
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientEvent::SocketOpen => "socketOpen",
            ClientEvent::SocketClose => "socketClose",
            ClientEvent::SocketError => "socketError",
            ClientEvent::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Broadcast fan-out of [`ClientEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no listeners is not an error
    pub fn emit(&self, event: ClientEvent) {
        tracing::trace!(%event, listeners = self.tx.receiver_count(), "Lifecycle event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

//! Connection state management
//!
//! Tracks where the client is in the connection lifecycle and owns the
//! reconnection bookkeeping. The manager is a plain value guarded by the
//! client's single state lock; it never performs I/O itself.
//!
//! # Connection States
//!
//! ```text
//! Disconnected → Connecting → Handshaking → Ready
//!        ↑            ↓            ↓          ↓
//!        └──────── Reconnecting ←──┴──────────┘      (unplanned close)
//!                      ↓
//!                    Failed                           (attempts exhausted)
//!
//! any state → Closed                                  (caller-initiated close)
//! ```
//!
//! # Generations
//!
//! Every call to `connect` starts a new generation. Connection tasks and
//! timers remember the generation they were created for and check
//! [`ConnectionManager::is_current`] before touching shared state, so a
//! superseded socket or a stale timer can never act on the live connection.

use crate::reconnect::ReconnectionStrategy;
use std::time::Duration;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `connect` not called yet
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for the connection acknowledgement
    Handshaking,
    /// Handshake acknowledged; operations may be started
    Ready,
    /// Unplanned close; a retry is scheduled
    Reconnecting { attempt: u32 },
    /// Closed by the caller
    Closed,
    /// Reconnection attempts exhausted
    Failed,
}

impl ConnectionState {
    /// Numeric encoding for the connection state gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Handshaking => 2,
            ConnectionState::Ready => 3,
            ConnectionState::Reconnecting { .. } => 4,
            ConnectionState::Closed => 5,
            ConnectionState::Failed => 6,
        }
    }
}

/// Outcome of asking for a reconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Sleep `delay`, then connect if `generation` is still current
    Retry {
        attempt: u32,
        delay: Duration,
        generation: u64,
    },
    /// A retry is already scheduled
    AlreadyPending,
    /// Attempt budget used up
    Exhausted,
}

/// Connection state and reconnection bookkeeping
pub struct ConnectionManager {
    state: ConnectionState,
    generation: u64,
    reconnecting: bool,
    reconnect_attempts: u32,
    closed_by_user: bool,
    strategy: Box<dyn ReconnectionStrategy>,
}

impl ConnectionManager {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            reconnecting: false,
            reconnect_attempts: 0,
            closed_by_user: false,
            strategy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// A transport is open or being opened for the current generation
    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Handshaking | ConnectionState::Ready
        )
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn closed_by_user(&self) -> bool {
        self.closed_by_user
    }

    /// Start a new connection attempt and return its generation
    pub fn connecting(&mut self) -> u64 {
        self.generation += 1;
        self.closed_by_user = false;
        self.state = ConnectionState::Connecting;
        self.generation
    }

    /// Transport opened; the handshake is in flight
    pub fn handshaking(&mut self) {
        self.state = ConnectionState::Handshaking;
    }

    /// Handshake acknowledged
    ///
    /// The only transition into [`ConnectionState::Ready`], and the only
    /// place the attempt counter is reset.
    pub fn acknowledged(&mut self) {
        self.state = ConnectionState::Ready;
        self.reconnecting = false;
        self.reconnect_attempts = 0;
    }

    /// Transport torn down
    ///
    /// A caller-initiated close also bumps the generation so any scheduled
    /// retry or still-draining connection task becomes stale.
    pub fn closed(&mut self, closed_by_user: bool) {
        self.closed_by_user = closed_by_user;
        self.reconnecting = false;
        if closed_by_user {
            self.generation += 1;
            self.state = ConnectionState::Closed;
        } else {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Consult the strategy for the next retry
    pub fn schedule_reconnect(&mut self) -> ReconnectDecision {
        if self.reconnecting {
            return ReconnectDecision::AlreadyPending;
        }

        let attempt = self.reconnect_attempts + 1;
        match self.strategy.next_delay(attempt) {
            Some(delay) => {
                self.reconnect_attempts = attempt;
                self.reconnecting = true;
                self.state = ConnectionState::Reconnecting { attempt };
                ReconnectDecision::Retry {
                    attempt,
                    delay,
                    generation: self.generation,
                }
            }
            None => {
                self.state = ConnectionState::Failed;
                ReconnectDecision::Exhausted
            }
        }
    }
}

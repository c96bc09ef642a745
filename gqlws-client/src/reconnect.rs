//! Reconnection strategies
//!
//! When the connection drops without the caller asking for it, the client
//! consults a [`ReconnectionStrategy`] to decide how long to wait before the
//! next attempt, or whether to give up. Strategies are stateless: the attempt
//! counter lives in the connection bookkeeping and is only reset when the
//! peer acknowledges a handshake, so a socket that opens but never
//! acknowledges keeps consuming the attempt budget.
//!
//! # Default Backoff
//!
//! [`ExponentialBackoff::default`] yields `min(100ms * 2^attempt, 10s)` with
//! no attempt limit and no jitter:
//!
//! ```rust
//! use gqlws_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::default().with_max_attempts(3);
//! assert_eq!(backoff.delay(5), Duration::from_millis(3200));
//! assert_eq!(backoff.next_delay(1), Some(Duration::from_millis(200)));
//! assert_eq!(backoff.next_delay(4), None);
//! ```

use std::time::Duration;

/// Base delay of the default backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound of the default backoff
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Decides the delay before each reconnection attempt
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the given attempt
    ///
    /// `attempt` is the 1-based number of the retry about to be scheduled.
    /// `None` means the budget is exhausted and no retry should be made.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff with an optional attempt limit and jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Give up after this many consecutive unacknowledged retries
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add a random 0-25% to every delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// The raw backoff curve: `min(base * 2^attempt, max)`
    ///
    /// Monotonically non-decreasing in `attempt` and saturating, so very
    /// large attempt numbers simply return the cap.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(max_ms))
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempt > max)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.is_exhausted(attempt) {
            return None;
        }

        let delay = self.delay(attempt);
        if !self.jitter {
            return Some(delay);
        }

        use rand::Rng;
        let delay_ms = delay.as_millis() as u64;
        let jitter_ms = rand::thread_rng().gen_range(0..=(delay_ms / 4));
        Some(Duration::from_millis(delay_ms + jitter_ms))
    }
}

//! Reconnection backoff
//!
//! After an abnormal close the WebSocket transport retries with an
//! exponentially growing delay. Attempts are numbered from 1:
//!
//! ```text
//! delay(k) = min(base * 2^(k-1), max_delay)
//! ```
//!
//! With the default 1 s base and 30 s cap that gives 1 s, 2 s, 4 s, 8 s,
//! 16 s, 30 s, 30 s, ... Once `max_attempts` attempts have been made the
//! policy refuses further attempts until the counter is reset by a
//! successful connect.
//!
//! # Examples
//!
//! ```rust
//! use wireql_client::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::new(Duration::from_secs(30), 10);
//! assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
//! assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
//! assert_eq!(backoff.delay_for(9), Duration::from_secs(30));
//! ```

use crate::config::WebSocketOptions;
use std::time::Duration;

/// Delay before the first reconnect attempt
pub const BASE_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Exponential backoff without jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay: BASE_RECONNECT_DELAY,
            max_delay,
            max_attempts,
        }
    }

    /// Override the first-attempt delay
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }

    /// Whether another attempt may follow `attempts_made` earlier ones
    pub fn allows(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl From<&WebSocketOptions> for ExponentialBackoff {
    fn from(options: &WebSocketOptions) -> Self {
        Self::new(options.max_reconnect_delay, options.max_reconnect_attempts)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&WebSocketOptions::default())
    }
}

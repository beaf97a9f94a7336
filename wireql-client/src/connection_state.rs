//! WebSocket connection state
//!
//! Tracks where the socket is in its lifecycle and owns the reconnect
//! attempt counter that drives [`ExponentialBackoff`].
//!
//! ```text
//! Disconnected → Connecting → Connected
//!       ↑             ↓           ↓
//!    Failed  ←  Reconnecting ← (abnormal close)
//! ```
//!
//! A successful connect resets the counter. `Failed` is sticky until the
//! caller connects manually.

use crate::reconnect::ExponentialBackoff;
use std::time::Duration;
use tokio::sync::RwLock;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Socket open
    Connected,
    /// Waiting before reconnect attempt `attempt`
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted
    Failed,
}

#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    attempts: u32,
}

/// Connection state plus reconnect bookkeeping
#[derive(Debug)]
pub struct ConnectionManager {
    shared: RwLock<Shared>,
    backoff: ExponentialBackoff,
}

impl ConnectionManager {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            shared: RwLock::new(Shared {
                state: ConnectionState::Disconnected,
                attempts: 0,
            }),
            backoff,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.read().await.state
    }

    /// Reconnect attempts made since the last successful connect
    pub async fn attempts(&self) -> u32 {
        self.shared.read().await.attempts
    }

    pub async fn connecting(&self) {
        self.shared.write().await.state = ConnectionState::Connecting;
    }

    /// Socket opened; the attempt counter starts over
    pub async fn connected(&self) {
        let mut shared = self.shared.write().await;
        shared.state = ConnectionState::Connected;
        shared.attempts = 0;
    }

    pub async fn disconnected(&self) {
        let mut shared = self.shared.write().await;
        if shared.state != ConnectionState::Failed {
            shared.state = ConnectionState::Disconnected;
        }
    }

    /// Claim the next reconnect attempt
    ///
    /// Returns the 1-based attempt number and the delay to wait before it, or
    /// `None` once the attempt budget is spent.
    pub async fn next_reconnect_delay(&self) -> Option<(u32, Duration)> {
        let mut shared = self.shared.write().await;

        if !self.backoff.allows(shared.attempts) {
            shared.state = ConnectionState::Failed;
            return None;
        }

        shared.attempts += 1;
        let attempt = shared.attempts;
        shared.state = ConnectionState::Reconnecting { attempt };
        Some((attempt, self.backoff.delay_for(attempt)))
    }

    /// Leave `Failed` so a manual connect can proceed
    pub async fn reset(&self) {
        let mut shared = self.shared.write().await;
        if shared.state == ConnectionState::Failed {
            shared.state = ConnectionState::Disconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_attempts: u32) -> ConnectionManager {
        ConnectionManager::new(ExponentialBackoff::new(Duration::from_secs(30), max_attempts))
    }

    #[tokio::test]
    async fn test_connection_state_transitions() {
        let manager = manager(10);
        assert_eq!(manager.state().await, ConnectionState::Disconnected);

        manager.connecting().await;
        assert_eq!(manager.state().await, ConnectionState::Connecting);

        manager.connected().await;
        assert_eq!(manager.state().await, ConnectionState::Connected);

        manager.disconnected().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnection_attempts_until_failed() {
        let manager = manager(3);

        assert_eq!(
            manager.next_reconnect_delay().await,
            Some((1, Duration::from_secs(1)))
        );
        assert_eq!(
            manager.state().await,
            ConnectionState::Reconnecting { attempt: 1 }
        );
        assert_eq!(
            manager.next_reconnect_delay().await,
            Some((2, Duration::from_secs(2)))
        );
        assert_eq!(
            manager.next_reconnect_delay().await,
            Some((3, Duration::from_secs(4)))
        );

        assert_eq!(manager.next_reconnect_delay().await, None);
        assert_eq!(manager.state().await, ConnectionState::Failed);
        assert_eq!(manager.attempts().await, 3);

        // Failed survives a close notification
        manager.disconnected().await;
        assert_eq!(manager.state().await, ConnectionState::Failed);

        manager.reset().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_counter_resets_on_connect() {
        let manager = manager(5);
        manager.next_reconnect_delay().await;
        manager.next_reconnect_delay().await;
        assert_eq!(manager.attempts().await, 2);

        manager.connected().await;
        assert_eq!(manager.attempts().await, 0);
        assert_eq!(
            manager.next_reconnect_delay().await,
            Some((1, Duration::from_secs(1)))
        );
    }
}

//! Connection statistics
//!
//! Counters are updated from every completed call and from the WebSocket
//! lifecycle; callers read a [`ConnectionStats`] snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Number of recent calls the average latency is computed over
pub const LATENCY_WINDOW: usize = 100;

/// Point-in-time view of the client's connection statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub websocket_connected: bool,
    pub http_requests: u64,
    pub websocket_messages: u64,
    pub reconnections: u64,
    /// Mean latency of the last 100 completed calls, in milliseconds
    pub average_latency: f64,
    pub last_error: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    websocket_connected: bool,
    http_requests: u64,
    websocket_messages: u64,
    reconnections: u64,
    latencies: VecDeque<Duration>,
    last_error: Option<String>,
    last_activity: Option<DateTime<Utc>>,
}

/// Shared, mutable statistics behind a short-lived lock
#[derive(Debug, Default)]
pub struct StatsTracker {
    counters: Mutex<Counters>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let counters = self.lock();
        let average_latency = if counters.latencies.is_empty() {
            0.0
        } else {
            let total: f64 = counters
                .latencies
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .sum();
            total / counters.latencies.len() as f64
        };

        ConnectionStats {
            websocket_connected: counters.websocket_connected,
            http_requests: counters.http_requests,
            websocket_messages: counters.websocket_messages,
            reconnections: counters.reconnections,
            average_latency,
            last_error: counters.last_error.clone(),
            last_activity: counters.last_activity,
        }
    }

    pub fn set_websocket_connected(&self, connected: bool) {
        let mut counters = self.lock();
        counters.websocket_connected = connected;
        counters.last_activity = Some(Utc::now());
    }

    pub fn record_http_request(&self, latency: Duration) {
        let mut counters = self.lock();
        counters.http_requests += 1;
        Self::push_latency(&mut counters, latency);
    }

    pub fn record_websocket_message(&self, latency: Duration) {
        let mut counters = self.lock();
        counters.websocket_messages += 1;
        Self::push_latency(&mut counters, latency);
    }

    pub fn record_reconnection(&self) {
        self.lock().reconnections += 1;
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let mut counters = self.lock();
        counters.last_error = Some(message.into());
        counters.last_activity = Some(Utc::now());
    }

    fn push_latency(counters: &mut Counters, latency: Duration) {
        if counters.latencies.len() == LATENCY_WINDOW {
            counters.latencies.pop_front();
        }
        counters.latencies.push_back(latency);
        counters.last_activity = Some(Utc::now());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let stats = StatsTracker::new().snapshot();
        assert!(!stats.websocket_connected);
        assert_eq!(stats.http_requests, 0);
        assert_eq!(stats.average_latency, 0.0);
        assert!(stats.last_error.is_none());
        assert!(stats.last_activity.is_none());
    }

    #[test]
    fn test_counters_and_average() {
        let tracker = StatsTracker::new();
        tracker.record_http_request(Duration::from_millis(10));
        tracker.record_websocket_message(Duration::from_millis(30));
        tracker.record_reconnection();

        let stats = tracker.snapshot();
        assert_eq!(stats.http_requests, 1);
        assert_eq!(stats.websocket_messages, 1);
        assert_eq!(stats.reconnections, 1);
        assert!((stats.average_latency - 20.0).abs() < 1e-9);
        assert!(stats.last_activity.is_some());
    }

    #[test]
    fn test_latency_window_drops_oldest() {
        let tracker = StatsTracker::new();
        tracker.record_http_request(Duration::from_millis(1000));
        for _ in 0..LATENCY_WINDOW {
            tracker.record_http_request(Duration::from_millis(10));
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.http_requests, LATENCY_WINDOW as u64 + 1);
        assert!((stats.average_latency - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_last_error() {
        let tracker = StatsTracker::new();
        tracker.record_error("HTTP 500: Internal Server Error");
        assert_eq!(
            tracker.snapshot().last_error.as_deref(),
            Some("HTTP 500: Internal Server Error")
        );
    }
}

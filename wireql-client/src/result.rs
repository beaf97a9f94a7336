//! Call results and client-side timing
//!
//! Every successful call yields a [`QueryResult`]: the rows (if any), the
//! unwrapped server envelope, and [`PerformanceMetrics`] measured on the
//! client. Network time is what remains of the total once serialization is
//! taken out.

use crate::transport::Delivery;
use serde::Serialize;
use std::time::Duration;
use wireql_core::{Error, Result, Row, SqlResponse};

/// Client-side measurements for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_time: Duration,
    pub network_time: Duration,
    pub serialization_time: Duration,
    /// Encoded request size in bytes
    pub request_size: usize,
    /// Raw response size in bytes
    pub response_size: usize,
}

impl PerformanceMetrics {
    pub fn new(total_time: Duration, delivery: &Delivery) -> Self {
        Self {
            total_time,
            network_time: total_time.saturating_sub(delivery.serialization_time),
            serialization_time: delivery.serialization_time,
            request_size: delivery.request_size,
            response_size: delivery.response_size,
        }
    }
}

/// Outcome of a successful call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub data: Option<Vec<Row>>,
    pub metrics: PerformanceMetrics,
    pub raw: SqlResponse,
}

impl QueryResult {
    /// Wrap a delivery, turning `success: false` into `Error::Server`
    ///
    /// `fallback` is the message used when the server gave none.
    pub fn from_delivery(delivery: Delivery, total_time: Duration, fallback: &str) -> Result<Self> {
        if !delivery.response.success {
            let message = delivery
                .response
                .error
                .clone()
                .unwrap_or_else(|| fallback.to_string());
            return Err(Error::Server(message));
        }

        let metrics = PerformanceMetrics::new(total_time, &delivery);
        Ok(Self {
            data: delivery.response.data.clone(),
            metrics,
            raw: delivery.response,
        })
    }

    /// Placeholder entry for a batch item that failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            data: None,
            metrics: PerformanceMetrics::default(),
            raw: SqlResponse::failure(message),
        }
    }

    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or_default()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows().first()
    }

    pub fn rows_affected(&self) -> Option<u64> {
        self.raw.rows_affected
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.raw.last_insert_id
    }

    pub fn is_success(&self) -> bool {
        self.raw.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delivery(response: SqlResponse) -> Delivery {
        Delivery {
            response,
            request_size: 64,
            response_size: 128,
            serialization_time: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_success_wraps_rows_and_metrics() {
        let result = QueryResult::from_delivery(
            delivery(SqlResponse::with_rows(vec![json!({"id": 1})])),
            Duration::from_millis(10),
            "Unknown error",
        )
        .unwrap();

        assert_eq!(result.first(), Some(&json!({"id": 1})));
        assert_eq!(result.metrics.total_time, Duration::from_millis(10));
        assert_eq!(result.metrics.network_time, Duration::from_millis(7));
        assert_eq!(result.metrics.request_size, 64);
        assert_eq!(result.metrics.response_size, 128);
    }

    #[test]
    fn test_network_time_saturates() {
        let result = QueryResult::from_delivery(
            delivery(SqlResponse::with_rows(vec![])),
            Duration::from_millis(1),
            "Unknown error",
        )
        .unwrap();
        assert_eq!(result.metrics.network_time, Duration::ZERO);
    }

    #[test]
    fn test_failure_becomes_server_error() {
        let err = QueryResult::from_delivery(
            delivery(SqlResponse::failure("no such table: users")),
            Duration::from_millis(1),
            "Unknown error",
        )
        .unwrap_err();
        assert_eq!(err, Error::Server("no such table: users".to_string()));

        let err = QueryResult::from_delivery(
            delivery(SqlResponse::default()),
            Duration::from_millis(1),
            "Transaction failed",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Transaction failed");
    }

    #[test]
    fn test_failed_placeholder() {
        let result = QueryResult::failed("Network error");
        assert!(result.data.is_none());
        assert!(result.rows().is_empty());
        assert!(!result.is_success());
        assert_eq!(result.metrics, PerformanceMetrics::default());
        assert_eq!(result.raw.error.as_deref(), Some("Network error"));
    }
}

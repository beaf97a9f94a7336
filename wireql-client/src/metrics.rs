//! Client metrics definitions
//!
//! OpenTelemetry instruments recorded when `ClientConfig::with_metrics(true)`
//! is set. They are created from the global meter provider, so they export
//! wherever `wireql_core::init_observability` (or the application) pointed
//! that provider.
//!
//! # Metrics Collected
//!
//! - **requests_total**: completed calls by operation, transport and status (counter)
//! - **request_duration**: call latency in seconds (histogram)
//! - **errors_total**: failed calls by error kind (counter)
//! - **reconnection_attempts** / **reconnection_success**: WebSocket reconnects (counters)
//! - **batch_size**: items per batch call (histogram)
//! - **payload_bytes**: encoded request and response sizes (histogram)

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    pub requests_total: Counter<u64>,
    /// Seconds
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub batch_size: Histogram<u64>,
    pub payload_bytes: Histogram<u64>,
}

impl ClientMetrics {
    /// Instruments on the global meter named `wireql-client`
    pub fn new() -> Self {
        let meter = global::meter("wireql-client");
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("wireql.client.requests.total")
                .with_description("Total number of completed SQL calls")
                .build(),
            request_duration: meter
                .f64_histogram("wireql.client.request.duration")
                .with_description("SQL call duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("wireql.client.errors.total")
                .with_description("Total number of failed SQL calls")
                .build(),
            reconnection_attempts: meter
                .u64_counter("wireql.client.reconnection.attempts")
                .with_description("Total number of WebSocket reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("wireql.client.reconnection.success")
                .with_description("Total number of successful WebSocket reconnections")
                .build(),
            batch_size: meter
                .u64_histogram("wireql.client.batch.size")
                .with_description("Number of statements per batch call")
                .build(),
            payload_bytes: meter
                .u64_histogram("wireql.client.payload.bytes")
                .with_description("Encoded envelope size in bytes")
                .with_unit("By")
                .build(),
        }
    }

    pub fn record_request(&self, operation: &str, transport: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("transport", transport.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, error_kind: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_type", error_kind.to_string())]);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    pub fn record_payload(&self, request_bytes: usize, response_bytes: usize) {
        self.payload_bytes
            .record(request_bytes as u64, &[KeyValue::new("direction", "outbound")]);
        self.payload_bytes
            .record(response_bytes as u64, &[KeyValue::new("direction", "inbound")]);
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

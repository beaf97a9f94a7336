//! The WireQL client
//!
//! `WireQLClient` owns both transports and routes every call through exactly
//! one of them:
//!
//! - `use_websocket: Some(false)` always goes over HTTP
//! - `use_websocket: Some(true)` requires an open socket and fails with
//!   `Error::NotConnected` otherwise
//! - `use_websocket: None` prefers the socket when it is open
//!
//! Building a client performs no network I/O. The socket is only opened by
//! [`WireQLClient::connect`]; until then everything travels over HTTP.
//!
//! # Cloning
//!
//! `WireQLClient` is cheaply cloneable using `Arc` internally. All clones
//! share the same socket, statistics and listeners.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wireql_client::{ClientConfig, QueryOptions, WireQLClient};
//! use serde_json::json;
//!
//! # async fn example() -> wireql_core::Result<()> {
//! let client = WireQLClient::new(ClientConfig::new("localhost").with_api_key("secret"))?;
//!
//! let users = client
//!     .query("SELECT * FROM users WHERE age > ?", vec![json!(18)], QueryOptions::default())
//!     .await?;
//! println!("{} rows in {:?}", users.rows().len(), users.metrics.total_time);
//!
//! client.connect().await?;
//! let inserted = client
//!     .insert("INSERT INTO users (name) VALUES (?)", vec![json!("Ada")], QueryOptions::default())
//!     .await?;
//! println!("new id: {:?}", inserted.last_insert_id());
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, QueryOptions, TransactionOptions};
use crate::connection_state::ConnectionState;
use crate::events::{ClientEvent, EventBus, EventKind, ListenerId};
use crate::http::HttpTransport;
use crate::metrics::ClientMetrics;
use crate::request::RequestBuilder;
use crate::result::QueryResult;
use crate::stats::{ConnectionStats, StatsTracker};
use crate::transport::{Delivery, DeliveryOptions, Outbound, Transport};
use crate::websocket::WebSocketTransport;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use wireql_core::{Error, Result, SqlOperation, SqlResponse, SqlStep};

const UNKNOWN_ERROR: &str = "Unknown error";
const TRANSACTION_FAILED: &str = "Transaction failed";

/// Raw SQL client over HTTP and WebSocket
#[derive(Clone)]
pub struct WireQLClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    http: HttpTransport,
    websocket: WebSocketTransport,
    events: EventBus,
    stats: Arc<StatsTracker>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl std::fmt::Debug for WireQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireQLClient")
            .field("http", &self.inner.config.http_base_url())
            .field("websocket", &self.inner.websocket.url())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl WireQLClient {
    /// Build a client; validates `config` and opens nothing
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new();
        let stats = Arc::new(StatsTracker::new());
        let metrics = config.metrics.then(|| Arc::new(ClientMetrics::new()));
        let http = HttpTransport::new(&config)?;
        let websocket =
            WebSocketTransport::new(&config, events.clone(), Arc::clone(&stats), metrics.clone());

        tracing::debug!(host = %config.host, port = config.port, format = %config.serialization_format, "Client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                http,
                websocket,
                events,
                stats,
                metrics,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open the WebSocket channel
    pub async fn connect(&self) -> Result<()> {
        self.inner.websocket.connect().await
    }

    /// Close the WebSocket channel; later calls fall back to HTTP
    pub async fn disconnect(&self) {
        self.inner.websocket.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.inner.websocket.is_connected()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.websocket.connection_state().await
    }

    /// Run a statement and return its rows
    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn query(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.statement(SqlOperation::Query, sql, values, options).await
    }

    /// Run a statement expected to return at most one row
    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn single(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.statement(SqlOperation::Single, sql, values, options).await
    }

    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn insert(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.statement(SqlOperation::Insert, sql, values, options).await
    }

    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn update(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.statement(SqlOperation::Update, sql, values, options).await
    }

    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn delete(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.statement(SqlOperation::Delete, sql, values, options).await
    }

    /// Run a single statement with an explicit operation
    pub async fn statement(
        &self,
        op: SqlOperation,
        sql: &str,
        values: Vec<Value>,
        options: QueryOptions,
    ) -> Result<QueryResult> {
        let request = RequestBuilder::new(&self.inner.config).statement(op, sql, values, &options);
        self.execute(Outbound::Statement(&request), &options).await
    }

    /// Run `steps` atomically in one round trip
    #[tracing::instrument(level = "debug", skip(self, steps, options), fields(steps = steps.len()))]
    pub async fn transaction(&self, steps: Vec<SqlStep>, options: TransactionOptions) -> Result<QueryResult> {
        if steps.is_empty() {
            return Err(Error::InvalidRequest(
                "transaction needs at least one step".to_string(),
            ));
        }
        let request = RequestBuilder::new(&self.inner.config).transaction(steps, &options);
        self.execute(Outbound::Transaction(&request), &options.query).await
    }

    /// Run a query and return the server envelope as-is
    ///
    /// Never fails: a `success: false` envelope is returned untouched, and a
    /// transport or usage error becomes `{success: false, error: <message>}`.
    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn raw(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> SqlResponse {
        let request =
            RequestBuilder::new(&self.inner.config).statement(SqlOperation::Query, sql, values, &options);
        match self.deliver(Outbound::Statement(&request), &options).await {
            Ok(delivery) => delivery.response,
            Err(e) => {
                self.note_failure(&e);
                SqlResponse::failure(e.to_string())
            }
        }
    }

    /// Check that the server answers `SELECT 1`
    pub async fn ping(&self) -> bool {
        self.query("SELECT 1 as ping", Vec::new(), QueryOptions::default())
            .await
            .is_ok()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.inner.stats.snapshot()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.once(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn emit(&self, event: &ClientEvent) {
        self.inner.events.emit(event)
    }

    pub(crate) fn metrics(&self) -> Option<&ClientMetrics> {
        self.inner.metrics.as_deref()
    }

    async fn execute(&self, outbound: Outbound<'_>, options: &QueryOptions) -> Result<QueryResult> {
        let fallback = if outbound.is_transaction() {
            TRANSACTION_FAILED
        } else {
            UNKNOWN_ERROR
        };

        let started = Instant::now();
        let result = self
            .deliver(outbound, options)
            .await
            .and_then(|delivery| QueryResult::from_delivery(delivery, started.elapsed(), fallback));

        if let Err(ref e) = result {
            self.note_failure(e);
        }
        result
    }

    /// Route one envelope through the selected transport and account for it
    async fn deliver(&self, outbound: Outbound<'_>, options: &QueryOptions) -> Result<Delivery> {
        let config = &self.inner.config;
        let delivery_options = DeliveryOptions {
            format: options.format.unwrap_or(config.serialization_format),
            timeout: options.timeout.unwrap_or(config.timeout),
        };
        let transport = self.select_transport(options)?;
        let operation = outbound.operation();

        let started = Instant::now();
        let result = transport.send(outbound, &delivery_options).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(delivery) => {
                if transport.name() == "websocket" {
                    self.inner.stats.record_websocket_message(elapsed);
                } else {
                    self.inner.stats.record_http_request(elapsed);
                }
                if let Some(m) = self.metrics() {
                    let status = if delivery.response.success { "success" } else { "error" };
                    m.record_request(operation, transport.name(), status, elapsed.as_secs_f64());
                    m.record_payload(delivery.request_size, delivery.response_size);
                }
                if config.debug {
                    tracing::debug!(
                        transport = transport.name(),
                        operation,
                        success = delivery.response.success,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Call completed"
                    );
                }
            }
            Err(e) => {
                if let Some(m) = self.metrics() {
                    m.record_request(operation, transport.name(), "error", elapsed.as_secs_f64());
                }
                if config.debug {
                    tracing::debug!(transport = transport.name(), operation, error = %e, "Call failed");
                }
            }
        }

        result
    }

    fn select_transport(&self, options: &QueryOptions) -> Result<&dyn Transport> {
        let connected = self.inner.websocket.is_connected();
        match options.use_websocket {
            Some(false) => Ok(&self.inner.http),
            Some(true) if connected => Ok(&self.inner.websocket),
            Some(true) => Err(Error::NotConnected),
            None if connected => Ok(&self.inner.websocket),
            None => Ok(&self.inner.http),
        }
    }

    fn note_failure(&self, error: &Error) {
        if error.is_transport() {
            tracing::warn!(kind = error.kind(), error = %error, "Call failed in transport");
        } else {
            tracing::debug!(kind = error.kind(), error = %error, "Call failed");
        }
        self.inner.stats.record_error(error.to_string());
        if let Some(m) = self.metrics() {
            m.record_error(error.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_validates_config() {
        assert!(matches!(
            WireQLClient::new(ClientConfig::new("")),
            Err(Error::InvalidConfig(_))
        ));
        let client = WireQLClient::new(ClientConfig::new("localhost")).unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.stats().http_requests, 0);
    }

    #[tokio::test]
    async fn test_websocket_only_call_while_disconnected() {
        let client = WireQLClient::new(ClientConfig::new("localhost")).unwrap();
        let err = client
            .query("SELECT 1", vec![], QueryOptions::new().use_websocket(true))
            .await
            .unwrap_err();

        assert_eq!(err, Error::NotConnected);
        assert_eq!(client.stats().last_error.as_deref(), Some("WebSocket not connected"));
    }

    #[tokio::test]
    async fn test_empty_transaction_rejected() {
        let client = WireQLClient::new(ClientConfig::new("localhost")).unwrap();
        let err = client
            .transaction(vec![], TransactionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_ping_false_when_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = WireQLClient::new(
            ClientConfig::new("127.0.0.1")
                .with_port(port)
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        assert!(!client.ping().await);
    }

    #[test]
    fn test_listener_registration() {
        let client = WireQLClient::new(ClientConfig::new("localhost")).unwrap();
        let id = client.on(EventKind::Connect, |_| {});
        client.once(EventKind::Pong, |_| {});
        assert_eq!(client.events().listener_count(), 2);

        client.emit(&ClientEvent::Pong);
        assert!(client.off(id));
        assert_eq!(client.events().listener_count(), 0);
    }
}

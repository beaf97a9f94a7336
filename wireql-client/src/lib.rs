//! Raw SQL client for WireQL over HTTP and WebSocket
//!
//! This crate sends SQL statements to a WireQL server and returns the rows
//! together with client-side timing. Every call travels over exactly one of
//! two transports:
//!
//! - **HTTP**: one POST per call to `/api/sql/...`, always available
//! - **WebSocket**: a persistent `/ws` connection with request correlation,
//!   keepalive pings and automatic reconnection
//!
//! # Core Features
//!
//! - **Statements**: query, single, insert, update, delete, raw
//! - **Transactions**: ordered steps executed atomically by the server
//! - **Batches**: sequential or parallel, with a stop-on-error policy
//! - **Streaming**: row-by-row iteration with progress callbacks
//! - **Formats**: JSON or MessagePack, per client or per call
//! - **Events**: connect, disconnect, reconnect and message listeners
//! - **Observability**: `tracing` spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wireql_client::{ClientConfig, QueryOptions, WireQLClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WireQLClient::new(ClientConfig::new("localhost").with_api_key("secret"))?;
//!
//!     // Plain HTTP until a socket is opened
//!     let result = client
//!         .query("SELECT * FROM users WHERE id = ?", vec![json!(1)], QueryOptions::default())
//!         .await?;
//!     println!("{:?}", result.first());
//!
//!     // Calls now prefer the socket
//!     client.connect().await?;
//!     println!("ping: {}", client.ping().await);
//!     client.disconnect().await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # With Reconnection
//!
//! ```rust,no_run
//! use wireql_client::{ClientConfig, ClientEvent, EventKind, WebSocketOptions, WireQLClient};
//! use std::time::Duration;
//!
//! # async fn example() -> wireql_core::Result<()> {
//! let config = ClientConfig::new("db.example.com")
//!     .with_secure(true)
//!     .with_websocket(
//!         WebSocketOptions::default()
//!             .with_max_reconnect_attempts(5)
//!             .with_max_reconnect_delay(Duration::from_secs(10)),
//!     );
//!
//! let client = WireQLClient::new(config)?;
//! client.on(EventKind::Reconnecting, |event| {
//!     if let ClientEvent::Reconnecting { attempt } = event {
//!         println!("reconnect attempt {}", attempt);
//!     }
//! });
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
mod config;
mod connection_state;
mod events;
mod facade;
mod http;
mod metrics;
mod reconnect;
mod request;
mod result;
mod stats;
mod stream;
mod transport;
mod websocket;

pub use batch::{BatchItem, BatchOptions};
pub use client::WireQLClient;
pub use config::{ClientConfig, QueryOptions, TransactionOptions, WebSocketOptions, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use connection_state::{ConnectionManager, ConnectionState};
pub use events::{ClientEvent, EventBus, EventHandler, EventKind, ListenerId};
pub use facade::{create_callable_wireql, create_client, create_wireql, WireQL};
pub use http::{HttpTransport, CLIENT_USER_AGENT};
pub use metrics::ClientMetrics;
pub use reconnect::ExponentialBackoff;
pub use request::{CallKind, PendingGuard, RequestBuilder, RequestManager};
pub use result::{PerformanceMetrics, QueryResult};
pub use stats::{ConnectionStats, StatsTracker};
pub use stream::{RowStream, StreamOptions};
pub use transport::{Delivery, DeliveryOptions, Outbound, Transport};
pub use websocket::WebSocketTransport;

pub use wireql_core::{
    AuthInfo, Error, Result, Row, SerializationFormat, SqlOperation, SqlRequest, SqlResponse,
    SqlStep,
};

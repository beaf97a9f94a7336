//! WireQL - raw SQL over HTTP and WebSocket
//!
//! This is the convenience crate that re-exports the WireQL sub-crates. Use
//! it if you want a single dependency for the whole client.
//!
//! # Architecture
//!
//! - **wireql-core**: wire types, JSON/MessagePack codec, errors, observability
//! - **wireql-client**: HTTP and WebSocket transports, batching, streaming,
//!   events and statistics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wireql::{create_client, ClientConfig, QueryOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     wireql::core::init_observability(Default::default())?;
//!
//!     let db = create_client(ClientConfig::from_env()?)?;
//!     let result = db
//!         .call("SELECT * FROM users WHERE id = ?", vec![json!(1)], QueryOptions::default())
//!         .await?;
//!     println!("{:?} in {:?}", result.first(), result.metrics.total_time);
//!
//!     Ok(())
//! }
//! ```

// Access everything through the `wireql::` prefix
pub use wireql_client as client;
pub use wireql_core as core;

// Convenience re-exports of the most commonly used types
pub use wireql_client::{
    create_client, ClientConfig, QueryOptions, QueryResult, WireQL, WireQLClient,
};
pub use wireql_core::{Error, Result};

//! Core types and codec for the WireQL SQL client
//!
//! This crate holds everything that is independent of the transport:
//!
//! - **Types**: request and response envelopes, operations, formats, auth
//! - **Codec**: JSON / MessagePack encoding and first-byte frame sniffing
//! - **Error handling**: the error taxonomy shared by every client call
//! - **Observability**: `tracing` subscriber and OpenTelemetry bootstrap
//!
//! The `wireql-client` crate builds the HTTP and WebSocket transports on top.
//!
//! # Example
//!
//! ```rust
//! use wireql_core::{codec, SerializationFormat, SqlOperation, SqlRequest};
//! use serde_json::json;
//!
//! let request = SqlRequest::new(SqlOperation::Query, "SELECT * FROM users WHERE id = ?", vec![json!(1)]);
//! let bytes = codec::encode(&request, SerializationFormat::Json).unwrap();
//! assert!(bytes.starts_with(b"{"));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    ApiResponse, AuthInfo, Row, SerializationFormat, SqlOperation, SqlRequest, SqlResponse,
    SqlStep, TransactionRequest,
};

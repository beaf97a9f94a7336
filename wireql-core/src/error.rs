//! Error types for WireQL
//!
//! A single `Error` enum covers every failure a client call can surface. The
//! variants fall into three groups:
//!
//! - **Transport**: Timeout, Network, Http, WebSocket, ConnectionClosed
//! - **Protocol**: Server (the server answered `success: false`),
//!   Serialization, Decode
//! - **Usage**: NotConnected, InvalidRequest, InvalidConfig
//!
//! The `Display` text of each variant is what ends up in
//! `ConnectionStats::last_error` and in synthetic failure envelopes, so
//! `Network` and `Server` render the underlying message verbatim and `Http`
//! renders as `HTTP <status>: <status text>`.
//!
//! # Examples
//!
//! ```rust
//! use wireql_core::Error;
//!
//! let error = Error::Http { status: 500, status_text: "Internal Server Error".into() };
//! assert_eq!(error.to_string(), "HTTP 500: Internal Server Error");
//! ```

use thiserror::Error;

/// Result type for WireQL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for WireQL operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A deadline expired before the server answered
    ///
    /// Applies to HTTP calls, WebSocket calls and the WebSocket connect
    /// handshake. No partial response is ever returned.
    #[error("{0}")]
    Timeout(String),

    /// The request never reached the server (DNS, refused connection, reset)
    #[error("{0}")]
    Network(String),

    /// The HTTP endpoint answered with a non-2xx status
    #[error("HTTP {status}: {status_text}")]
    Http {
        /// Numeric status code
        status: u16,
        /// Canonical reason phrase for `status` (e.g. `Not Found`), not the
        /// phrase the server sent; empty for unregistered codes
        status_text: String,
    },

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The WebSocket connection closed while the call was being sent
    #[error("Connection closed")]
    ConnectionClosed,

    /// The server processed the request and reported `success: false`
    #[error("{0}")]
    Server(String),

    /// An envelope could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A payload could not be decoded as JSON or MessagePack
    #[error("Decode error: {0}")]
    Decode(String),

    /// A WebSocket-only call was made while the socket is down
    #[error("WebSocket not connected")]
    NotConnected,

    /// The call itself is malformed (e.g. an empty transaction)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable label used for metrics attributes and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Timeout(_) => "timeout",
            Error::Network(_) => "network",
            Error::Http { .. } => "http_status",
            Error::WebSocket(_) => "websocket",
            Error::ConnectionClosed => "connection_closed",
            Error::Server(_) => "server",
            Error::Serialization(_) => "serialization",
            Error::Decode(_) => "decode",
            Error::NotConnected => "not_connected",
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether the failure happened below the SQL layer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::Network(_)
                | Error::Http { .. }
                | Error::WebSocket(_)
                | Error::ConnectionClosed
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Self::Serialization(e.to_string())
        } else {
            Self::Decode(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

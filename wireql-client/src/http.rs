//! One-shot HTTP transport
//!
//! Every call is a single `POST` to one of four endpoints, picked by the
//! envelope kind and the payload format:
//!
//! | Envelope | JSON | MessagePack |
//! |---|---|---|
//! | statement | `/api/sql` | `/api/sql/msgpack` |
//! | transaction | `/api/transaction` | `/api/transaction/msgpack` |
//!
//! The body comes back wrapped in an `ApiResponse`, whose `data` is the
//! `SqlResponse` handed to the caller. Non-2xx statuses are errors and are
//! never retried.

use crate::config::ClientConfig;
use crate::transport::{Delivery, DeliveryOptions, Outbound, Transport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use wireql_core::{codec, ApiResponse, Error, Result, SerializationFormat, SqlResponse};

/// `User-Agent` sent with every request
pub const CLIENT_USER_AGENT: &str = concat!("WireQL-Rust-Client/", env!("CARGO_PKG_VERSION"));

/// HTTP transport backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    debug: bool,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidConfig(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidConfig(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.http_base_url(),
            headers,
            debug: config.debug,
        })
    }

    /// Full endpoint URL for an envelope in `format`
    pub fn endpoint(&self, outbound: &Outbound<'_>, format: SerializationFormat) -> String {
        let path = match (outbound.is_transaction(), format) {
            (false, SerializationFormat::Json) => "/api/sql",
            (false, SerializationFormat::MessagePack) => "/api/sql/msgpack",
            (true, SerializationFormat::Json) => "/api/transaction",
            (true, SerializationFormat::MessagePack) => "/api/transaction/msgpack",
        };
        format!("{}{}", self.base_url, path)
    }

    /// Custom headers, then `Content-Type`, then `User-Agent`
    fn request_headers(&self, format: SerializationFormat) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers
    }

    async fn round_trip(&self, url: &str, body: Vec<u8>, format: SerializationFormat) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .headers(self.request_headers(format))
            .body(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, outbound: Outbound<'_>, options: &DeliveryOptions) -> Result<Delivery> {
        let (body, encode_time) = codec::encode_timed(&outbound, options.format)?;
        let request_size = body.len();
        let url = self.endpoint(&outbound, options.format);

        if self.debug {
            tracing::debug!(url = %url, bytes = request_size, format = %options.format, "Sending HTTP request");
        }

        let bytes = tokio::time::timeout(options.timeout, self.round_trip(&url, body, options.format))
            .await
            .map_err(|_| Error::Timeout("HTTP request timeout".to_string()))??;

        let (envelope, decode_time): (ApiResponse<SqlResponse>, _) =
            codec::decode_timed(&bytes, options.format)?;

        if self.debug {
            tracing::debug!(bytes = bytes.len(), success = envelope.success, "HTTP response received");
        }

        Ok(Delivery {
            response: envelope.into_inner(),
            request_size,
            response_size: bytes.len(),
            serialization_time: encode_time + decode_time,
        })
    }
}

/// Map a `reqwest` failure below the HTTP status layer
fn network_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

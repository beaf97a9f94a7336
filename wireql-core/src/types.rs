//! WireQL wire types
//!
//! These structures mirror the envelopes exchanged with a WireQL server. The
//! same shapes travel over HTTP and WebSocket, encoded either as JSON or as
//! MessagePack (named maps, so field names survive the binary encoding).
//!
//! # Envelopes
//!
//! - **SqlRequest**: a single statement (`query`, `single`, `insert`, ...)
//! - **TransactionRequest**: an ordered list of steps executed atomically
//! - **SqlResponse**: the server's answer to either of the above
//! - **ApiResponse**: the outer `{success, data, error}` wrapper used by the
//!   HTTP endpoints
//!
//! Parameters are opaque `serde_json::Value`s. The client never inspects or
//! coerces them; binding is the server's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single result row as returned by the server
pub type Row = serde_json::Value;

/// SQL operation kinds understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlOperation {
    Query,
    Single,
    Insert,
    Update,
    Delete,
    Transaction,
}

impl SqlOperation {
    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperation::Query => "query",
            SqlOperation::Single => "single",
            SqlOperation::Insert => "insert",
            SqlOperation::Update => "update",
            SqlOperation::Delete => "delete",
            SqlOperation::Transaction => "transaction",
        }
    }
}

impl fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload encoding negotiated with the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    Json,
    #[default]
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl SerializationFormat {
    /// HTTP `Content-Type` for bodies in this format
    pub fn content_type(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "application/json",
            SerializationFormat::MessagePack => "application/octet-stream",
        }
    }

    /// Whether this is the binary (MessagePack) format
    pub fn is_binary(&self) -> bool {
        matches!(self, SerializationFormat::MessagePack)
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationFormat::Json => f.write_str("json"),
            SerializationFormat::MessagePack => f.write_str("msgpack"),
        }
    }
}

/// Credentials embedded in every request envelope
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthInfo {
    pub fn new(api_key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            token: Some(token.into()),
        }
    }

    pub fn api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            token: None,
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self {
            api_key: None,
            token: Some(token.into()),
        }
    }
}

/// Single-statement request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlRequest {
    pub op: SqlOperation,
    pub query: String,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthInfo>,
}

impl SqlRequest {
    pub fn new(op: SqlOperation, query: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            op,
            query: query.into(),
            values,
            transaction_id: None,
            database: None,
            auth: None,
        }
    }
}

/// One step of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStep {
    pub op: SqlOperation,
    pub query: String,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

impl SqlStep {
    pub fn new(op: SqlOperation, query: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            op,
            query: query.into(),
            values,
        }
    }
}

/// Transaction request envelope
///
/// All steps run atomically on the server; the client sees one round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub steps: Vec<SqlStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthInfo>,
}

/// Response envelope for both statements and transactions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SqlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server-side execution time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl SqlResponse {
    /// A successful response carrying rows
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            success: true,
            data: Some(rows),
            ..Default::default()
        }
    }

    /// A failed response carrying only an error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Outer envelope returned by the HTTP endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse<SqlResponse> {
    /// Unwrap the inner response, synthesizing a failure if `data` is absent
    pub fn into_inner(self) -> SqlResponse {
        match self.data {
            Some(inner) => inner,
            None => SqlResponse {
                success: false,
                error: self.error,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_wire_names() {
        assert_eq!(serde_json::to_value(SqlOperation::Query).unwrap(), json!("query"));
        assert_eq!(serde_json::to_value(SqlOperation::Single).unwrap(), json!("single"));
        assert_eq!(
            serde_json::to_value(SqlOperation::Transaction).unwrap(),
            json!("transaction")
        );
        assert_eq!(SqlOperation::Delete.to_string(), "delete");
    }

    #[test]
    fn test_format_wire_names() {
        assert_eq!(serde_json::to_value(SerializationFormat::Json).unwrap(), json!("json"));
        assert_eq!(
            serde_json::to_value(SerializationFormat::MessagePack).unwrap(),
            json!("msgpack")
        );
        assert_eq!(SerializationFormat::default(), SerializationFormat::MessagePack);
        assert_eq!(SerializationFormat::Json.content_type(), "application/json");
        assert_eq!(
            SerializationFormat::MessagePack.content_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = SqlRequest::new(SqlOperation::Query, "SELECT 1", vec![]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"op": "query", "query": "SELECT 1", "values": []}));
    }

    #[test]
    fn test_response_defaults_on_missing_fields() {
        let response: SqlResponse = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(response.success);
        assert!(response.data.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_unwraps_data() {
        let outer: ApiResponse<SqlResponse> = serde_json::from_value(json!({
            "success": true,
            "data": {"success": true, "data": [{"id": 1}], "rows_affected": 0}
        }))
        .unwrap();

        let inner = outer.into_inner();
        assert!(inner.success);
        assert_eq!(inner.data, Some(vec![json!({"id": 1})]));
    }

    #[test]
    fn test_api_response_without_data_becomes_failure() {
        let outer: ApiResponse<SqlResponse> =
            serde_json::from_value(json!({"success": false, "error": "no such table"})).unwrap();

        let inner = outer.into_inner();
        assert!(!inner.success);
        assert!(inner.data.is_none());
        assert_eq!(inner.error.as_deref(), Some("no such table"));
    }
}

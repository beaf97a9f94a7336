//! Transport abstraction
//!
//! Both the HTTP and the WebSocket path take an encoded envelope to the
//! server and bring back a decoded `SqlResponse`, together with the byte
//! counts and serialization time the result assembler needs.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use wireql_core::{Result, SerializationFormat, SqlRequest, SqlResponse, TransactionRequest};

/// Envelope handed to a transport
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Outbound<'a> {
    Statement(&'a SqlRequest),
    Transaction(&'a TransactionRequest),
}

impl Outbound<'_> {
    pub fn is_transaction(&self) -> bool {
        matches!(self, Outbound::Transaction(_))
    }

    /// Operation label for logs and metrics
    pub fn operation(&self) -> &'static str {
        match self {
            Outbound::Statement(request) => request.op.as_str(),
            Outbound::Transaction(_) => "transaction",
        }
    }
}

/// Per-call delivery settings, already resolved against the client config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub format: SerializationFormat,
    pub timeout: Duration,
}

/// What came back from one round trip
#[derive(Debug, Clone)]
pub struct Delivery {
    pub response: SqlResponse,
    /// Encoded request size in bytes
    pub request_size: usize,
    /// Raw response size in bytes
    pub response_size: usize,
    /// Encode plus decode time
    pub serialization_time: Duration,
}

/// A way of getting an envelope to the server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs and metrics
    fn name(&self) -> &'static str;

    async fn send(&self, outbound: Outbound<'_>, options: &DeliveryOptions) -> Result<Delivery>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wireql_core::{SqlOperation, SqlStep};

    #[test]
    fn test_outbound_serializes_as_inner_envelope() {
        let request = SqlRequest::new(SqlOperation::Update, "UPDATE t SET a = ?", vec![json!(1)]);
        let value = serde_json::to_value(Outbound::Statement(&request)).unwrap();
        assert_eq!(value, serde_json::to_value(&request).unwrap());
        assert_eq!(Outbound::Statement(&request).operation(), "update");

        let txn = TransactionRequest {
            steps: vec![SqlStep::new(SqlOperation::Insert, "INSERT INTO t VALUES (1)", vec![])],
            transaction_id: None,
            database: None,
            auth: None,
        };
        let outbound = Outbound::Transaction(&txn);
        assert!(outbound.is_transaction());
        assert_eq!(serde_json::to_value(outbound).unwrap()["steps"][0]["op"], json!("insert"));
    }
}

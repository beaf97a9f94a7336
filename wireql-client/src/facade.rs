//! The `WireQL` facade
//!
//! A thin handle over [`WireQLClient`] for code that mostly runs plain
//! queries. `call` is the short form of `query`; everything else forwards to
//! the client unchanged. Use [`WireQL::client`] to reach anything the facade
//! does not expose.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wireql_client::{create_client, ClientConfig, QueryOptions};
//! use serde_json::json;
//!
//! # async fn example() -> wireql_core::Result<()> {
//! let db = create_client(ClientConfig::new("localhost"))?;
//! let result = db.call("SELECT * FROM users WHERE id = ?", vec![json!(1)], QueryOptions::default()).await?;
//! println!("{:?}", result.first());
//! # Ok(())
//! # }
//! ```

use crate::batch::{BatchItem, BatchOptions};
use crate::client::WireQLClient;
use crate::config::{ClientConfig, QueryOptions, TransactionOptions};
use crate::events::{ClientEvent, EventKind, ListenerId};
use crate::result::QueryResult;
use crate::stats::ConnectionStats;
use crate::stream::{RowStream, StreamOptions};
use serde_json::Value;
use wireql_core::{Result, SqlResponse, SqlStep};

/// Query-first handle over a [`WireQLClient`]
#[derive(Debug, Clone)]
pub struct WireQL {
    client: WireQLClient,
}

impl WireQL {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::from_client(WireQLClient::new(config)?))
    }

    pub fn from_client(client: WireQLClient) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &WireQLClient {
        &self.client
    }

    /// Run a query; same as [`WireQL::query`]
    pub async fn call(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.client.query(sql, values, options).await
    }

    pub async fn query(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.client.query(sql, values, options).await
    }

    pub async fn single(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.client.single(sql, values, options).await
    }

    pub async fn insert(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.client.insert(sql, values, options).await
    }

    pub async fn update(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.client.update(sql, values, options).await
    }

    pub async fn delete(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> Result<QueryResult> {
        self.client.delete(sql, values, options).await
    }

    pub async fn transaction(&self, steps: Vec<SqlStep>, options: TransactionOptions) -> Result<QueryResult> {
        self.client.transaction(steps, options).await
    }

    pub async fn batch(&self, items: Vec<BatchItem>, options: BatchOptions) -> Result<Vec<QueryResult>> {
        self.client.batch(items, options).await
    }

    pub async fn stream(&self, sql: &str, values: Vec<Value>, options: StreamOptions) -> Result<RowStream> {
        self.client.stream(sql, values, options).await
    }

    pub async fn raw(&self, sql: &str, values: Vec<Value>, options: QueryOptions) -> SqlResponse {
        self.client.raw(sql, values, options).await
    }

    pub async fn connect(&self) -> Result<()> {
        self.client.connect().await
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await
    }

    pub async fn ping(&self) -> bool {
        self.client.ping().await
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.client.stats()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.client.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.client.once(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.client.off(id)
    }

    pub fn emit(&self, event: &ClientEvent) {
        self.client.emit(event)
    }
}

impl From<WireQLClient> for WireQL {
    fn from(client: WireQLClient) -> Self {
        Self::from_client(client)
    }
}

/// Build a [`WireQL`] from `config`
///
/// Fails only when the configuration is invalid; no connection is made.
pub fn create_client(config: ClientConfig) -> Result<WireQL> {
    WireQL::new(config)
}

/// Alias of [`create_client`]
pub fn create_wireql(config: ClientConfig) -> Result<WireQL> {
    create_client(config)
}

/// Alias of [`create_client`]
pub fn create_callable_wireql(config: ClientConfig) -> Result<WireQL> {
    create_client(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wireql_core::Error;

    #[test]
    fn test_constructors_share_validation() {
        assert!(create_client(ClientConfig::new("localhost")).is_ok());
        assert!(create_wireql(ClientConfig::new("localhost")).is_ok());
        assert!(matches!(
            create_callable_wireql(ClientConfig::new("")),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_events_reach_underlying_client() {
        let db = create_client(ClientConfig::new("localhost")).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let id = db.on(EventKind::Error, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        db.client().emit(&ClientEvent::Error { message: "boom".into() });
        db.emit(&ClientEvent::Error { message: "again".into() });
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(db.off(id));
        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_call_uses_query_path() {
        let db = create_client(ClientConfig::new("localhost")).unwrap();
        let err = db
            .call("SELECT 1", vec![], QueryOptions::new().use_websocket(true))
            .await
            .unwrap_err();
        assert_eq!(err, Error::NotConnected);
        assert_eq!(db.stats().last_error.as_deref(), Some("WebSocket not connected"));
    }
}

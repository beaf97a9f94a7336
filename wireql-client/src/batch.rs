//! Batch execution
//!
//! A batch is a list of independent queries run either concurrently or one
//! after another. Results come back in input order, one per item.
//!
//! Failure policy:
//!
//! - `stop_on_error: true`: the first failure aborts the batch and is
//!   returned as the error
//! - `stop_on_error: false`: a failed item becomes a placeholder result with
//!   no data, zero metrics and `raw = {success: false, error}`
//!
//! # Examples
//!
//! ```rust,no_run
//! use wireql_client::{BatchItem, BatchOptions, WireQLClient};
//! use serde_json::json;
//!
//! # async fn example(client: &WireQLClient) -> wireql_core::Result<()> {
//! let items = vec![
//!     BatchItem::new("SELECT * FROM users WHERE id = ?", vec![json!(1)]),
//!     BatchItem::new("SELECT * FROM orders WHERE user_id = ?", vec![json!(1)]),
//! ];
//!
//! let results = client.batch(items, BatchOptions::default().parallel(true)).await?;
//! for result in &results {
//!     println!("success={} rows={}", result.is_success(), result.rows().len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::WireQLClient;
use crate::config::QueryOptions;
use crate::result::QueryResult;
use futures::future::{join_all, try_join_all};
use serde_json::Value;
use wireql_core::Result;

/// One query of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub sql: String,
    pub values: Vec<Value>,
    /// Overrides the batch defaults field by field
    pub options: QueryOptions,
}

impl BatchItem {
    pub fn new(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            values,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// How a batch runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    pub parallel: bool,
    pub stop_on_error: bool,
    /// Options applied to every item that does not set its own
    pub defaults: QueryOptions,
}

impl BatchOptions {
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn defaults(mut self, defaults: QueryOptions) -> Self {
        self.defaults = defaults;
        self
    }
}

impl WireQLClient {
    /// Run `items` as queries; see the module docs for the failure policy
    #[tracing::instrument(level = "debug", skip(self, items, options), fields(batch_size = items.len(), parallel = options.parallel))]
    pub async fn batch(&self, items: Vec<BatchItem>, options: BatchOptions) -> Result<Vec<QueryResult>> {
        if let Some(m) = self.metrics() {
            m.record_batch(items.len() as u64);
        }

        let calls = items.into_iter().map(|item| {
            let query_options = item.options.or(&options.defaults);
            (item.sql, item.values, query_options)
        });

        if options.parallel {
            let futures = calls.map(|(sql, values, query_options)| async move {
                self.query(&sql, values, query_options).await
            });

            if options.stop_on_error {
                try_join_all(futures).await
            } else {
                Ok(join_all(futures)
                    .await
                    .into_iter()
                    .map(|outcome| outcome.unwrap_or_else(|e| QueryResult::failed(e.to_string())))
                    .collect())
            }
        } else {
            let mut results = Vec::new();
            for (sql, values, query_options) in calls {
                match self.query(&sql, values, query_options).await {
                    Ok(result) => results.push(result),
                    Err(e) if options.stop_on_error => {
                        tracing::debug!(index = results.len(), error = %e, "Batch stopped on error");
                        return Err(e);
                    }
                    Err(e) => results.push(QueryResult::failed(e.to_string())),
                }
            }
            Ok(results)
        }
    }
}

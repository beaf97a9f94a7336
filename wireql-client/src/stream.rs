//! Row streaming
//!
//! `stream` runs one ordinary query and hands back a [`RowStream`] over the
//! rows it returned. The whole result is materialized before the first row
//! is produced; the server has no incremental delivery. The callbacks in
//! [`StreamOptions`] fire as each row is yielded, so progress reporting
//! works the same way it would with a real stream.
//!
//! `RowStream` is both an [`Iterator`] and a [`futures::Stream`]. It is
//! finite and cannot be restarted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use wireql_client::{StreamOptions, WireQLClient};
//!
//! # async fn example(client: &WireQLClient) -> wireql_core::Result<()> {
//! let options = StreamOptions::default()
//!     .on_progress(|done, total| println!("{}/{}", done, total));
//!
//! let mut rows = client.stream("SELECT * FROM events", vec![], options).await?;
//! while let Some(row) = StreamExt::next(&mut rows).await {
//!     println!("{}", row);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::WireQLClient;
use crate::config::QueryOptions;
use futures::Stream;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use wireql_core::{Result, Row};

type RowCallback = Box<dyn FnMut(&Row) + Send>;
type ProgressCallback = Box<dyn FnMut(usize, usize) + Send>;

/// Options for `stream`
#[derive(Default)]
pub struct StreamOptions {
    pub query: QueryOptions,
    /// Accepted for forward compatibility; rows are already buffered
    pub buffer_size: Option<usize>,
    on_row: Option<RowCallback>,
    on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("query", &self.query)
            .field("buffer_size", &self.buffer_size)
            .field("on_row", &self.on_row.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl StreamOptions {
    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.query = options;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Called with each row before it is yielded
    pub fn on_row(mut self, f: impl FnMut(&Row) + Send + 'static) -> Self {
        self.on_row = Some(Box::new(f));
        self
    }

    /// Called with `(rows yielded so far, total rows)` after each row
    pub fn on_progress(mut self, f: impl FnMut(usize, usize) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }
}

/// Finite sequence over the rows of one query
pub struct RowStream {
    rows: std::vec::IntoIter<Row>,
    total: usize,
    produced: usize,
    on_row: Option<RowCallback>,
    on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for RowStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("total", &self.total)
            .field("produced", &self.produced)
            .field("on_row", &self.on_row.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl RowStream {
    fn new(rows: Vec<Row>, options: StreamOptions) -> Self {
        Self {
            total: rows.len(),
            rows: rows.into_iter(),
            produced: 0,
            on_row: options.on_row,
            on_progress: options.on_progress,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.total - self.produced
    }
}

impl Iterator for RowStream {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let row = self.rows.next()?;
        self.produced += 1;

        if let Some(on_row) = self.on_row.as_mut() {
            on_row(&row);
        }
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(self.produced, self.total);
        }
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl Stream for RowStream {
    type Item = Value;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Value>> {
        Poll::Ready(self.get_mut().next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        Iterator::size_hint(self)
    }
}

impl WireQLClient {
    /// Run a query and iterate its rows with per-row callbacks
    #[tracing::instrument(level = "debug", skip(self, values, options), fields(sql = %sql))]
    pub async fn stream(&self, sql: &str, values: Vec<Value>, options: StreamOptions) -> Result<RowStream> {
        let result = self.query(sql, values, options.query.clone()).await?;
        Ok(RowStream::new(result.data.unwrap_or_default(), options))
    }
}

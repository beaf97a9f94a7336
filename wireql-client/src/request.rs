//! Envelope construction and WebSocket request tracking
//!
//! [`RequestBuilder`] maps a call onto a wire envelope. It is a pure
//! function of the client configuration and the per-call options:
//!
//! - **database**: per-call value, else the configured default, omitted when
//!   both are empty
//! - **auth**: per-call value, else the configured credentials
//! - **values**: passed through untouched
//!
//! [`RequestManager`] correlates WebSocket replies with their callers. Each
//! call registers a oneshot channel under its correlation id; the reader
//! task completes it when a frame carrying that id arrives. Replies may
//! arrive in any order. Deadlines are enforced by the caller racing the
//! receiver against `tokio::time::timeout`. Registration hands back a
//! [`PendingGuard`]; the entry lives until the guard is dropped, so a call
//! that times out, fails or is cancelled mid-wait leaves nothing behind.

use crate::config::{ClientConfig, QueryOptions, TransactionOptions};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use wireql_core::{
    AuthInfo, Result, SqlOperation, SqlRequest, SqlResponse, SqlStep, TransactionRequest,
};

/// Builds request envelopes from call arguments
pub struct RequestBuilder<'a> {
    config: &'a ClientConfig,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a ClientConfig) -> Self {
        Self { config }
    }

    pub fn statement(
        &self,
        op: SqlOperation,
        sql: impl Into<String>,
        values: Vec<Value>,
        options: &QueryOptions,
    ) -> SqlRequest {
        SqlRequest {
            op,
            query: sql.into(),
            values,
            transaction_id: None,
            database: self.database(options),
            auth: self.auth(options),
        }
    }

    pub fn transaction(&self, steps: Vec<SqlStep>, options: &TransactionOptions) -> TransactionRequest {
        TransactionRequest {
            steps,
            transaction_id: options.transaction_id.clone(),
            database: self.database(&options.query),
            auth: self.auth(&options.query),
        }
    }

    fn database(&self, options: &QueryOptions) -> Option<String> {
        options
            .database
            .as_deref()
            .filter(|db| !db.is_empty())
            .or_else(|| Some(self.config.default_database.as_str()).filter(|db| !db.is_empty()))
            .map(str::to_string)
    }

    fn auth(&self, options: &QueryOptions) -> Option<AuthInfo> {
        options.auth.clone().or_else(|| self.config.default_auth())
    }
}

/// Correlation id namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Statement,
    Transaction,
}

impl CallKind {
    fn prefix(&self) -> &'static str {
        match self {
            CallKind::Statement => "req",
            CallKind::Transaction => "txn",
        }
    }
}

/// A correlated reply handed to the waiting caller
#[derive(Debug, Clone)]
pub struct Reply {
    pub response: SqlResponse,
    /// Size of the raw frame in bytes
    pub frame_size: usize,
    /// Time spent decoding the frame
    pub decode_time: Duration,
}

type PendingMap = HashMap<String, oneshot::Sender<Result<Reply>>>;

/// Tracks in-flight WebSocket calls
#[derive(Clone, Default)]
pub struct RequestManager {
    pending: Arc<Mutex<PendingMap>>,
    counter: Arc<AtomicU64>,
}

impl RequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate a correlation id: `req_<n>_<unix-millis>` or `txn_<n>_<unix-millis>`
    pub fn next_id(&self, kind: CallKind) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("{}_{}_{}", kind.prefix(), n, millis)
    }

    /// Start waiting on `id`; the entry is removed when the guard drops
    pub fn register(
        &self,
        id: impl Into<String>,
    ) -> (PendingGuard, oneshot::Receiver<Result<Reply>>) {
        let id = id.into();
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id.clone(), tx);
        let guard = PendingGuard {
            id,
            manager: self.clone(),
        };
        (guard, rx)
    }

    /// Hand `reply` to the caller waiting on `id`
    ///
    /// Returns `false` when nobody is waiting, e.g. the call already timed out.
    pub fn complete(&self, id: &str, reply: Result<Reply>) -> bool {
        let waiter = self.pending().remove(id);
        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Forget a call; returns `false` when it was already gone
    pub fn cancel(&self, id: &str) -> bool {
        self.pending().remove(id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }
}

/// Keeps a call registered for as long as it is alive
pub struct PendingGuard {
    id: String,
    manager: RequestManager,
}

impl PendingGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.manager.cancel(&self.id);
    }
}

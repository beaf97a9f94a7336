//! Client configuration and per-call options
//!
//! `ClientConfig` is assembled with a fluent builder and frozen once the
//! client is built. Everything that may vary per call lives in
//! [`QueryOptions`] and its relatives, which override the config field by
//! field.
//!
//! # Examples
//!
//! ```rust
//! use wireql_client::{ClientConfig, WebSocketOptions};
//! use wireql_core::SerializationFormat;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("db.internal")
//!     .with_port(9000)
//!     .with_api_key("secret")
//!     .with_default_database("analytics")
//!     .with_serialization_format(SerializationFormat::Json)
//!     .with_timeout(Duration::from_secs(5))
//!     .with_websocket(WebSocketOptions::default().with_max_reconnect_attempts(3));
//!
//! assert_eq!(config.http_base_url(), "http://db.internal:9000");
//! assert_eq!(config.websocket_url(), "ws://db.internal:9000/ws");
//! ```

use std::collections::BTreeMap;
use std::time::Duration;
use wireql_core::{AuthInfo, Error, Result, SerializationFormat};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket keep-alive and reconnection settings
#[derive(Debug, Clone, PartialEq)]
pub struct WebSocketOptions {
    /// Reconnect automatically after an abnormal close
    pub auto_reconnect: bool,
    /// Upper bound for the backoff delay
    pub max_reconnect_delay: Duration,
    /// Attempts before reconnection stops until the next manual `connect`
    pub max_reconnect_attempts: u32,
    /// Interval between keep-alive pings
    pub ping_interval: Duration,
    /// How long a ping may go unanswered before the socket is considered lost
    pub ping_timeout: Duration,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_reconnect_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
        }
    }
}

impl WebSocketOptions {
    pub fn with_auto_reconnect(mut self, enable: bool) -> Self {
        self.auto_reconnect = enable;
        self
    }

    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }
}

/// Immutable client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Use `https`/`wss` instead of `http`/`ws`
    pub secure: bool,
    pub api_key: String,
    pub token: String,
    /// Database used when a call does not name one; empty means none
    pub default_database: String,
    pub serialization_format: SerializationFormat,
    /// Deadline for HTTP calls, WebSocket calls and the WebSocket handshake
    pub timeout: Duration,
    pub websocket: WebSocketOptions,
    /// Extra HTTP headers, sent before `Content-Type` and `User-Agent`
    pub headers: BTreeMap<String, String>,
    /// Emit per-request debug traces
    pub debug: bool,
    /// Record OpenTelemetry instruments through the global meter provider
    pub metrics: bool,
}

impl ClientConfig {
    /// Create a configuration for `host` with every other field defaulted
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            secure: false,
            api_key: String::new(),
            token: String::new(),
            default_database: String::new(),
            serialization_format: SerializationFormat::default(),
            timeout: DEFAULT_TIMEOUT,
            websocket: WebSocketOptions::default(),
            headers: BTreeMap::new(),
            debug: false,
            metrics: false,
        }
    }

    /// Build a configuration from `WIREQL_*` environment variables
    ///
    /// `WIREQL_HOST` is required. `WIREQL_PORT`, `WIREQL_SECURE`,
    /// `WIREQL_API_KEY`, `WIREQL_TOKEN` and `WIREQL_DATABASE` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("WIREQL_HOST")
            .ok_or_else(|| Error::InvalidConfig("WIREQL_HOST is not set".to_string()))?;
        let mut config = Self::new(host);

        if let Some(port) = lookup("WIREQL_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("invalid WIREQL_PORT: {}", port)))?;
        }
        if let Some(secure) = lookup("WIREQL_SECURE") {
            config.secure = matches!(secure.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(api_key) = lookup("WIREQL_API_KEY") {
            config.api_key = api_key;
        }
        if let Some(token) = lookup("WIREQL_TOKEN") {
            config.token = token;
        }
        if let Some(database) = lookup("WIREQL_DATABASE") {
            config.default_database = database;
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_default_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    pub fn with_serialization_format(mut self, format: SerializationFormat) -> Self {
        self.serialization_format = format;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_websocket(mut self, options: WebSocketOptions) -> Self {
        self.websocket = options;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.metrics = enable;
        self
    }

    /// Reject configurations the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must not be 0".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.websocket.ping_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "ping interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/ws", scheme, self.host, self.port)
    }

    /// Auth block attached when a call does not bring its own
    ///
    /// Present only when an API key or token is configured; both fields are
    /// then sent, empty when unset.
    pub fn default_auth(&self) -> Option<AuthInfo> {
        if self.api_key.is_empty() && self.token.is_empty() {
            None
        } else {
            Some(AuthInfo::new(self.api_key.clone(), self.token.clone()))
        }
    }
}

/// Per-call overrides
///
/// `use_websocket`: `Some(false)` forces HTTP, `Some(true)` requires an open
/// socket, `None` uses the socket when it is open and HTTP otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub database: Option<String>,
    pub auth: Option<AuthInfo>,
    pub timeout: Option<Duration>,
    pub format: Option<SerializationFormat>,
    pub use_websocket: Option<bool>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn auth(mut self, auth: AuthInfo) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn format(mut self, format: SerializationFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn use_websocket(mut self, use_websocket: bool) -> Self {
        self.use_websocket = Some(use_websocket);
        self
    }

    /// Fill every unset field from `defaults`
    pub fn or(self, defaults: &QueryOptions) -> QueryOptions {
        QueryOptions {
            database: self.database.or_else(|| defaults.database.clone()),
            auth: self.auth.or_else(|| defaults.auth.clone()),
            timeout: self.timeout.or(defaults.timeout),
            format: self.format.or(defaults.format),
            use_websocket: self.use_websocket.or(defaults.use_websocket),
        }
    }
}

/// Options for `transaction`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionOptions {
    pub transaction_id: Option<String>,
    pub query: QueryOptions,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.query = options;
        self
    }
}

impl From<QueryOptions> for TransactionOptions {
    fn from(query: QueryOptions) -> Self {
        Self {
            transaction_id: None,
            query,
        }
    }
}

//! Persistent WebSocket transport
//!
//! One socket per client, opened explicitly with [`WebSocketTransport::connect`].
//! Calls are multiplexed over it: each outbound envelope carries a
//! `requestId`, and the reader task hands every reply to the caller waiting
//! on that id through the [`RequestManager`]. Replies may arrive in any
//! order; every call has its own deadline.
//!
//! # Frames
//!
//! Outbound envelopes go out as text frames (JSON) or binary frames
//! (MessagePack). Inbound frames are sniffed by their first byte, so the
//! server may answer in either format. A frame that fails to decode is
//! reported as an `Error` event and otherwise dropped.
//!
//! # Keep-alive
//!
//! A ping is sent every `ping_interval`. When no pong follows within
//! `ping_timeout` the socket is treated as lost with close code 1006.
//!
//! # Reconnection
//!
//! An abnormal close (any code but 1000) that the caller did not initiate
//! starts a single reconnect task that retries with [`ExponentialBackoff`]
//! until it succeeds or the attempt budget is spent. Each socket gets a
//! generation number so that a reader left over from an older socket never
//! touches the state of a newer one.
//!
//! [`ExponentialBackoff`]: crate::ExponentialBackoff

use crate::config::{ClientConfig, WebSocketOptions};
use crate::connection_state::{ConnectionManager, ConnectionState};
use crate::events::{ClientEvent, EventBus};
use crate::metrics::ClientMetrics;
use crate::reconnect::ExponentialBackoff;
use crate::request::{CallKind, Reply, RequestManager};
use crate::stats::StatsTracker;
use crate::transport::{Delivery, DeliveryOptions, Outbound, Transport};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use wireql_core::{codec, Error, Result, SerializationFormat};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Close code of a caller-initiated close
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code used when the socket vanished without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when the peer closed without a status
const NO_STATUS_RECEIVED: u16 = 1005;

/// WebSocket transport with correlation, keep-alive and reconnection
///
/// Cheap to clone; clones share the socket.
#[derive(Clone)]
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    options: WebSocketOptions,
    connect_timeout: Duration,
    debug: bool,
    sender: tokio::sync::Mutex<Option<WsSink>>,
    connected: AtomicBool,
    generation: AtomicU64,
    manual_close: AtomicBool,
    connect_lock: tokio::sync::Mutex<()>,
    connection: ConnectionManager,
    requests: RequestManager,
    events: EventBus,
    stats: Arc<StatsTracker>,
    metrics: Option<Arc<ClientMetrics>>,
    last_pong: Mutex<Instant>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    ping_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn replace_task(slot: &Mutex<Option<JoinHandle<()>>>, task: Option<JoinHandle<()>>) {
    let previous = std::mem::replace(&mut *lock(slot), task);
    if let Some(previous) = previous {
        previous.abort();
    }
}

impl WebSocketTransport {
    pub fn new(
        config: &ClientConfig,
        events: EventBus,
        stats: Arc<StatsTracker>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: config.websocket_url(),
                options: config.websocket.clone(),
                connect_timeout: config.timeout,
                debug: config.debug,
                sender: tokio::sync::Mutex::new(None),
                connected: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                manual_close: AtomicBool::new(false),
                connect_lock: tokio::sync::Mutex::new(()),
                connection: ConnectionManager::new(ExponentialBackoff::from(&config.websocket)),
                requests: RequestManager::new(),
                events,
                stats,
                metrics,
                last_pong: Mutex::new(Instant::now()),
                reader_task: Mutex::new(None),
                ping_task: Mutex::new(None),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state().await
    }

    /// Calls currently waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.inner.requests.pending_count()
    }

    /// Open the socket; a no-op when it is already open
    ///
    /// Fails with `Error::Timeout` when the handshake does not finish within
    /// the client timeout.
    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn connect(&self) -> Result<()> {
        self.inner.manual_close.store(false, Ordering::SeqCst);
        replace_task(&self.inner.reconnect_task, None);
        self.inner.connection.reset().await;
        self.inner.open().await
    }

    /// Close the socket with code 1000; never triggers a reconnect
    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.manual_close.store(true, Ordering::SeqCst);
        replace_task(&inner.reconnect_task, None);
        replace_task(&inner.ping_task, None);

        let sink = inner.sender.lock().await.take();
        if let Some(mut sink) = sink {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "Client disconnect".into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                tracing::debug!(error = %e, "Close frame not delivered");
            }
            tracing::info!("Disconnect requested");
        }

        inner.connected.store(false, Ordering::SeqCst);
        inner.stats.set_websocket_connected(false);
        inner.connection.disconnected().await;
    }
}

impl Inner {
    async fn open(self: &Arc<Self>) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        if self.connected.load(Ordering::SeqCst) {
            tracing::debug!("Already connected");
            return Ok(());
        }

        self.connection.connecting().await;
        tracing::info!(url = %self.url, "Connecting to server");

        let stream = match tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => return Err(self.connect_failed(Error::WebSocket(e.to_string())).await),
            Err(_) => {
                return Err(self
                    .connect_failed(Error::Timeout("WebSocket connection timeout".to_string()))
                    .await)
            }
        };

        let (sink, source) = stream.split();
        *self.sender.lock().await = Some(sink);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.connection.connected().await;
        *lock(&self.last_pong) = Instant::now();
        self.connected.store(true, Ordering::SeqCst);
        self.stats.set_websocket_connected(true);
        self.start_ping(generation);

        let reader = tokio::spawn(Arc::clone(self).read_loop(source, generation));
        replace_task(&self.reader_task, Some(reader));

        tracing::info!(generation, "Connected successfully");
        self.events.emit(&ClientEvent::Connect);
        Ok(())
    }

    async fn connect_failed(&self, error: Error) -> Error {
        tracing::warn!(url = %self.url, error = %error, "WebSocket connection failed");
        self.connection.disconnected().await;
        self.stats.record_error(error.to_string());
        if let Some(ref m) = self.metrics {
            m.record_error(error.kind());
        }
        self.events.emit(&ClientEvent::Error {
            message: error.to_string(),
        });
        error
    }

    async fn send_message(&self, message: Message) -> Result<()> {
        let mut sender = self.sender.lock().await;
        let sink = sender.as_mut().ok_or(Error::NotConnected)?;
        sink.send(message)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn read_loop(self: Arc<Self>, mut source: WsSource, generation: u64) {
        let mut close_code = ABNORMAL_CLOSURE;
        let mut close_reason = String::new();

        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => self.handle_frame(text.as_bytes()).await,
                Ok(Message::Binary(bytes)) => self.handle_frame(&bytes).await,
                Ok(Message::Ping(_)) => self.events.emit(&ClientEvent::Ping),
                Ok(Message::Pong(_)) => {
                    *lock(&self.last_pong) = Instant::now();
                    self.events.emit(&ClientEvent::Pong);
                }
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) => {
                            close_code = u16::from(frame.code);
                            close_reason = frame.reason.into_owned();
                        }
                        None => close_code = NO_STATUS_RECEIVED,
                    }
                    break;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket error");
                    if let Some(ref m) = self.metrics {
                        m.record_error("websocket");
                    }
                    self.events.emit(&ClientEvent::Error {
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        self.handle_close(generation, close_code, close_reason).await;
    }

    async fn handle_frame(&self, bytes: &[u8]) {
        let started = Instant::now();
        let frame = match codec::decode_frame(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, bytes = bytes.len(), "Dropping undecodable frame");
                self.events.emit(&ClientEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };
        let decode_time = started.elapsed();

        self.events.emit(&ClientEvent::Message(frame.clone()));

        let Some(id) = codec::request_id(&frame).map(str::to_owned) else {
            return;
        };

        let reply = codec::reply_payload(frame).map(|response| Reply {
            response,
            frame_size: bytes.len(),
            decode_time,
        });
        if !self.requests.complete(&id, reply) && self.debug {
            tracing::debug!(request_id = %id, "Reply for unknown or expired request");
        }
    }

    async fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        let _guard = self.connect_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Ignoring close of a replaced socket");
            return;
        }

        self.connected.store(false, Ordering::SeqCst);
        self.stats.set_websocket_connected(false);
        replace_task(&self.ping_task, None);
        *self.sender.lock().await = None;
        self.connection.disconnected().await;

        let reason = if reason.is_empty() {
            format!("Code: {}", code)
        } else {
            reason
        };
        tracing::info!(code, reason = %reason, "Connection closed");
        self.events.emit(&ClientEvent::Disconnect { reason, code });

        let manual = self.manual_close.load(Ordering::SeqCst);
        if self.options.auto_reconnect && code != NORMAL_CLOSURE && !manual {
            self.schedule_reconnect();
        }
    }

    /// Drop the socket without a close handshake
    async fn connection_lost(self: Arc<Self>, generation: u64, reason: &'static str) {
        if self.generation.load(Ordering::SeqCst) == generation {
            replace_task(&self.reader_task, None);
        }
        self.handle_close(generation, ABNORMAL_CLOSURE, reason.to_string())
            .await;
    }

    fn start_ping(self: &Arc<Self>, generation: u64) {
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move { inner.ping_loop(generation).await });
        replace_task(&self.ping_task, Some(task));
    }

    async fn ping_loop(self: Arc<Self>, generation: u64) {
        let mut ticker = tokio::time::interval(self.options.ping_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.generation.load(Ordering::SeqCst) != generation
                || !self.connected.load(Ordering::SeqCst)
            {
                return;
            }

            let sent_at = Instant::now();
            if let Err(e) = self.send_message(Message::Ping(Vec::new())).await {
                tracing::debug!(error = %e, "Ping not sent");
                return;
            }

            tokio::time::sleep(self.options.ping_timeout).await;
            let last_pong = *lock(&self.last_pong);
            if last_pong < sent_at {
                tracing::warn!(timeout_ms = self.options.ping_timeout.as_millis() as u64, "Ping timeout");
                let inner = Arc::clone(&self);
                tokio::spawn(async move { inner.connection_lost(generation, "Ping timeout").await });
                return;
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move { inner.reconnect_loop().await });
        replace_task(&self.reconnect_task, Some(task));
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            let Some((attempt, delay)) = self.connection.next_reconnect_delay().await else {
                tracing::error!(
                    attempts = self.options.max_reconnect_attempts,
                    "Reconnection abandoned (max attempts reached)"
                );
                return;
            };

            self.stats.record_reconnection();
            if let Some(ref m) = self.metrics {
                m.record_reconnection_attempt();
            }
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
            self.events.emit(&ClientEvent::Reconnecting { attempt });

            tokio::time::sleep(delay).await;
            if self.manual_close.load(Ordering::SeqCst) {
                return;
            }

            match self.open().await {
                Ok(()) => {
                    tracing::info!(attempt, "Reconnected successfully");
                    if let Some(ref m) = self.metrics {
                        m.record_reconnection_success();
                    }
                    self.events.emit(&ClientEvent::Reconnected);
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnection failed");
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn send(&self, outbound: Outbound<'_>, options: &DeliveryOptions) -> Result<Delivery> {
        let inner = &self.inner;
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let kind = if outbound.is_transaction() {
            CallKind::Transaction
        } else {
            CallKind::Statement
        };
        let id = inner.requests.next_id(kind);

        let started = Instant::now();
        let tagged = codec::with_request_id(&outbound, &id)?;
        let payload = codec::encode(&tagged, options.format)?;
        let encode_time = started.elapsed();
        let request_size = payload.len();

        let message = match options.format {
            SerializationFormat::Json => Message::Text(
                String::from_utf8(payload).map_err(|e| Error::Serialization(e.to_string()))?,
            ),
            SerializationFormat::MessagePack => Message::Binary(payload),
        };

        // Dropping the guard forgets the call on every exit path, including
        // a caller abandoning this future mid-wait
        let (pending, rx) = inner.requests.register(id);
        inner.send_message(message).await?;

        if inner.debug {
            tracing::debug!(request_id = %pending.id(), bytes = request_size, format = %options.format, "WebSocket request sent");
        }

        match tokio::time::timeout(options.timeout, rx).await {
            Ok(Ok(Ok(reply))) => Ok(Delivery {
                response: reply.response,
                request_size,
                response_size: reply.frame_size,
                serialization_time: encode_time + reply.decode_time,
            }),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::Timeout("WebSocket request timeout".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(config: &ClientConfig) -> WebSocketTransport {
        WebSocketTransport::new(config, EventBus::new(), Arc::new(StatsTracker::new()), None)
    }

    #[test]
    fn test_url_from_config() {
        let transport = transport(&ClientConfig::new("db").with_port(7000).with_secure(true));
        assert_eq!(transport.url(), "wss://db:7000/ws");
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = transport(&ClientConfig::new("localhost"));
        let request = wireql_core::SqlRequest::new(wireql_core::SqlOperation::Query, "SELECT 1", vec![]);
        let options = DeliveryOptions {
            format: SerializationFormat::Json,
            timeout: Duration::from_secs(1),
        };

        let result = transport.send(Outbound::Statement(&request), &options).await;
        assert_eq!(result.unwrap_err(), Error::NotConnected);
        assert_eq!(transport.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_connect_refused_reports_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let events = EventBus::new();
        let errors = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&errors);
        events.on(crate::events::EventKind::Error, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let stats = Arc::new(StatsTracker::new());
        let config = ClientConfig::new("127.0.0.1").with_port(port);
        let transport = WebSocketTransport::new(&config, events, Arc::clone(&stats), None);

        let result = transport.connect().await;
        assert!(matches!(result, Err(Error::WebSocket(_))));
        assert!(!transport.is_connected());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(stats.snapshot().last_error.is_some());
        assert_eq!(transport.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_when_never_connected() {
        let transport = transport(&ClientConfig::new("localhost"));
        transport.disconnect().await;
        assert!(!transport.is_connected());
    }
}

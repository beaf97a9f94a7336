//! Common test utilities for wireql-client integration tests
//!
//! Two lightweight mock servers stand in for a WireQL server:
//!
//! - `MockWsServer` speaks the `/ws` protocol: it decodes JSON text frames and
//!   MessagePack binary frames, hands each one to a scripted handler and
//!   answers in the format the frame arrived in
//! - `MockHttpServer` records every POST and answers with a scripted
//!   `MockReply`

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use warp::http::HeaderMap;
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::Filter;
use wireql_client::{ClientConfig, SerializationFormat};

const WAIT: Duration = Duration::from_secs(5);

/// Config pointing at a local mock on `port`, JSON unless overridden
pub fn local_config(port: u16) -> ClientConfig {
    ClientConfig::new("127.0.0.1")
        .with_port(port)
        .with_serialization_format(SerializationFormat::Json)
}

/// A port nothing is listening on
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Correlated WebSocket reply for `frame`
pub fn reply_to(frame: &Value, response: Value) -> Value {
    json!({
        "requestId": frame["requestId"].clone(),
        "response": response,
    })
}

/// Successful `SqlResponse` carrying `rows`
pub fn rows_response(rows: Value) -> Value {
    json!({"success": true, "data": rows})
}

/// Failed `SqlResponse`
pub fn error_response(message: &str) -> Value {
    json!({"success": false, "error": message})
}

/// A frame received by `MockWsServer`
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub binary: bool,
    pub value: Value,
}

/// Mock WebSocket server
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    kick_tx: broadcast::Sender<u16>,
    frames_rx: mpsc::UnboundedReceiver<ReceivedFrame>,
    accepted: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Server that answers every call with one row echoing the SQL text
    pub async fn echo() -> Self {
        Self::start(|frame| async move {
            let rows = json!([{"query": frame["query"].clone()}]);
            Some(reply_to(&frame, rows_response(rows)))
        })
        .await
    }

    /// Server that never answers
    pub async fn silent() -> Self {
        Self::start(|_| async { None }).await
    }

    /// Server that completes the handshake and then never reads again,
    /// so pings go unanswered
    pub async fn deaf() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (kick_tx, _) = broadcast::channel::<u16>(8);
        let (_frames_tx, frames_rx) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));

        let server_kick = kick_tx.clone();
        let server_accepted = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept_result = listener.accept() => {
                        if let Ok((stream, _)) = accept_result {
                            let mut kick_rx = server_kick.subscribe();
                            let accepted = Arc::clone(&server_accepted);
                            tokio::spawn(async move {
                                let Ok(ws_stream) = accept_async(stream).await else {
                                    return;
                                };
                                accepted.fetch_add(1, Ordering::SeqCst);
                                let _ = kick_rx.recv().await;
                                drop(ws_stream);
                            });
                        }
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            kick_tx,
            frames_rx,
            accepted,
        }
    }

    /// Start a server with a custom handler
    ///
    /// Each frame is handled on its own task, so a slow reply does not hold
    /// back later ones.
    pub async fn start<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handler = Arc::new(handler);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (kick_tx, _) = broadcast::channel::<u16>(8);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));

        let server_kick = kick_tx.clone();
        let server_accepted = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accept_result = listener.accept() => {
                        if let Ok((stream, _)) = accept_result {
                            tokio::spawn(serve_connection(
                                stream,
                                Arc::clone(&handler),
                                frames_tx.clone(),
                                server_kick.subscribe(),
                                Arc::clone(&server_accepted),
                            ));
                        }
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            kick_tx,
            frames_rx,
            accepted,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn config(&self) -> ClientConfig {
        local_config(self.port())
    }

    /// Number of WebSocket handshakes completed so far
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Next frame the server received, or `None` after five seconds
    pub async fn next_frame(&mut self) -> Option<ReceivedFrame> {
        tokio::time::timeout(WAIT, self.frames_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Close every open connection with `code`; the listener stays up
    pub fn drop_connections(&self, code: u16) {
        let _ = self.kick_tx.send(code);
    }

    /// Stop listening and close every open connection
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.drop_connections(1001);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn serve_connection<F, Fut>(
    stream: TcpStream,
    handler: Arc<F>,
    frames_tx: mpsc::UnboundedSender<ReceivedFrame>,
    mut kick_rx: broadcast::Receiver<u16>,
    accepted: Arc<AtomicUsize>,
) where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Value>> + Send + 'static,
{
    // Plain HTTP requests land here too and fail the handshake
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    accepted.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if write.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            code = kick_rx.recv() => {
                let code = code.unwrap_or(1001);
                let _ = out_tx.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::from(code),
                    reason: "Server going away".into(),
                })));
                break;
            }
            message = read.next() => {
                let (bytes, binary) = match message {
                    Some(Ok(Message::Text(text))) => (text.into_bytes(), false),
                    Some(Ok(Message::Binary(bytes))) => (bytes, true),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                let value: Value = if binary {
                    rmp_serde::from_slice(&bytes).unwrap()
                } else {
                    serde_json::from_slice(&bytes).unwrap()
                };
                let _ = frames_tx.send(ReceivedFrame { binary, value: value.clone() });

                let handler = Arc::clone(&handler);
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    if let Some(reply) = handler(value).await {
                        let message = if binary {
                            Message::Binary(rmp_serde::to_vec_named(&reply).unwrap())
                        } else {
                            Message::Text(reply.to_string())
                        };
                        let _ = out_tx.send(message);
                    }
                });
            }
        }
    }
}

/// A request recorded by `MockHttpServer`
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_msgpack(&self) -> bool {
        self.header("content-type") == Some("application/octet-stream")
    }

    /// Body decoded according to its `Content-Type`
    pub fn body_value(&self) -> Value {
        if self.is_msgpack() {
            rmp_serde::from_slice(&self.body).unwrap()
        } else {
            serde_json::from_slice(&self.body).unwrap()
        }
    }
}

/// Scripted HTTP answer
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl MockReply {
    /// 200 with `{success: true, data: response}`
    pub fn ok(response: Value) -> Self {
        Self {
            status: 200,
            body: json!({"success": true, "data": response}),
            delay: None,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Mock HTTP server built on warp
pub struct MockHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockHttpServer {
    /// Server that answers every POST with one row echoing the SQL text
    pub async fn echo() -> Self {
        Self::start(|request| {
            let body = request.body_value();
            MockReply::ok(rows_response(json!([{"query": body["query"].clone()}])))
        })
        .await
    }

    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&CapturedRequest) -> MockReply + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let route = warp::post()
            .and(warp::path::full())
            .and(warp::header::headers_cloned())
            .and(warp::body::bytes())
            .and_then(move |path: FullPath, headers: HeaderMap, body: Bytes| {
                let handler = Arc::clone(&handler);
                let captured = Arc::clone(&captured);
                async move {
                    let request = CapturedRequest {
                        path: path.as_str().to_string(),
                        headers,
                        body: body.to_vec(),
                    };
                    let reply = handler(&request);
                    let binary = request.is_msgpack();
                    captured.lock().unwrap().push(request);

                    if let Some(delay) = reply.delay {
                        tokio::time::sleep(delay).await;
                    }

                    let body = if binary {
                        rmp_serde::to_vec_named(&reply.body).unwrap()
                    } else {
                        serde_json::to_vec(&reply.body).unwrap()
                    };
                    Ok::<_, Infallible>(
                        warp::http::Response::builder()
                            .status(reply.status)
                            .body(body)
                            .unwrap(),
                    )
                }
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) =
            warp::serve(route).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });
        tokio::spawn(server);

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn config(&self) -> ClientConfig {
        local_config(self.port())
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> CapturedRequest {
        self.requests().pop().expect("no request received")
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_to_carries_request_id() {
        let frame = json!({"requestId": "req_1_0", "op": "query"});
        let reply = reply_to(&frame, rows_response(json!([])));
        assert_eq!(reply["requestId"], "req_1_0");
        assert_eq!(reply["response"]["success"], true);
    }

    #[tokio::test]
    async fn test_mock_servers_bind_local_ports() {
        let ws = MockWsServer::echo().await;
        let http = MockHttpServer::echo().await;
        assert_ne!(ws.port(), 0);
        assert_ne!(http.port(), 0);
        assert_eq!(ws.connections(), 0);
        ws.shutdown().await;
    }
}

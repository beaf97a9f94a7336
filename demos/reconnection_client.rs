//! WebSocket client that logs connection events and keeps querying
//!
//! Stop and restart the server while this runs to watch the client back off
//! and reconnect.

use std::time::Duration;
use wireql::{ClientConfig, QueryOptions, WireQLClient};
use wireql_client::{ClientEvent, EventKind, WebSocketOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("wireql_client=info")
        .init();

    let config = ClientConfig::new("localhost").with_websocket(
        WebSocketOptions::default()
            .with_max_reconnect_delay(Duration::from_secs(5))
            .with_max_reconnect_attempts(20)
            .with_ping_interval(Duration::from_secs(10)),
    );
    let client = WireQLClient::new(config)?;

    for kind in [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::Reconnecting,
        EventKind::Reconnected,
        EventKind::Error,
    ] {
        client.on(kind, |event| match event {
            ClientEvent::Disconnect { reason, code } => println!("[{}] {} ({})", event.kind(), reason, code),
            ClientEvent::Reconnecting { attempt } => println!("[{}] attempt {}", event.kind(), attempt),
            ClientEvent::Error { message } => println!("[{}] {}", event.kind(), message),
            other => println!("[{}]", other.kind()),
        });
    }

    client.connect().await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    for _ in 0..60 {
        ticker.tick().await;
        let state = client.connection_state().await;
        match client.query("SELECT 1 AS ping", vec![], QueryOptions::default()).await {
            Ok(result) => println!("{:?} ok in {:?}", state, result.metrics.total_time),
            Err(e) => println!("{:?} failed: {}", state, e),
        }
    }

    client.disconnect().await;
    Ok(())
}

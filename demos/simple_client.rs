//! Basic WireQL client usage over HTTP
//!
//! Expects a WireQL server on localhost:8080 (override with `WIREQL_HOST`,
//! `WIREQL_PORT` and friends).

use serde_json::json;
use wireql::{create_client, ClientConfig, QueryOptions};
use wireql_client::{BatchItem, BatchOptions};
use wireql_core::{SerializationFormat, SqlOperation, SqlStep};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("wireql_client=debug")
        .init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(_) => ClientConfig::new("localhost")
            .with_api_key("admin-key")
            .with_default_database("gameserver"),
    }
    .with_serialization_format(SerializationFormat::Json)
    .with_debug(true);

    let db = create_client(config)?;

    if !db.ping().await {
        eprintln!("Server not reachable: {:?}", db.stats().last_error);
        return Ok(());
    }

    let users = db
        .call("SELECT * FROM users WHERE active = ? AND level > ?", vec![json!(true), json!(10)], QueryOptions::default())
        .await?;
    println!("{} active users in {:?}", users.rows().len(), users.metrics.total_time);

    match db.query("SELECT * FROM missing_table", vec![], QueryOptions::default()).await {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("expected failure: {}", e),
    }

    let steps = vec![
        SqlStep::new(SqlOperation::Insert, "INSERT INTO players (name) VALUES (?)", vec![json!("Ada")]),
        SqlStep::new(SqlOperation::Update, "UPDATE stats SET players = players + 1", vec![]),
    ];
    let txn = db.transaction(steps, Default::default()).await?;
    println!("transaction affected {:?} rows", txn.rows_affected());

    let results = db
        .batch(
            vec![
                BatchItem::new("SELECT COUNT(*) AS total FROM users", vec![]),
                BatchItem::new("SELECT COUNT(*) AS total FROM players", vec![]),
            ],
            BatchOptions::default().parallel(true),
        )
        .await?;
    for result in &results {
        println!("{:?}", result.first());
    }

    println!("{}", serde_json::to_string_pretty(&db.stats())?);
    Ok(())
}

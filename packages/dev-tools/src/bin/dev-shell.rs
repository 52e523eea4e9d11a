//! Development Shell Binary
//!
//! Wires the engine against a libsql database file and runs one command.
//!
//! # Usage
//!
//! ```bash
//! # Replay the reorder scenario in a fresh collection
//! cargo run --bin dev-shell -- scenario
//!
//! # Inspect a collection
//! cargo run --bin dev-shell -- list node:home
//! cargo run --bin dev-shell -- verify node:home
//!
//! # Print the opened tree below a node (default: the virtual root)
//! cargo run --bin dev-shell -- tree
//!
//! # Operations that partially applied
//! cargo run --bin dev-shell -- intents
//! ```
//!
//! # Environment Variables
//!
//! - `NODECHAIN_DB_PATH`: Database file (default: `~/.nodechain/database/nodechain-dev.db`)
//! - `NODECHAIN_*`: Remaining engine settings, see `EngineConfig::from_env`
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! **DEVELOPMENT ONLY**: the shell writes to whatever database it is pointed at.

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use nodechain_core::config::default_database_path;
use nodechain_core::db::RecordBody;
use nodechain_core::models::NodeCodec;
use nodechain_core::{CollectionDriver, EngineConfig, LibsqlStore, Materializer};

type Driver = CollectionDriver<LibsqlStore>;

const USAGE: &str = "usage: dev-shell <scenario | list <collection> | tree [root] | verify <collection> | intents>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env().context("Invalid NODECHAIN_* configuration")?;

    let db_path = match &config.store.database_path {
        Some(path) => path.clone(),
        None => default_database_path("nodechain-dev.db")?,
    };
    tracing::info!("Database: {}", db_path.display());

    let store = LibsqlStore::with_busy_timeout(db_path, config.store.busy_timeout_ms).await?;
    let driver = Arc::new(CollectionDriver::with_config(
        Arc::new(store),
        config.ordering.clone(),
    ));

    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["scenario"] => scenario(&driver).await,
        ["list", collection] => list(&driver, collection).await,
        ["tree"] => tree(&driver, &config, &config.hierarchy.root_id).await,
        ["tree", root] => tree(&driver, &config, root).await,
        ["verify", collection] => verify(&driver, collection).await,
        ["intents"] => intents(&driver).await,
        _ => bail!(USAGE),
    }
}

async fn list(driver: &Driver, collection: &str) -> anyhow::Result<()> {
    let records = driver.list(collection).await?;
    if records.is_empty() {
        println!("(empty)");
    }
    for (position, record) in records.iter().enumerate() {
        println!("{:>4}  {}  {}", position, record.key, record.content);
    }
    Ok(())
}

async fn tree(driver: &Arc<Driver>, config: &EngineConfig, root: &str) -> anyhow::Result<()> {
    let materializer: Materializer<LibsqlStore, NodeCodec> =
        Materializer::new(driver.clone(), config.hierarchy.clone());
    let arena = materializer.materialize(root, true, None).await?;

    for row in arena.flatten() {
        let Some(node) = arena.get(&row.id) else {
            continue;
        };
        let marker = match (node.is_opened(), node.expanded) {
            (true, true) => "v",
            (false, _) => ">",
            (true, false) => "-",
        };
        println!("{}{} {}", "  ".repeat(row.depth), marker, node.content());
    }
    Ok(())
}

async fn verify(driver: &Driver, collection: &str) -> anyhow::Result<()> {
    let report = driver.verify(collection).await?;
    println!("{}", report);
    if !report.is_consistent() {
        bail!("collection '{}' violates list invariants", collection);
    }
    Ok(())
}

async fn intents(driver: &Driver) -> anyhow::Result<()> {
    let pending = driver.pending_intents().await?;
    if pending.is_empty() {
        println!("No pending intents");
    }
    for intent in pending {
        println!("{}", serde_json::to_string_pretty(&intent)?);
    }
    Ok(())
}

/// `[A,B,C] -> [C,A,B] -> [C,A,B,D] -> [C,B,A,D] -> [C,A,D]`
async fn scenario(driver: &Driver) -> anyhow::Result<()> {
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let collection = format!("node:scenario-{}", run_id);
    let key = |label: &str| format!("{}-{}", label.to_lowercase(), run_id);
    tracing::info!("Replaying scenario in '{}'", collection);

    for label in ["A", "B", "C"] {
        driver
            .insert(&key(label), &collection, RecordBody::text(label), None)
            .await?;
    }
    expect_order(driver, &collection, &["A", "B", "C"]).await?;

    driver.move_after(&key("C"), &collection, None).await?;
    expect_order(driver, &collection, &["C", "A", "B"]).await?;

    driver
        .insert(&key("D"), &collection, RecordBody::text("D"), None)
        .await?;
    expect_order(driver, &collection, &["C", "A", "B", "D"]).await?;

    driver
        .move_after(&key("B"), &collection, Some(&key("C")))
        .await?;
    expect_order(driver, &collection, &["C", "B", "A", "D"]).await?;

    driver.delete(&key("B")).await?;
    expect_order(driver, &collection, &["C", "A", "D"]).await?;

    let report = driver.verify(&collection).await?;
    println!("{}", report);
    Ok(())
}

async fn expect_order(driver: &Driver, collection: &str, expected: &[&str]) -> anyhow::Result<()> {
    let actual: Vec<String> = driver
        .list(collection)
        .await?
        .into_iter()
        .map(|r| r.content)
        .collect();
    println!("[{}]", actual.join(", "));
    if actual != expected {
        bail!("expected {:?}, found {:?}", expected, actual);
    }
    Ok(())
}

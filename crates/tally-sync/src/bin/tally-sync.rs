//! # tally-sync demo
//!
//! Wires the sync core together against a real store, rings up one sale and
//! prints the resulting sync statistics.
//!
//! ## Usage
//! ```bash
//! # Offline: the sale stays queued
//! cargo run -p tally-sync
//!
//! # Against a remote endpoint
//! TALLY_ENDPOINT_URL=http://localhost:8080/transactions cargo run -p tally-sync
//!
//! # Explicit config file, forced offline
//! cargo run -p tally-sync -- --config ./sync.toml --offline
//! ```

use async_trait::async_trait;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::{LineItem, Money, PaymentMethod, Transaction, TransactionDraft};
use tally_db::Database;
use tally_sync::{
    BackgroundTrigger, ConnectivityMonitor, ConnectivityStatus, HttpEndpoint, RemoteEndpoint,
    SyncAgent, SyncConfig, SyncEngine, SyncError, SyncResult, SyncService,
    TokioBackgroundScheduler,
};
use tracing::{info, warn};

/// Stand-in when no endpoint URL is configured; every submission fails.
struct Unconfigured;

#[async_trait]
impl RemoteEndpoint for Unconfigured {
    async fn submit(&self, _tx: &Transaction) -> SyncResult<()> {
        Err(SyncError::InvalidConfig("no endpoint URL configured".into()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tally_sync::init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut force_offline = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--offline" => force_offline = true,
            "--help" | "-h" => {
                println!("Tally POS sync demo");
                println!();
                println!("Usage: tally-sync [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("      --offline        Start with connectivity offline");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = SyncConfig::load(config_path)?;
    info!(
        device_id = %config.device_id(),
        db = %config.database_path().display(),
        endpoint = config.endpoint_url().unwrap_or("<none>"),
        "Configuration loaded"
    );

    if let Some(parent) = config.database_path().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::open(config.db_config()).await?;

    let endpoint: Arc<dyn RemoteEndpoint> = match config.endpoint_url() {
        Some(url) => Arc::new(HttpEndpoint::new(url, config.submit_timeout())?),
        None => Arc::new(Unconfigured),
    };

    // Without an endpoint there is nowhere to be online to.
    let initial = if force_offline || config.endpoint_url().is_none() {
        ConnectivityStatus::Offline
    } else {
        ConnectivityStatus::Online
    };
    let connectivity = ConnectivityMonitor::new(initial);

    let engine = Arc::new(
        SyncEngine::new(db.clone(), Arc::clone(&endpoint), connectivity.clone())
            .with_submit_timeout(config.submit_timeout()),
    );
    let scheduler = Arc::new(TokioBackgroundScheduler::new(
        BackgroundTrigger::new(config.db_config(), endpoint, connectivity.clone())
            .with_submit_timeout(config.submit_timeout()),
    ));
    let service = SyncService::new(db.clone(), Arc::clone(&engine), connectivity.clone())
        .with_scheduler(scheduler)
        .with_background_tag(config.sync.background_tag.clone());

    let agent = config.sync.auto_sync.then(|| {
        SyncAgent::new(Arc::clone(&engine), connectivity.clone())
            .with_poll_interval(config.poll_interval())
            .start()
    });

    let draft = TransactionDraft::new(
        vec![
            LineItem {
                item_id: "nasi-goreng".into(),
                name: "Nasi Goreng".into(),
                unit_price: Money::from_minor(25_000),
                quantity: 2,
                unit: "plate".into(),
            },
            LineItem {
                item_id: "es-teh".into(),
                name: "Es Teh Manis".into(),
                unit_price: Money::from_minor(5_000),
                quantity: 2,
                unit: "glass".into(),
            },
        ],
        PaymentMethod::Cash,
    );
    let tx = service.record_transaction(draft).await?;
    println!(
        "Recorded {} ({} minor units, {})",
        tx.id,
        tx.total().minor(),
        connectivity.current_status()
    );

    let outcome = service.manual_sync().await?;
    info!(?outcome, "Manual sync finished");

    if let Some(agent) = agent {
        agent.shutdown().await?;
    }

    let stats = service.get_sync_stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    db.close().await;
    Ok(())
}

//! Ajna pool indexer
//!
//! Follows Ajna pool and factory logs and keeps a ledger of pools, buckets,
//! lenders, loans, auctions, reserve auctions and LP allowances.
//! Features:
//! - Batched `eth_getLogs` backfill, then head following behind confirmations
//! - Aggregates re-read from PoolInfoUtils at each event's block
//! - Periodic JSON snapshots with resume from the last applied event

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use indexer_chain::{AlloyReader, LogSource};
use indexer_core::{init_config, Indexer, IndexerConfig, IndexerSettings, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,indexer_core=debug,indexer_chain=debug")),
        )
        .init();

    // INDEXER_CONFIG selects the file, INDEXER_PROFILE the sync profile
    let config = init_config(IndexerConfig::from_env().context("Failed to load configuration")?);
    config.log_config();

    let reader = AlloyReader::connect(&config.chain.rpc_url, config.contracts.pool_info_utils)
        .await
        .context("Failed to connect to RPC")?;

    let chain_id = reader.chain_id().await.context("Failed to read chain id")?;
    if let Some(expected) = config.chain.chain_id {
        if chain_id != expected {
            bail!("RPC chain id {chain_id} does not match configured {expected}");
        }
    }
    info!(chain_id, "Connected");

    let store = match &config.store.snapshot_path {
        Some(path) => Store::load_snapshot(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?,
        None => {
            warn!("No snapshot path configured, state will not persist");
            Store::new()
        }
    };
    info!(pools = store.pools.len(), cursor = ?store.cursor, "Store loaded");

    let source = LogSource::new(
        reader.provider(),
        config.contracts.pools.iter().map(|p| p.address),
        config.contracts.factories(),
    );
    info!(
        pools = source.watched_pools().count(),
        factories = config.contracts.factories().len(),
        "Log source ready"
    );

    let mut indexer = Indexer::new(
        Arc::new(reader),
        source,
        store,
        IndexerSettings::from_config(config),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    indexer.run(shutdown_rx).await?;
    info!("Indexer stopped");
    Ok(())
}

//! Sync orchestration.
//!
//! Bootstraps configured pools, backfills the configured range in batches,
//! then follows the head. Events are applied strictly in delivery order and
//! the store cursor advances after each one. Transient source failures are
//! retried at the next poll. A handler error stops the indexer; the last
//! snapshot stays the recovery point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use indexer_chain::{
    ChainStateReader, EventMeta, LogSource, PoolEvent, PoolEventKind, SourceError,
};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfiguredPool, IndexerConfig};
use crate::error::{IndexerError, Result};
use crate::handlers::{handle_event, HandlerOptions};
use crate::ledger::pool::bootstrap_pool;
use crate::nft::audit_pool;
use crate::store::{Cursor, Store};

/// Ordered event delivery over block ranges.
#[async_trait]
pub trait EventSource: Send {
    /// Latest block available.
    async fn head(&self) -> Result<u64, SourceError>;

    /// Every event in `[from, to]`, in delivery order.
    async fn fetch(&mut self, from: u64, to: u64) -> Result<Vec<PoolEvent>, SourceError>;

    /// Start delivering events of `pool`.
    fn watch(&mut self, pool: Address) -> bool;
}

#[async_trait]
impl EventSource for LogSource {
    async fn head(&self) -> Result<u64, SourceError> {
        LogSource::head(self).await
    }

    async fn fetch(&mut self, from: u64, to: u64) -> Result<Vec<PoolEvent>, SourceError> {
        LogSource::fetch(self, from, to).await
    }

    fn watch(&mut self, pool: Address) -> bool {
        LogSource::watch(self, pool)
    }
}

/// Indexer settings.
/// Built from the loaded [`IndexerConfig`].
#[derive(Debug, Clone)]
pub struct IndexerSettings {
    /// First block when the store has no cursor
    pub start_block: u64,
    pub batch_size: u64,
    pub confirmations: u64,
    pub poll_interval: Duration,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_every_batches: u64,
    pub options: HandlerOptions,
    /// Pools created before `start_block`
    pub pools: Vec<ConfiguredPool>,
}

impl IndexerSettings {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            start_block: config.sync.start_block,
            batch_size: config.sync.batch_size.max(1),
            confirmations: config.sync.confirmations,
            poll_interval: config.sync.poll_interval(),
            snapshot_path: config.store.snapshot_path.clone(),
            snapshot_every_batches: config.store.snapshot_every_batches,
            options: config.handler_options(),
            pools: config.contracts.pools.clone(),
        }
    }
}

/// Events after which the NFT token id partition is re-checked.
fn moves_nft_collateral(kind: &PoolEventKind) -> bool {
    matches!(
        kind,
        PoolEventKind::AddCollateralNft { .. }
            | PoolEventKind::RemoveCollateral { .. }
            | PoolEventKind::MergeOrRemoveCollateralNft { .. }
            | PoolEventKind::DrawDebtNft { .. }
            | PoolEventKind::RepayDebt { .. }
            | PoolEventKind::Take { .. }
            | PoolEventKind::BucketTake { .. }
            | PoolEventKind::Settle { .. }
            | PoolEventKind::AuctionNftSettle { .. }
    )
}

/// Drives the store from an [`EventSource`].
pub struct Indexer<R, S> {
    reader: Arc<R>,
    source: S,
    store: Store,
    settings: IndexerSettings,
    batches_since_snapshot: u64,
}

impl<R: ChainStateReader, S: EventSource> Indexer<R, S> {
    pub fn new(reader: Arc<R>, source: S, store: Store, settings: IndexerSettings) -> Self {
        Self {
            reader,
            source,
            store,
            settings,
            batches_since_snapshot: 0,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// First block not yet applied.
    pub fn next_block(&self) -> u64 {
        match self.store.cursor {
            Some(cursor) => cursor.block + 1,
            None => self.settings.start_block,
        }
    }

    /// Watch every stored pool and create configured pools missing from
    /// the store. Returns the number of pools created.
    #[instrument(skip(self))]
    pub async fn bootstrap(&mut self) -> Result<usize> {
        let known: Vec<Address> = self.store.pools.values().map(|p| p.address).collect();
        for pool in known {
            self.source.watch(pool);
        }

        let block = self.next_block();
        let mut created = 0;
        for pool in self.settings.pools.clone() {
            self.source.watch(pool.address);
            self.reader.pin_block(block);
            let meta = EventMeta {
                address: pool.address,
                block_number: block,
                block_timestamp: 0,
                tx_hash: B256::ZERO,
                tx_index: 0,
                log_index: 0,
                tx_from: Address::ZERO,
                tx_input: None,
            };
            if bootstrap_pool(&mut self.store, self.reader.as_ref(), pool.address, pool.kind, &meta)
                .await?
            {
                created += 1;
            }
        }

        info!(
            pools = self.store.pools.len(),
            created,
            next_block = block,
            "Bootstrap complete"
        );
        Ok(created)
    }

    /// Apply `events` in order, skipping any at or before the cursor.
    /// Returns the number applied.
    pub async fn apply(&mut self, events: Vec<PoolEvent>) -> Result<usize> {
        let mut applied = 0;
        for event in events {
            let position = event.meta.position();
            if let Some(cursor) = self.store.cursor {
                if position <= cursor.position() {
                    debug!(?position, "Skipping already applied event");
                    continue;
                }
            }

            if let Err(e) =
                handle_event(&mut self.store, self.reader.as_ref(), &event, self.settings.options)
                    .await
            {
                error!(
                    event = event.name(),
                    pool = %event.meta.address,
                    block = event.meta.block_number,
                    tx = %event.meta.tx_hash,
                    log_index = event.meta.log_index,
                    error = %e,
                    "Event handling failed"
                );
                return Err(e);
            }

            if cfg!(debug_assertions) && moves_nft_collateral(&event.kind) {
                audit_pool(&mut self.store, event.meta.address, &event.meta);
            }

            self.store.cursor = Some(Cursor {
                block: event.meta.block_number,
                tx_index: event.meta.tx_index,
                log_index: event.meta.log_index,
            });
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply every block up to and including `target`, one batch at a time.
    /// Returns the number of batches.
    #[instrument(skip(self))]
    pub async fn sync_to(&mut self, target: u64) -> Result<u64> {
        let mut batches = 0;
        while self.next_block() <= target {
            let from = self.next_block();
            let to = target.min(from.saturating_add(self.settings.batch_size.max(1) - 1));

            let events = self.source.fetch(from, to).await?;
            let fetched = events.len();
            let applied = self.apply(events).await?;

            // an empty range still has to move the cursor
            let cursor = self.store.cursor.unwrap_or_default();
            if cursor.block < to {
                self.store.cursor = Some(Cursor {
                    block: to,
                    tx_index: u64::MAX,
                    log_index: u64::MAX,
                });
            }

            info!(from, to, fetched, applied, "Batch applied");
            batches += 1;
            self.batches_since_snapshot += 1;
            if self.batches_since_snapshot >= self.settings.snapshot_every_batches.max(1) {
                self.snapshot()?;
            }
        }
        Ok(batches)
    }

    /// Persist the store, if a snapshot path is configured.
    pub fn snapshot(&mut self) -> Result<()> {
        if let Some(path) = &self.settings.snapshot_path {
            self.store.save_snapshot(path)?;
        }
        self.batches_since_snapshot = 0;
        Ok(())
    }

    /// Bootstrap, backfill, then follow the head until `shutdown` flips.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.bootstrap().await?;
        info!(
            next_block = self.next_block(),
            batch_size = self.settings.batch_size,
            confirmations = self.settings.confirmations,
            "Indexer started"
        );

        while !*shutdown.borrow() {
            let outcome = match self.source.head().await {
                Ok(head) => {
                    let target = head.saturating_sub(self.settings.confirmations);
                    if self.next_block() <= target {
                        self.sync_to(target).await.map(|_| ())
                    } else {
                        debug!(head, target, "Caught up");
                        self.wait(&mut shutdown).await;
                        Ok(())
                    }
                }
                Err(e) => Err(e.into()),
            };

            // head and log reads share one policy: transient failures wait
            // for the next poll, a batch that failed mid-fetch is refetched
            match outcome {
                Ok(()) => {}
                Err(IndexerError::Source(e)) if e.is_transient() => {
                    warn!(error = %e, next_block = self.next_block(), "Event source failed, retrying");
                    self.wait(&mut shutdown).await;
                }
                Err(e) => return Err(e),
            }
        }

        info!(cursor = ?self.store.cursor, "Indexer stopping");
        self.snapshot()
    }

    async fn wait(&self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.poll_interval) => {}
            _ = shutdown.changed() => {}
        }
    }
}

//! Ordered event source over `eth_getLogs`.
//!
//! Logs are fetched per block range from the watched pools and factories,
//! decoded, enriched with block timestamp and transaction origin, and
//! returned sorted by (block, transaction index, log index).

use std::collections::{BTreeSet, HashMap};

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use thiserror::Error;
use tracing::{debug, info};

use crate::contracts::{pool_event_signatures, IPoolFactory};
use crate::events::{decode_log, DecodeError, EventMeta, PoolEvent};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("log is missing {0}")]
    MissingField(&'static str),
    #[error("block {0} not found")]
    MissingBlock(u64),
    #[error("transaction {0} not found")]
    MissingTransaction(B256),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl SourceError {
    /// Whether the same request may succeed on a later poll.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Rpc(_) | Self::MissingBlock(_) | Self::MissingTransaction(_)
        )
    }
}

/// Pulls pool and factory logs for a block range.
pub struct LogSource {
    provider: DynProvider,
    pools: BTreeSet<Address>,
    factories: Vec<Address>,
}

impl LogSource {
    pub fn new(
        provider: DynProvider,
        pools: impl IntoIterator<Item = Address>,
        factories: Vec<Address>,
    ) -> Self {
        Self {
            provider,
            pools: pools.into_iter().collect(),
            factories,
        }
    }

    /// Start following logs of `pool`.
    pub fn watch(&mut self, pool: Address) -> bool {
        self.pools.insert(pool)
    }

    pub fn watched_pools(&self) -> impl Iterator<Item = &Address> {
        self.pools.iter()
    }

    /// Latest block number of the endpoint.
    pub async fn head(&self) -> Result<u64, SourceError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| SourceError::Rpc(e.to_string()))
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, SourceError> {
        self.provider
            .get_logs(filter)
            .await
            .map_err(|e| SourceError::Rpc(e.to_string()))
    }

    /// Fetch every indexed event in `[from, to]`.
    ///
    /// Factory logs are read first so pools created inside the range are
    /// watched before the pool logs of the same range are requested.
    pub async fn fetch(&mut self, from: u64, to: u64) -> Result<Vec<PoolEvent>, SourceError> {
        let mut raw = Vec::new();

        if !self.factories.is_empty() {
            let filter = Filter::new()
                .address(self.factories.clone())
                .event_signature(IPoolFactory::PoolCreated::SIGNATURE_HASH)
                .from_block(from)
                .to_block(to);
            let created = self.logs(&filter).await?;
            for log in &created {
                if let Ok(ev) = IPoolFactory::PoolCreated::decode_log_data(log.data(), true) {
                    if self.watch(ev.pool_) {
                        info!(pool = %ev.pool_, block = ?log.block_number, "Watching new pool");
                    }
                }
            }
            raw.extend(created);
        }

        if !self.pools.is_empty() {
            let filter = Filter::new()
                .address(self.pools.iter().copied().collect::<Vec<_>>())
                .event_signature(pool_event_signatures())
                .from_block(from)
                .to_block(to);
            raw.extend(self.logs(&filter).await?);
        }

        let mut events = Vec::with_capacity(raw.len());
        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        let mut origins: HashMap<B256, (Address, Bytes)> = HashMap::new();

        for log in raw {
            let kind = match decode_log(log.data()) {
                Ok(kind) => kind,
                Err(DecodeError::UnknownSignature(sig)) => {
                    debug!(sig = %sig, address = %log.address(), "Skipping unknown log");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let block_number = log.block_number.ok_or(SourceError::MissingField("block_number"))?;
            let tx_hash = log
                .transaction_hash
                .ok_or(SourceError::MissingField("transaction_hash"))?;

            let block_timestamp = match log.block_timestamp {
                Some(ts) => ts,
                None => match timestamps.get(&block_number) {
                    Some(ts) => *ts,
                    None => {
                        let ts = self.block_timestamp(block_number).await?;
                        timestamps.insert(block_number, ts);
                        ts
                    }
                },
            };

            if !origins.contains_key(&tx_hash) {
                let origin = self.origin(tx_hash).await?;
                origins.insert(tx_hash, origin);
            }
            let (tx_from, input) = origins
                .get(&tx_hash)
                .cloned()
                .ok_or(SourceError::MissingTransaction(tx_hash))?;

            events.push(PoolEvent {
                meta: EventMeta {
                    address: log.address(),
                    block_number,
                    block_timestamp,
                    tx_hash,
                    tx_index: log.transaction_index.unwrap_or_default(),
                    log_index: log.log_index.unwrap_or_default(),
                    tx_from,
                    tx_input: kind.needs_tx_input().then_some(input),
                },
                kind,
            });
        }

        sort_events(&mut events);
        debug!(from, to, count = events.len(), "Fetched events");
        Ok(events)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, SourceError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|e| SourceError::Rpc(e.to_string()))?
            .ok_or(SourceError::MissingBlock(number))?;
        Ok(block.header.timestamp)
    }

    async fn origin(&self, tx_hash: B256) -> Result<(Address, Bytes), SourceError> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(|e| SourceError::Rpc(e.to_string()))?
            .ok_or(SourceError::MissingTransaction(tx_hash))?;
        Ok((tx.from(), tx.input().clone()))
    }
}

/// Sort into delivery order.
pub fn sort_events(events: &mut [PoolEvent]) {
    events.sort_by_key(|ev| ev.meta.position());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PoolEventKind;

    fn event(block: u64, tx_index: u64, log_index: u64) -> PoolEvent {
        PoolEvent {
            meta: EventMeta {
                address: Address::ZERO,
                block_number: block,
                block_timestamp: 0,
                tx_hash: B256::ZERO,
                tx_index,
                log_index,
                tx_from: Address::ZERO,
                tx_input: None,
            },
            kind: PoolEventKind::LoanStamped {
                borrower: Address::ZERO,
            },
        }
    }

    #[test]
    fn test_sort_events_by_position() {
        let mut events = vec![event(5, 1, 0), event(4, 9, 9), event(5, 0, 3), event(5, 1, 2)];
        sort_events(&mut events);

        let positions: Vec<_> = events.iter().map(|e| e.meta.position()).collect();
        assert_eq!(positions, vec![(4, 9, 9), (5, 0, 3), (5, 1, 0), (5, 1, 2)]);
    }
}

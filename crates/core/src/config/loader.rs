//! Single entry point for the indexer configuration.
//!
//! Reads the TOML file, expands environment references, resolves the sync
//! profile and parses every contract address.

use super::chain::{expand_env, ChainConfig, ConfiguredPool, ContractsConfig, ResolvedContracts};
use super::sync::{StoreConfig, SyncConfig, SyncOverrides};
use crate::handlers::HandlerOptions;
use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

/// Default config path when `INDEXER_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/indexer.toml";

/// The file as written.
#[derive(Debug, Clone, Deserialize)]
struct IndexerFile {
    chain: ChainConfig,
    contracts: ContractsConfig,
    #[serde(default)]
    sync: SyncOverrides,
    #[serde(default)]
    store: StoreConfig,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chain: ChainConfig,
    pub contracts: ResolvedContracts,
    pub sync: SyncConfig,
    pub store: StoreConfig,
}

impl IndexerConfig {
    /// Load and resolve a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Resolve config text. `INDEXER_PROFILE` wins over `sync.profile`.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: IndexerFile = toml::from_str(content)?;

        let mut chain = file.chain;
        chain.expand_env_vars();

        let mut sync = match (std::env::var("INDEXER_PROFILE").ok(), &file.sync.profile) {
            (Some(name), _) => SyncConfig::profile(&name),
            (None, Some(name)) => SyncConfig::profile(name),
            (None, None) => SyncConfig::default(),
        };
        sync.apply(&file.sync);

        Ok(Self {
            chain,
            contracts: resolve_contracts(&file.contracts)?,
            sync,
            store: file.store,
        })
    }

    /// Load from `INDEXER_CONFIG`, or [`DEFAULT_CONFIG_PATH`].
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var("INDEXER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&path)
    }

    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            verify_lend_balances: self.sync.verify_lend_balances,
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!(profile = %self.sync.profile, chain_id = ?self.chain.chain_id, "Indexer configuration loaded");
        info!(
            start_block = self.sync.start_block,
            batch_size = self.sync.batch_size,
            confirmations = self.sync.confirmations,
            poll_interval_ms = self.sync.poll_interval_ms,
            verify_lend_balances = self.sync.verify_lend_balances,
            "Sync parameters"
        );
        info!(
            pool_info_utils = %self.contracts.pool_info_utils,
            factories = self.contracts.factories().len(),
            pools = self.contracts.pools.len(),
            "Contracts"
        );
        info!(
            snapshot = ?self.store.snapshot_path,
            every_batches = self.store.snapshot_every_batches,
            "Snapshots"
        );
    }
}

fn parse_addr(raw: &str, field: &str) -> Result<Address> {
    let value = expand_env(raw);
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address for {field} '{value}': {e}"))
}

fn resolve_contracts(config: &ContractsConfig) -> Result<ResolvedContracts> {
    let pools = config
        .pools
        .iter()
        .map(|p| {
            Ok(ConfiguredPool {
                address: parse_addr(&p.address, "contracts.pools.address")?,
                kind: p.kind,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedContracts {
        pool_info_utils: parse_addr(&config.pool_info_utils, "contracts.pool_info_utils")?,
        erc20_factory: config
            .erc20_factory
            .as_deref()
            .map(|s| parse_addr(s, "contracts.erc20_factory"))
            .transpose()?,
        erc721_factory: config
            .erc721_factory
            .as_deref()
            .map(|s| parse_addr(s, "contracts.erc721_factory"))
            .transpose()?,
        pools,
    })
}

static GLOBAL_CONFIG: OnceLock<IndexerConfig> = OnceLock::new();

/// Install the global configuration; the first call wins.
pub fn init_config(config: IndexerConfig) -> &'static IndexerConfig {
    GLOBAL_CONFIG.get_or_init(|| config)
}

/// The global configuration, if installed.
pub fn config() -> Option<&'static IndexerConfig> {
    GLOBAL_CONFIG.get()
}

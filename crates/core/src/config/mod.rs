//! Indexer configuration.
//!
//! - [`chain`]: RPC endpoint and contract addresses
//! - [`sync`]: sync profiles and snapshot settings
//! - [`loader`]: file loading, env expansion, global holder

mod chain;
mod loader;
mod sync;

pub use chain::{ChainConfig, ConfiguredPool, ContractsConfig, PoolEntry, ResolvedContracts};
pub use loader::{config, init_config, IndexerConfig, DEFAULT_CONFIG_PATH};
pub use sync::{StoreConfig, SyncConfig, SyncOverrides};

//! Lending pool indexer core.
//!
//! This crate turns decoded pool events into a queryable ledger:
//! - Keyed entity store with JSON snapshots
//! - Deterministic entity ids
//! - Per-event handlers for lending, borrowing, liquidations, reserves and LP transfers
//! - NFT token-id allocation between loans and buckets
//! - Sync orchestration over an ordered event source
//!
//! Chain access goes through [`indexer_chain::ChainStateReader`], so every
//! handler runs unchanged against a node or an in-memory reader.

pub mod auction;
pub mod config;
mod error;
pub mod handlers;
pub mod ids;
mod indexer;
pub mod ledger;
pub mod math;
pub mod nft;
pub mod reserve;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{config, init_config, IndexerConfig};
pub use error::{IndexerError, Result};
pub use handlers::{handle_event, HandlerOptions};
pub use ids::EntityId;
pub use indexer::{EventSource, Indexer, IndexerSettings};
pub use store::{Cursor, Store};

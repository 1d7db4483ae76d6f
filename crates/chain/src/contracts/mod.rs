//! Contract bindings for the lending pools and their helpers.
//!
//! - [`pool`]: pool events (both kinds), pool reads, decoded NFT-pool calls
//! - [`info_utils`]: the chain-wide PoolInfoUtils helper
//! - [`factory`]: pool factories and their `deployPool` shapes
//! - [`common`]: ERC-20 / ERC-721 metadata and balances

pub mod common;
pub mod factory;
pub mod info_utils;
pub mod pool;

pub use common::IERC20;
pub use factory::{
    erc20_non_subset_hash, erc721_non_subset_hash, IERC20PoolFactory, IERC721CollectionFactory,
    IERC721SubsetFactory, IPoolFactory,
};
pub use info_utils::IPoolInfoUtils;
pub use pool::{pool_event_signatures, IERC721PoolCalls, IPool, IPoolEvents};

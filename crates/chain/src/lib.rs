//! Lending pool chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for pools (fungible and NFT), PoolInfoUtils, factories
//! - Typed decoding of pool and factory logs into [`PoolEvent`]
//! - Calldata decoding for pool deployment and NFT merge calls
//! - The [`ChainStateReader`] trait and its alloy implementation
//! - An ordered `eth_getLogs` event source

pub mod calldata;
pub mod contracts;
pub mod events;
mod log_source;
mod provider;
pub mod reader;

pub use calldata::{decode_deploy_pool, decode_merge_or_remove, DeployPool, MergeOrRemove, PoolKind};
pub use events::{decode_log, DecodeError, EventMeta, PoolEvent, PoolEventKind};
pub use log_source::{sort_events, LogSource, SourceError};
pub use provider::AlloyReader;
pub use reader::{
    AuctionInfo, AuctionStatus, BorrowerInfo, BucketInfo, BurnInfo, ChainStateReader, DebtInfo,
    KickerInfo, LenderInfo, LoansInfo, PoolTokens, PricesInfo, RatesInfo, ReadError,
    ReservesInfo, TokenInfo, UtilizationInfo,
};

//! Derived-state records.
//!
//! Constructors hold the creation-time defaults for each kind; handlers
//! never build a record field-by-field.

use alloy::primitives::{Address, B256, U256};
use indexer_chain::{EventMeta, PoolEventKind, PoolKind};
use serde::{Deserialize, Serialize};

use super::amount::wad;
use super::table::Entity;
use crate::ids::{self, EntityId};
use crate::math::WAD;

macro_rules! entity {
    ($ty:ty, $kind:literal) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &EntityId {
                &self.id
            }
        }
    };
}

/// Where and when a record was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub tx_hash: B256,
    pub log_index: u64,
}

impl From<&EventMeta> for Provenance {
    fn from(meta: &EventMeta) -> Self {
        Self {
            block_number: meta.block_number,
            block_timestamp: meta.block_timestamp,
            tx_hash: meta.tx_hash,
            log_index: meta.log_index,
        }
    }
}

/// NFT pool restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NftSubKind {
    Collection,
    Subset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: EntityId,
    pub address: Address,
    pub kind: PoolKind,
    pub nft_sub_kind: Option<NftSubKind>,
    pub subset_hash: B256,
    pub created_at_block: u64,
    pub created_at_timestamp: u64,
    pub collateral_token: Address,
    pub quote_token: Address,

    // debt
    #[serde(with = "wad")]
    pub pool_size: U256,
    #[serde(with = "wad")]
    pub t0debt: U256,
    #[serde(with = "wad")]
    pub inflator: U256,
    #[serde(with = "wad")]
    pub current_debt: U256,
    #[serde(with = "wad")]
    pub debt_in_auction: U256,
    #[serde(with = "wad")]
    pub pledged_collateral: U256,
    pub loans_count: u64,
    pub max_borrower: Address,

    // rates
    #[serde(with = "wad")]
    pub interest_rate: U256,
    #[serde(with = "wad")]
    pub borrow_rate: U256,
    #[serde(with = "wad")]
    pub lend_rate: U256,
    #[serde(with = "wad")]
    pub borrow_fee_rate: U256,
    #[serde(with = "wad")]
    pub deposit_fee_rate: U256,
    #[serde(with = "wad")]
    pub lender_interest_margin: U256,

    // prices
    #[serde(with = "wad")]
    pub hpb: U256,
    pub hpb_index: u32,
    #[serde(with = "wad")]
    pub htp: U256,
    pub htp_index: u32,
    #[serde(with = "wad")]
    pub lup: U256,
    pub lup_index: u32,

    // reserves
    #[serde(with = "wad")]
    pub reserves: U256,
    #[serde(with = "wad")]
    pub claimable_reserves: U256,
    #[serde(with = "wad")]
    pub claimable_reserves_remaining: U256,
    #[serde(with = "wad")]
    pub reserve_auction_price: U256,
    pub reserve_auction_time_remaining: u64,
    pub current_burn_epoch: U256,
    #[serde(with = "wad")]
    pub total_ajna_burned: U256,

    // utilization
    #[serde(with = "wad")]
    pub min_debt_amount: U256,
    #[serde(with = "wad")]
    pub collateralization: U256,
    #[serde(with = "wad")]
    pub actual_utilization: U256,
    #[serde(with = "wad")]
    pub target_utilization: U256,

    // balances
    #[serde(with = "wad")]
    pub quote_token_balance: U256,
    #[serde(with = "wad")]
    pub collateral_balance: U256,
    #[serde(with = "wad")]
    pub quote_token_flashloaned: U256,
    #[serde(with = "wad")]
    pub collateral_flashloaned: U256,
    #[serde(with = "wad")]
    pub total_bond_escrowed: U256,

    pub tx_count: u64,
    /// Active liquidation auctions
    pub liquidation_auctions: Vec<EntityId>,
    pub reserve_auctions: Vec<EntityId>,

    /// NFT collateral pledged by borrowers, in pledge order
    pub token_ids_pledged: Vec<U256>,
    /// NFT collateral held by buckets
    pub bucket_token_ids: Vec<U256>,
    /// Subset pools only
    pub token_ids_allowed: Vec<U256>,
}
entity!(Pool, "Pool");

impl Pool {
    pub fn new(address: Address, kind: PoolKind, meta: &EventMeta) -> Self {
        Self {
            id: ids::address_id(address),
            address,
            kind,
            nft_sub_kind: None,
            subset_hash: B256::ZERO,
            created_at_block: meta.block_number,
            created_at_timestamp: meta.block_timestamp,
            collateral_token: Address::ZERO,
            quote_token: Address::ZERO,
            pool_size: U256::ZERO,
            t0debt: U256::ZERO,
            inflator: WAD,
            current_debt: U256::ZERO,
            debt_in_auction: U256::ZERO,
            pledged_collateral: U256::ZERO,
            loans_count: 0,
            max_borrower: Address::ZERO,
            interest_rate: U256::ZERO,
            borrow_rate: U256::ZERO,
            lend_rate: U256::ZERO,
            borrow_fee_rate: U256::ZERO,
            deposit_fee_rate: U256::ZERO,
            lender_interest_margin: U256::ZERO,
            hpb: U256::ZERO,
            hpb_index: 0,
            htp: U256::ZERO,
            htp_index: 0,
            lup: U256::ZERO,
            lup_index: 0,
            reserves: U256::ZERO,
            claimable_reserves: U256::ZERO,
            claimable_reserves_remaining: U256::ZERO,
            reserve_auction_price: U256::ZERO,
            reserve_auction_time_remaining: 0,
            current_burn_epoch: U256::ZERO,
            total_ajna_burned: U256::ZERO,
            min_debt_amount: U256::ZERO,
            collateralization: U256::ZERO,
            actual_utilization: U256::ZERO,
            target_utilization: U256::ZERO,
            quote_token_balance: U256::ZERO,
            collateral_balance: U256::ZERO,
            quote_token_flashloaned: U256::ZERO,
            collateral_flashloaned: U256::ZERO,
            total_bond_escrowed: U256::ZERO,
            tx_count: 0,
            liquidation_auctions: Vec::new(),
            reserve_auctions: Vec::new(),
            token_ids_pledged: Vec::new(),
            bucket_token_ids: Vec::new(),
            token_ids_allowed: Vec::new(),
        }
    }

    pub fn is_nft(&self) -> bool {
        self.kind == PoolKind::Erc721
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: EntityId,
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub is_nft: bool,
    pub total_supply: U256,
    pub pool_count: u64,
    pub tx_count: u64,
}
entity!(Token, "Token");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: EntityId,
    pub pool: Address,
    pub index: u32,
    #[serde(with = "wad")]
    pub price: U256,
    #[serde(with = "wad")]
    pub exchange_rate: U256,
    #[serde(with = "wad")]
    pub collateral: U256,
    #[serde(with = "wad")]
    pub deposit: U256,
    #[serde(with = "wad")]
    pub lpb: U256,
    /// Lends with non-zero LP
    pub lends: Vec<EntityId>,
}
entity!(Bucket, "Bucket");

impl Bucket {
    pub fn new(pool: Address, index: u32) -> Self {
        Self {
            id: ids::bucket_id(pool, index),
            pool,
            index,
            price: U256::ZERO,
            exchange_rate: WAD,
            collateral: U256::ZERO,
            deposit: U256::ZERO,
            lpb: U256::ZERO,
            lends: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lend {
    pub id: EntityId,
    pub bucket: EntityId,
    pub pool: Address,
    pub lender: Address,
    pub bucket_index: u32,
    #[serde(with = "wad")]
    pub lpb: U256,
    #[serde(with = "wad")]
    pub lpb_value_in_quote: U256,
    pub deposit_time: u64,
}
entity!(Lend, "Lend");

impl Lend {
    pub fn new(bucket: &Bucket, lender: Address) -> Self {
        Self {
            id: ids::lend_id(&bucket.id, lender),
            bucket: bucket.id.clone(),
            pool: bucket.pool,
            lender,
            bucket_index: bucket.index,
            lpb: U256::ZERO,
            lpb_value_in_quote: U256::ZERO,
            deposit_time: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: EntityId,
    pub pool: Address,
    pub borrower: Address,
    #[serde(with = "wad")]
    pub collateral_pledged: U256,
    #[serde(with = "wad")]
    pub t0debt: U256,
    #[serde(with = "wad")]
    pub threshold_price: U256,
    #[serde(with = "wad")]
    pub t0_neutral_price: U256,
    pub in_liquidation: bool,
    pub liquidation_auction: Option<EntityId>,
    /// NFT collateral pledged by this borrower, in pledge order
    pub token_ids_pledged: Vec<U256>,
}
entity!(Loan, "Loan");

impl Loan {
    pub fn new(pool: Address, borrower: Address) -> Self {
        Self {
            id: ids::loan_id(pool, borrower),
            pool,
            borrower,
            collateral_pledged: U256::ZERO,
            t0debt: U256::ZERO,
            threshold_price: U256::ZERO,
            t0_neutral_price: U256::ZERO,
            in_liquidation: false,
            liquidation_auction: None,
            token_ids_pledged: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityId,
    pub address: Address,
    pub pools: Vec<EntityId>,
    pub lends: Vec<EntityId>,
    pub loans: Vec<EntityId>,
    pub kicks: Vec<EntityId>,
    pub takes: Vec<EntityId>,
    pub settles: Vec<EntityId>,
    pub reserve_auctions: Vec<EntityId>,
    pub tx_count: u64,
}
entity!(Account, "Account");

impl Account {
    pub fn new(address: Address) -> Self {
        Self {
            id: ids::address_id(address),
            address,
            pools: Vec::new(),
            lends: Vec::new(),
            loans: Vec::new(),
            kicks: Vec::new(),
            takes: Vec::new(),
            settles: Vec::new(),
            reserve_auctions: Vec::new(),
            tx_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationAuction {
    pub id: EntityId,
    pub pool: Address,
    pub loan: EntityId,
    pub borrower: Address,
    pub kicker: Address,
    pub kick_block: u64,
    pub kick_time: u64,
    #[serde(with = "wad")]
    pub bond_size: U256,
    #[serde(with = "wad")]
    pub bond_factor: U256,
    #[serde(with = "wad")]
    pub neutral_price: U256,
    #[serde(with = "wad")]
    pub reference_price: U256,
    #[serde(with = "wad")]
    pub debt_to_collateral: U256,
    #[serde(with = "wad")]
    pub debt_remaining: U256,
    #[serde(with = "wad")]
    pub collateral_remaining: U256,
    #[serde(with = "wad")]
    pub auction_price: U256,
    #[serde(with = "wad")]
    pub last_take_price: U256,
    pub settled: bool,
    pub settle_time: Option<u64>,
    pub kick: EntityId,
    pub takes: Vec<EntityId>,
    pub bucket_takes: Vec<EntityId>,
    pub settles: Vec<EntityId>,
    pub auction_settle: Option<EntityId>,
}
entity!(LiquidationAuction, "LiquidationAuction");

impl LiquidationAuction {
    pub fn new(loan: &Loan, kick: EntityId, kick_block: u64) -> Self {
        Self {
            id: ids::auction_id(loan.pool, &loan.id, kick_block),
            pool: loan.pool,
            loan: loan.id.clone(),
            borrower: loan.borrower,
            kicker: Address::ZERO,
            kick_block,
            kick_time: 0,
            bond_size: U256::ZERO,
            bond_factor: U256::ZERO,
            neutral_price: U256::ZERO,
            reference_price: U256::ZERO,
            debt_to_collateral: U256::ZERO,
            debt_remaining: U256::ZERO,
            collateral_remaining: U256::ZERO,
            auction_price: U256::ZERO,
            last_take_price: U256::ZERO,
            settled: false,
            settle_time: None,
            kick,
            takes: Vec::new(),
            bucket_takes: Vec::new(),
            settles: Vec::new(),
            auction_settle: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kick {
    pub id: EntityId,
    pub pool: Address,
    pub borrower: Address,
    pub kicker: Address,
    pub loan: EntityId,
    pub auction: EntityId,
    #[serde(with = "wad")]
    pub debt: U256,
    #[serde(with = "wad")]
    pub collateral: U256,
    #[serde(with = "wad")]
    pub bond: U256,
    /// Bond still locked by the kicker, adjusted by takes
    #[serde(with = "wad")]
    pub locked: U256,
    #[serde(with = "wad")]
    pub claimable: U256,
    #[serde(with = "wad")]
    pub starting_price: U256,
    pub at: Provenance,
}
entity!(Kick, "Kick");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Take {
    pub id: EntityId,
    pub pool: Address,
    pub taker: Address,
    pub borrower: Address,
    pub loan: EntityId,
    pub auction: EntityId,
    #[serde(with = "wad")]
    pub amount: U256,
    #[serde(with = "wad")]
    pub collateral: U256,
    #[serde(with = "wad")]
    pub bond_change: U256,
    pub is_reward: bool,
    #[serde(with = "wad")]
    pub auction_price: U256,
    pub at: Provenance,
}
entity!(Take, "Take");

/// LP awarded by a bucket take, staged until the take itself is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTakeLpAward {
    /// Keyed by the log index the companion BucketTake is expected at
    pub id: EntityId,
    pub pool: Address,
    pub taker: Address,
    pub kicker: Address,
    #[serde(with = "wad")]
    pub lp_awarded_taker: U256,
    #[serde(with = "wad")]
    pub lp_awarded_kicker: U256,
}
entity!(BucketTakeLpAward, "BucketTakeLPAward");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTake {
    pub id: EntityId,
    pub pool: Address,
    pub taker: Address,
    pub kicker: Address,
    pub borrower: Address,
    pub loan: EntityId,
    pub auction: EntityId,
    pub index: u32,
    #[serde(with = "wad")]
    pub amount: U256,
    #[serde(with = "wad")]
    pub collateral: U256,
    #[serde(with = "wad")]
    pub bond_change: U256,
    pub is_reward: bool,
    #[serde(with = "wad")]
    pub auction_price: U256,
    #[serde(with = "wad")]
    pub lp_awarded_taker: U256,
    #[serde(with = "wad")]
    pub lp_awarded_kicker: U256,
    pub at: Provenance,
}
entity!(BucketTake, "BucketTake");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settle {
    pub id: EntityId,
    pub pool: Address,
    pub settler: Address,
    pub borrower: Address,
    pub loan: EntityId,
    pub auction: EntityId,
    #[serde(with = "wad")]
    pub settled_debt: U256,
    pub at: Provenance,
}
entity!(Settle, "Settle");

/// `AuctionSettle` (fungible) or `AuctionNFTSettle` (NFT, with LP award).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSettle {
    pub id: EntityId,
    pub pool: Address,
    pub borrower: Address,
    pub loan: EntityId,
    pub auction: EntityId,
    #[serde(with = "wad")]
    pub collateral: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_award: Option<NftSettleAward>,
    pub at: Provenance,
}
entity!(AuctionSettle, "AuctionSettle");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftSettleAward {
    #[serde(with = "wad")]
    pub lp: U256,
    pub index: u32,
}

/// One burn epoch of a reserve auction, aggregating its kick and takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveAuctionProcess {
    pub id: EntityId,
    pub pool: Address,
    pub burn_epoch: U256,
    pub kicker: Address,
    pub kick_time: u64,
    #[serde(with = "wad")]
    pub claimable_reserves: U256,
    #[serde(with = "wad")]
    pub kicker_reward: U256,
    /// Pool's cumulative burn when the last leg was recorded
    #[serde(with = "wad")]
    pub total_burned_at_last_leg: U256,
    #[serde(with = "wad")]
    pub ajna_burned_across_all_takes: U256,
    pub legs: Vec<EntityId>,
}
entity!(ReserveAuctionProcess, "ReserveAuctionProcess");

impl ReserveAuctionProcess {
    pub fn new(pool: Address, burn_epoch: U256) -> Self {
        Self {
            id: ids::reserve_process_id(pool, burn_epoch),
            pool,
            burn_epoch,
            kicker: Address::ZERO,
            kick_time: 0,
            claimable_reserves: U256::ZERO,
            kicker_reward: U256::ZERO,
            total_burned_at_last_leg: U256::ZERO,
            ajna_burned_across_all_takes: U256::ZERO,
            legs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveLegKind {
    Kick,
    Take,
}

/// Immutable kick or take leg of a reserve auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveAuction {
    pub id: EntityId,
    pub process: EntityId,
    pub pool: Address,
    pub kind: ReserveLegKind,
    pub actor: Address,
    pub burn_epoch: U256,
    #[serde(with = "wad")]
    pub claimable_reserves_remaining: U256,
    #[serde(with = "wad")]
    pub auction_price: U256,
    #[serde(with = "wad")]
    pub incremental_ajna_burned: U256,
    pub at: Provenance,
}
entity!(ReserveAuction, "ReserveAuction");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpAllowanceList {
    pub id: EntityId,
    pub pool: Address,
    pub owner: Address,
    pub spender: Address,
    pub allowances: Vec<EntityId>,
}
entity!(LpAllowanceList, "LPAllowanceList");

impl LpAllowanceList {
    pub fn new(pool: Address, owner: Address, spender: Address) -> Self {
        Self {
            id: ids::allowance_list_id(pool, owner, spender),
            pool,
            owner,
            spender,
            allowances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpAllowance {
    pub id: EntityId,
    pub list: EntityId,
    pub index: u32,
    #[serde(with = "wad")]
    pub amount: U256,
}
entity!(LpAllowance, "LPAllowance");

impl LpAllowance {
    pub fn new(list: &EntityId, index: u32) -> Self {
        Self {
            id: ids::allowance_id(list, index),
            list: list.clone(),
            index,
            amount: U256::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpTransferorList {
    pub id: EntityId,
    pub pool: Address,
    pub lender: Address,
    pub transferors: Vec<Address>,
}
entity!(LpTransferorList, "LPTransferorList");

impl LpTransferorList {
    pub fn new(pool: Address, lender: Address) -> Self {
        Self {
            id: ids::transferor_list_id(pool, lender),
            pool,
            lender,
            transferors: Vec::new(),
        }
    }
}

/// Immutable activity record for every handled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EntityId,
    pub name: String,
    pub pool: Address,
    pub tx_from: Address,
    pub payload: PoolEventKind,
    pub at: Provenance,
}
entity!(EventRecord, "EventRecord");

impl EventRecord {
    pub fn new(meta: &EventMeta, kind: &PoolEventKind) -> Self {
        Self {
            id: ids::event_id(meta.tx_hash, meta.log_index),
            name: kind.name().to_string(),
            pool: meta.address,
            tx_from: meta.tx_from,
            payload: kind.clone(),
            at: Provenance::from(meta),
        }
    }
}

/// Recoverable inconsistencies observed while indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Diagnostic {
    /// A redemption claimed more LP than tracked; the balance was clamped to zero.
    LpDrift {
        lend: EntityId,
        pool: Address,
        index: u32,
        lender: Address,
        #[serde(with = "wad")]
        tracked: U256,
        #[serde(with = "wad")]
        redeemed: U256,
        at: Provenance,
    },
    /// Tracked LP differs from `lenderInfo`.
    LpMismatch {
        lend: EntityId,
        pool: Address,
        index: u32,
        lender: Address,
        #[serde(with = "wad")]
        tracked: U256,
        #[serde(with = "wad")]
        on_chain: U256,
        at: Provenance,
    },
    /// NFT token ids breaking the loan / pool / bucket partition.
    NftPartition {
        pool: Address,
        /// Found in more than one of the partitioned sets
        overlapping: Vec<U256>,
        /// Pledged at pool level but by no loan, or the reverse
        #[serde(default)]
        unmatched: Vec<U256>,
        at: Provenance,
    },
}

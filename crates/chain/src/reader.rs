//! Chain-state read facade.
//!
//! Handlers never talk to a provider directly. They go through
//! [`ChainStateReader`], which returns typed snapshots of pool and token
//! state at the block pinned with [`ChainStateReader::pin_block`].
//!
//! A call that reverts is not an error: the implementation substitutes the
//! snapshot's `Default` (zero amounts, 18 decimals, "unknown" / "N/A"
//! strings) and logs a warning. Only transport failures reach the caller.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimals assumed for a token whose `decimals()` reverts.
pub const DEFAULT_DECIMALS: u8 = 18;
/// Name recorded for a token whose `name()` reverts.
pub const UNKNOWN_NAME: &str = "unknown";
/// Symbol recorded for a token whose `symbol()` reverts.
pub const UNKNOWN_SYMBOL: &str = "N/A";

/// Read failure that could not be defaulted.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("transport error calling {call} on {target}: {message}")]
    Transport {
        call: &'static str,
        target: Address,
        message: String,
    },
    #[error("invalid rpc url {0}")]
    InvalidUrl(String),
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// `bucketInfo(pool, index)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub price: U256,
    pub quote_tokens: U256,
    pub collateral: U256,
    pub bucket_lp: U256,
    pub scale: U256,
    pub exchange_rate: U256,
}

/// `lenderInfo(pool, index, lender)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LenderInfo {
    pub lp_balance: U256,
    pub deposit_time: U256,
}

/// Borrower state, merged from the pool and the info helper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerInfo {
    /// Current debt including accrued interest
    pub debt: U256,
    pub t0_debt: U256,
    pub collateral: U256,
    /// Neutral price at t0
    pub t0_neutral_price: U256,
    pub threshold_price: U256,
    pub np_tp_ratio: U256,
}

/// `auctionInfo(pool, borrower)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionInfo {
    pub kicker: Address,
    pub bond_factor: U256,
    pub bond_size: U256,
    pub kick_time: U256,
    pub reference_price: U256,
    pub neutral_price: U256,
    pub debt_to_collateral: U256,
    /// Kicked-loan queue pointers
    pub head: Address,
    pub next: Address,
    pub prev: Address,
}

/// `auctionStatus(pool, borrower)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionStatus {
    pub kick_time: U256,
    pub collateral: U256,
    pub debt_to_cover: U256,
    pub is_collateralized: bool,
    pub price: U256,
    pub neutral_price: U256,
    pub reference_price: U256,
    pub debt_to_collateral: U256,
    pub bond_factor: U256,
}

/// `kickerInfo(pool, kicker)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickerInfo {
    pub claimable: U256,
    pub locked: U256,
}

/// `debtInfo(pool)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtInfo {
    pub debt: U256,
    pub accrued_debt: U256,
    pub debt_in_auction: U256,
    pub t0_debt2_to_collateral: U256,
}

/// `poolLoansInfo(pool)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoansInfo {
    pub pool_size: U256,
    pub loans_count: u64,
    pub max_borrower: Address,
    pub pending_inflator: U256,
    pub pending_interest_factor: U256,
}

/// `poolPricesInfo(pool)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricesInfo {
    pub hpb: U256,
    pub hpb_index: u32,
    pub htp: U256,
    pub htp_index: u32,
    pub lup: U256,
    pub lup_index: u32,
}

/// `poolReservesInfo(pool)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservesInfo {
    pub reserves: U256,
    pub claimable_reserves: U256,
    pub claimable_reserves_remaining: U256,
    pub auction_price: U256,
    pub time_remaining: U256,
}

/// `poolUtilizationInfo(pool)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationInfo {
    pub min_debt_amount: U256,
    pub collateralization: U256,
    pub actual_utilization: U256,
    pub target_utilization: U256,
}

/// Interest and fee rates of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatesInfo {
    pub interest_rate: U256,
    pub interest_rate_update: U256,
    pub borrow_fee_rate: U256,
    pub deposit_fee_rate: U256,
    pub lender_interest_margin: U256,
}

/// `burnInfo(pool, epoch)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnInfo {
    pub timestamp: U256,
    pub total_interest: U256,
    pub total_burned: U256,
}

/// ERC-20 / ERC-721 metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

impl Default for TokenInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            symbol: UNKNOWN_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
            total_supply: U256::ZERO,
        }
    }
}

/// Token pair a pool was deployed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTokens {
    pub collateral: Address,
    pub quote: Address,
}

/// Read surface used by the event handlers.
///
/// Every method reads at the pinned block. Implementations must default
/// reverted calls and only fail on transport errors.
#[async_trait]
pub trait ChainStateReader: Send + Sync {
    /// Pin subsequent reads to `block`.
    fn pin_block(&self, block: u64);

    async fn bucket_info(&self, pool: Address, index: u32) -> Result<BucketInfo, ReadError>;

    async fn lender_info(
        &self,
        pool: Address,
        index: u32,
        lender: Address,
    ) -> Result<LenderInfo, ReadError>;

    /// Quote value of `lp` shares in bucket `index`.
    async fn lp_to_quote_tokens(
        &self,
        pool: Address,
        lp: U256,
        index: u32,
    ) -> Result<U256, ReadError>;

    async fn borrower_info(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<BorrowerInfo, ReadError>;

    async fn auction_info(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<AuctionInfo, ReadError>;

    async fn auction_status(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<AuctionStatus, ReadError>;

    async fn kicker_info(&self, pool: Address, kicker: Address) -> Result<KickerInfo, ReadError>;

    async fn debt_info(&self, pool: Address) -> Result<DebtInfo, ReadError>;

    async fn loans_info(&self, pool: Address) -> Result<LoansInfo, ReadError>;

    async fn prices_info(&self, pool: Address) -> Result<PricesInfo, ReadError>;

    async fn reserves_info(&self, pool: Address) -> Result<ReservesInfo, ReadError>;

    async fn utilization_info(&self, pool: Address) -> Result<UtilizationInfo, ReadError>;

    async fn rates_info(&self, pool: Address) -> Result<RatesInfo, ReadError>;

    async fn pledged_collateral(&self, pool: Address) -> Result<U256, ReadError>;

    async fn current_burn_epoch(&self, pool: Address) -> Result<U256, ReadError>;

    async fn burn_info(&self, pool: Address, epoch: U256) -> Result<BurnInfo, ReadError>;

    /// Collateral and quote token addresses of a deployed pool.
    async fn pool_tokens(&self, pool: Address) -> Result<PoolTokens, ReadError>;

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ReadError>;

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ReadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_defaults() {
        let info = TokenInfo::default();
        assert_eq!(info.name, "unknown");
        assert_eq!(info.symbol, "N/A");
        assert_eq!(info.decimals, 18);
        assert_eq!(info.total_supply, U256::ZERO);
    }

    #[test]
    fn test_snapshot_defaults_are_zero() {
        assert_eq!(BucketInfo::default().exchange_rate, U256::ZERO);
        assert_eq!(AuctionInfo::default().kicker, Address::ZERO);
        assert!(!AuctionStatus::default().is_collateralized);
    }
}

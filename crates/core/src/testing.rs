//! In-memory [`ChainStateReader`] and event fixtures for handler tests.
//!
//! Every snapshot defaults to its `Default` until set, the same value a
//! reverted call produces against a live node.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use indexer_chain::{
    AuctionInfo, AuctionStatus, BorrowerInfo, BucketInfo, BurnInfo, ChainStateReader, DebtInfo,
    EventMeta, KickerInfo, LenderInfo, LoansInfo, PoolTokens, PricesInfo, RatesInfo, ReadError,
    ReservesInfo, TokenInfo, UtilizationInfo,
};

/// Pool address used by [`meta`].
pub const POOL: Address = Address::repeat_byte(0xaa);
/// Transaction origin used by [`meta`].
pub const TX_FROM: Address = Address::repeat_byte(0xee);

/// Event position in [`POOL`]; the transaction hash is derived from the block,
/// so logs of one block share a transaction.
pub fn meta(block: u64, log_index: u64) -> EventMeta {
    meta_at(POOL, block, log_index)
}

pub fn meta_at(address: Address, block: u64, log_index: u64) -> EventMeta {
    EventMeta {
        address,
        block_number: block,
        block_timestamp: 1_700_000_000 + block * 12,
        tx_hash: B256::from(U256::from(block)),
        tx_index: 0,
        log_index,
        tx_from: TX_FROM,
        tx_input: None,
    }
}

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

#[derive(Default)]
pub struct MockReader {
    pinned: AtomicU64,
    buckets: DashMap<(Address, u32), BucketInfo>,
    lenders: DashMap<(Address, u32, Address), LenderInfo>,
    lp_values: DashMap<(Address, u32), U256>,
    borrowers: DashMap<(Address, Address), BorrowerInfo>,
    auctions: DashMap<(Address, Address), AuctionInfo>,
    statuses: DashMap<(Address, Address), AuctionStatus>,
    kickers: DashMap<(Address, Address), KickerInfo>,
    debt: DashMap<Address, DebtInfo>,
    loans: DashMap<Address, LoansInfo>,
    prices: DashMap<Address, PricesInfo>,
    reserves: DashMap<Address, ReservesInfo>,
    utilization: DashMap<Address, UtilizationInfo>,
    rates: DashMap<Address, RatesInfo>,
    pledged: DashMap<Address, U256>,
    burn_epochs: DashMap<Address, U256>,
    burns: DashMap<(Address, U256), BurnInfo>,
    pool_tokens: DashMap<Address, PoolTokens>,
    tokens: DashMap<Address, TokenInfo>,
    balances: DashMap<(Address, Address), U256>,
}

fn read<K, V>(map: &DashMap<K, V>, key: &K) -> V
where
    K: std::hash::Hash + Eq,
    V: Clone + Default,
{
    map.get(key).map(|v| v.value().clone()).unwrap_or_default()
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pinned_block(&self) -> u64 {
        self.pinned.load(Ordering::SeqCst)
    }

    pub fn set_bucket_info(&self, pool: Address, index: u32, info: BucketInfo) {
        self.buckets.insert((pool, index), info);
    }

    pub fn set_lender_info(&self, pool: Address, index: u32, lender: Address, info: LenderInfo) {
        self.lenders.insert((pool, index, lender), info);
    }

    /// Fixed quote value returned for any LP amount in bucket `index`.
    /// Unset buckets convert 1:1.
    pub fn set_lp_value(&self, pool: Address, index: u32, value: U256) {
        self.lp_values.insert((pool, index), value);
    }

    pub fn set_borrower_info(&self, pool: Address, borrower: Address, info: BorrowerInfo) {
        self.borrowers.insert((pool, borrower), info);
    }

    pub fn set_auction_info(&self, pool: Address, borrower: Address, info: AuctionInfo) {
        self.auctions.insert((pool, borrower), info);
    }

    pub fn set_auction_status(&self, pool: Address, borrower: Address, status: AuctionStatus) {
        self.statuses.insert((pool, borrower), status);
    }

    pub fn set_kicker_info(&self, pool: Address, kicker: Address, info: KickerInfo) {
        self.kickers.insert((pool, kicker), info);
    }

    pub fn set_debt_info(&self, pool: Address, info: DebtInfo) {
        self.debt.insert(pool, info);
    }

    pub fn set_loans_info(&self, pool: Address, info: LoansInfo) {
        self.loans.insert(pool, info);
    }

    pub fn set_prices_info(&self, pool: Address, info: PricesInfo) {
        self.prices.insert(pool, info);
    }

    pub fn set_reserves_info(&self, pool: Address, info: ReservesInfo) {
        self.reserves.insert(pool, info);
    }

    pub fn set_utilization_info(&self, pool: Address, info: UtilizationInfo) {
        self.utilization.insert(pool, info);
    }

    pub fn set_rates_info(&self, pool: Address, info: RatesInfo) {
        self.rates.insert(pool, info);
    }

    pub fn set_pledged_collateral(&self, pool: Address, amount: U256) {
        self.pledged.insert(pool, amount);
    }

    pub fn set_current_burn_epoch(&self, pool: Address, epoch: U256) {
        self.burn_epochs.insert(pool, epoch);
    }

    pub fn set_burn_info(&self, pool: Address, epoch: U256, info: BurnInfo) {
        self.burns.insert((pool, epoch), info);
    }

    pub fn set_pool_tokens(&self, pool: Address, tokens: PoolTokens) {
        self.pool_tokens.insert(pool, tokens);
    }

    pub fn set_token_info(&self, token: Address, info: TokenInfo) {
        self.tokens.insert(token, info);
    }

    pub fn set_token_balance(&self, token: Address, holder: Address, amount: U256) {
        self.balances.insert((token, holder), amount);
    }
}

#[async_trait]
impl ChainStateReader for MockReader {
    fn pin_block(&self, block: u64) {
        self.pinned.store(block, Ordering::SeqCst);
    }

    async fn bucket_info(&self, pool: Address, index: u32) -> Result<BucketInfo, ReadError> {
        Ok(read(&self.buckets, &(pool, index)))
    }

    async fn lender_info(
        &self,
        pool: Address,
        index: u32,
        lender: Address,
    ) -> Result<LenderInfo, ReadError> {
        Ok(read(&self.lenders, &(pool, index, lender)))
    }

    async fn lp_to_quote_tokens(
        &self,
        pool: Address,
        lp: U256,
        index: u32,
    ) -> Result<U256, ReadError> {
        Ok(self
            .lp_values
            .get(&(pool, index))
            .map(|v| *v.value())
            .unwrap_or(lp))
    }

    async fn borrower_info(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<BorrowerInfo, ReadError> {
        Ok(read(&self.borrowers, &(pool, borrower)))
    }

    async fn auction_info(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<AuctionInfo, ReadError> {
        Ok(read(&self.auctions, &(pool, borrower)))
    }

    async fn auction_status(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<AuctionStatus, ReadError> {
        Ok(read(&self.statuses, &(pool, borrower)))
    }

    async fn kicker_info(&self, pool: Address, kicker: Address) -> Result<KickerInfo, ReadError> {
        Ok(read(&self.kickers, &(pool, kicker)))
    }

    async fn debt_info(&self, pool: Address) -> Result<DebtInfo, ReadError> {
        Ok(read(&self.debt, &pool))
    }

    async fn loans_info(&self, pool: Address) -> Result<LoansInfo, ReadError> {
        Ok(read(&self.loans, &pool))
    }

    async fn prices_info(&self, pool: Address) -> Result<PricesInfo, ReadError> {
        Ok(read(&self.prices, &pool))
    }

    async fn reserves_info(&self, pool: Address) -> Result<ReservesInfo, ReadError> {
        Ok(read(&self.reserves, &pool))
    }

    async fn utilization_info(&self, pool: Address) -> Result<UtilizationInfo, ReadError> {
        Ok(read(&self.utilization, &pool))
    }

    async fn rates_info(&self, pool: Address) -> Result<RatesInfo, ReadError> {
        Ok(read(&self.rates, &pool))
    }

    async fn pledged_collateral(&self, pool: Address) -> Result<U256, ReadError> {
        Ok(read(&self.pledged, &pool))
    }

    async fn current_burn_epoch(&self, pool: Address) -> Result<U256, ReadError> {
        Ok(read(&self.burn_epochs, &pool))
    }

    async fn burn_info(&self, pool: Address, epoch: U256) -> Result<BurnInfo, ReadError> {
        Ok(read(&self.burns, &(pool, epoch)))
    }

    async fn pool_tokens(&self, pool: Address) -> Result<PoolTokens, ReadError> {
        Ok(read(&self.pool_tokens, &pool))
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ReadError> {
        Ok(read(&self.tokens, &token))
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ReadError> {
        Ok(read(&self.balances, &(token, holder)))
    }
}

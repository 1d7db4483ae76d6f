//! Pool lifecycle and aggregate resync.

use alloy::primitives::{Address, U256};
use indexer_chain::{ChainStateReader, EventMeta, PoolKind};
use tracing::{debug, info};

use crate::error::{IndexerError, Result};
use crate::ids::address_id;
use crate::ledger::token;
use crate::math::{scale_to_wad, wdiv, wmul};
use crate::store::{NftSubKind, Pool, Store};

/// Pool that must already be indexed.
pub fn load_pool(store: &Store, address: Address) -> Result<Pool> {
    let id = address_id(address);
    store
        .pools
        .load(&id)
        .ok_or_else(|| IndexerError::missing::<Pool>(&id))
}

/// Decimals of an indexed token, 18 if unknown.
pub(crate) fn decimals_of(store: &Store, token: Address) -> u8 {
    store
        .tokens
        .get(&address_id(token))
        .map(|t| t.decimals)
        .unwrap_or(indexer_chain::reader::DEFAULT_DECIMALS)
}

/// `borrowRate × lenderInterestMargin × utilization`
pub fn lend_rate(borrow_rate: U256, lender_interest_margin: U256, utilization: U256) -> U256 {
    wmul(wmul(borrow_rate, lender_interest_margin), utilization)
}

/// Overwrite every pool-wide field from chain state.
///
/// Handlers call this first and then apply only what the chain cannot
/// report, such as the transaction counter.
pub async fn update_pool<R: ChainStateReader + ?Sized>(
    pool: &mut Pool,
    store: &Store,
    reader: &R,
) -> Result<()> {
    let address = pool.address;

    let loans = reader.loans_info(address).await?;
    pool.pool_size = loans.pool_size;
    pool.loans_count = loans.loans_count;
    pool.max_borrower = loans.max_borrower;
    pool.inflator = loans.pending_inflator;

    let prices = reader.prices_info(address).await?;
    pool.hpb = prices.hpb;
    pool.hpb_index = prices.hpb_index;
    pool.htp = prices.htp;
    pool.htp_index = prices.htp_index;
    pool.lup = prices.lup;
    pool.lup_index = prices.lup_index;

    let reserves = reader.reserves_info(address).await?;
    pool.reserves = reserves.reserves;
    pool.claimable_reserves = reserves.claimable_reserves;
    pool.claimable_reserves_remaining = reserves.claimable_reserves_remaining;
    pool.reserve_auction_price = reserves.auction_price;
    pool.reserve_auction_time_remaining =
        u64::try_from(reserves.time_remaining).unwrap_or(u64::MAX);

    let utilization = reader.utilization_info(address).await?;
    pool.min_debt_amount = utilization.min_debt_amount;
    pool.collateralization = utilization.collateralization;
    pool.actual_utilization = utilization.actual_utilization;
    pool.target_utilization = utilization.target_utilization;

    let debt = reader.debt_info(address).await?;
    pool.current_debt = debt.debt;
    pool.debt_in_auction = debt.debt_in_auction;
    pool.t0debt = wdiv(debt.debt, pool.inflator);

    let rates = reader.rates_info(address).await?;
    pool.interest_rate = rates.interest_rate;
    pool.borrow_rate = rates.interest_rate;
    pool.borrow_fee_rate = rates.borrow_fee_rate;
    pool.deposit_fee_rate = rates.deposit_fee_rate;
    pool.lender_interest_margin = rates.lender_interest_margin;
    pool.lend_rate = lend_rate(
        pool.borrow_rate,
        pool.lender_interest_margin,
        pool.actual_utilization,
    );

    pool.pledged_collateral = reader.pledged_collateral(address).await?;
    pool.current_burn_epoch = reader.current_burn_epoch(address).await?;

    let quote_balance = reader.token_balance(pool.quote_token, address).await?;
    pool.quote_token_balance = scale_to_wad(quote_balance, decimals_of(store, pool.quote_token));
    let collateral_balance = reader.token_balance(pool.collateral_token, address).await?;
    pool.collateral_balance = scale_to_wad(
        collateral_balance,
        decimals_of(store, pool.collateral_token),
    );

    debug!(
        pool = %address,
        pool_size = %pool.pool_size,
        t0debt = %pool.t0debt,
        lup_index = pool.lup_index,
        "Pool resynced"
    );
    Ok(())
}

/// Count one handled transaction against the pool and its tokens.
pub fn count_tx(store: &mut Store, pool: &mut Pool) {
    pool.tx_count += 1;
    for token in [pool.quote_token, pool.collateral_token] {
        if let Some(mut t) = store.tokens.load(&address_id(token)) {
            t.tx_count += 1;
            store.tokens.save(t);
        }
    }
}

/// Parameters a new pool is created with.
#[derive(Debug, Clone)]
pub struct NewPool {
    pub address: Address,
    pub kind: PoolKind,
    pub collateral: Address,
    pub quote: Address,
    pub subset_hash: alloy::primitives::B256,
    pub token_ids_allowed: Vec<U256>,
}

/// Create a pool record with its tokens and an initial resync.
///
/// Returns `false` without touching the store if the pool already exists.
pub async fn create_pool<R: ChainStateReader + ?Sized>(
    store: &mut Store,
    reader: &R,
    params: NewPool,
    meta: &EventMeta,
) -> Result<bool> {
    let id = address_id(params.address);
    if store.pools.contains(&id) {
        debug!(pool = %params.address, "Pool already indexed");
        return Ok(false);
    }

    let is_nft = params.kind == PoolKind::Erc721;
    token::link_token(store, reader, params.collateral, is_nft).await?;
    token::link_token(store, reader, params.quote, false).await?;

    let mut pool = Pool::new(params.address, params.kind, meta);
    pool.collateral_token = params.collateral;
    pool.quote_token = params.quote;
    pool.subset_hash = params.subset_hash;
    if is_nft {
        pool.nft_sub_kind = Some(if params.token_ids_allowed.is_empty() {
            NftSubKind::Collection
        } else {
            NftSubKind::Subset
        });
    }
    pool.token_ids_allowed = params.token_ids_allowed;

    update_pool(&mut pool, store, reader).await?;

    info!(
        pool = %pool.address,
        kind = pool.kind.as_str(),
        collateral = %pool.collateral_token,
        quote = %pool.quote_token,
        "Pool created"
    );
    store.pools.save(pool);
    Ok(true)
}

/// Index a configured pool that predates the indexed range.
pub async fn bootstrap_pool<R: ChainStateReader + ?Sized>(
    store: &mut Store,
    reader: &R,
    address: Address,
    kind: PoolKind,
    meta: &EventMeta,
) -> Result<bool> {
    let tokens = reader.pool_tokens(address).await?;
    let subset_hash = match kind {
        PoolKind::Erc20 => indexer_chain::contracts::erc20_non_subset_hash(),
        PoolKind::Erc721 => indexer_chain::contracts::erc721_non_subset_hash(),
    };
    create_pool(
        store,
        reader,
        NewPool {
            address,
            kind,
            collateral: tokens.collateral,
            quote: tokens.quote,
            subset_hash,
            token_ids_allowed: Vec::new(),
        },
        meta,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WAD;
    use crate::testing::{meta, MockReader};
    use indexer_chain::{DebtInfo, LoansInfo, PricesInfo, RatesInfo, ReservesInfo, UtilizationInfo};

    #[test]
    fn test_lend_rate() {
        // 10% borrow rate, 85% margin, 50% utilization
        let rate = WAD / U256::from(10u64);
        let margin = WAD * U256::from(85u64) / U256::from(100u64);
        let utilization = WAD / U256::from(2u64);

        let expected = WAD * U256::from(425u64) / U256::from(10_000u64);
        assert_eq!(lend_rate(rate, margin, utilization), expected);
    }

    #[tokio::test]
    async fn test_update_pool_overwrites_from_reader() {
        let reader = MockReader::new();
        let pool_addr = Address::repeat_byte(0xaa);
        let mut store = Store::new();
        let mut pool = Pool::new(pool_addr, PoolKind::Erc20, &meta(1, 0));
        pool.pool_size = U256::from(999u64);

        reader.set_loans_info(
            pool_addr,
            LoansInfo {
                pool_size: U256::from(5u64) * WAD,
                loans_count: 2,
                pending_inflator: WAD * U256::from(2u64),
                ..Default::default()
            },
        );
        reader.set_debt_info(
            pool_addr,
            DebtInfo {
                debt: WAD * U256::from(10u64),
                ..Default::default()
            },
        );
        reader.set_rates_info(
            pool_addr,
            RatesInfo {
                interest_rate: WAD / U256::from(10u64),
                lender_interest_margin: WAD,
                ..Default::default()
            },
        );
        reader.set_utilization_info(
            pool_addr,
            UtilizationInfo {
                actual_utilization: WAD,
                ..Default::default()
            },
        );

        update_pool(&mut pool, &store, &reader).await.unwrap();

        assert_eq!(pool.pool_size, U256::from(5u64) * WAD);
        assert_eq!(pool.loans_count, 2);
        assert_eq!(pool.t0debt, WAD * U256::from(5u64));
        assert_eq!(pool.lend_rate, WAD / U256::from(10u64));

        count_tx(&mut store, &mut pool);
        assert_eq!(pool.tx_count, 1);
    }

    #[tokio::test]
    async fn test_update_pool_reads_markers_and_balances() {
        let reader = MockReader::new();
        let pool_addr = Address::repeat_byte(0xaa);
        let quote = Address::repeat_byte(0x01);
        let store = Store::new();
        let mut pool = Pool::new(pool_addr, PoolKind::Erc20, &meta(1, 0));
        pool.quote_token = quote;

        reader.set_prices_info(
            pool_addr,
            PricesInfo {
                hpb: WAD * U256::from(3u64),
                hpb_index: 4000,
                lup: WAD * U256::from(2u64),
                lup_index: 4100,
                ..Default::default()
            },
        );
        reader.set_reserves_info(
            pool_addr,
            ReservesInfo {
                reserves: WAD,
                claimable_reserves_remaining: WAD / U256::from(2u64),
                time_remaining: U256::from(3600u64),
                ..Default::default()
            },
        );
        reader.set_pledged_collateral(pool_addr, WAD * U256::from(4u64));
        reader.set_current_burn_epoch(pool_addr, U256::from(3u64));
        reader.set_token_balance(quote, pool_addr, WAD * U256::from(7u64));

        update_pool(&mut pool, &store, &reader).await.unwrap();

        assert_eq!(pool.hpb_index, 4000);
        assert_eq!(pool.lup, WAD * U256::from(2u64));
        assert_eq!(pool.reserves, WAD);
        assert_eq!(pool.reserve_auction_time_remaining, 3600);
        assert_eq!(pool.pledged_collateral, WAD * U256::from(4u64));
        assert_eq!(pool.current_burn_epoch, U256::from(3u64));
        assert_eq!(pool.quote_token_balance, WAD * U256::from(7u64));
    }
}

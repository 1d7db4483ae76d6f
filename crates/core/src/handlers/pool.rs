//! Pool lifecycle handlers.

use alloy::primitives::{Address, B256, U256};
use indexer_chain::{decode_deploy_pool, ChainStateReader, DecodeError};
use tracing::{debug, warn};

use super::HandlerCtx;
use crate::error::Result;
use crate::ledger::pool::{create_pool, decimals_of, lend_rate, NewPool};
use crate::math::scale_to_wad;

/// `PoolCreated` from either factory. The token pair is only in the
/// deployment calldata.
pub async fn pool_created<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    pool: Address,
    subset_hash: B256,
) -> Result<()> {
    let input = ctx
        .meta
        .tx_input
        .as_ref()
        .ok_or(DecodeError::MissingInput("PoolCreated"))?;
    let deploy = decode_deploy_pool(input, subset_hash)?;
    debug!(
        pool = %pool,
        factory = %ctx.meta.address,
        kind = deploy.kind.as_str(),
        subset_ids = deploy.token_ids.len(),
        "Decoded pool deployment"
    );

    create_pool(
        ctx.store,
        ctx.reader,
        NewPool {
            address: pool,
            kind: deploy.kind,
            collateral: deploy.collateral,
            quote: deploy.quote,
            subset_hash,
            token_ids_allowed: deploy.token_ids,
        },
        ctx.meta,
    )
    .await?;
    Ok(())
}

/// `ResetInterestRate` and `UpdateInterestRate`.
pub async fn interest_rate<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    new_rate: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    pool.interest_rate = new_rate;
    pool.borrow_rate = new_rate;
    pool.lend_rate = lend_rate(new_rate, pool.lender_interest_margin, pool.actual_utilization);
    ctx.store.pools.save(pool);
    Ok(())
}

pub async fn flashloan<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    receiver: Address,
    token: Address,
    amount: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    let scaled = scale_to_wad(amount, decimals_of(ctx.store, token));

    if token == pool.quote_token {
        pool.quote_token_flashloaned = pool.quote_token_flashloaned.saturating_add(scaled);
    } else if token == pool.collateral_token {
        pool.collateral_flashloaned = pool.collateral_flashloaned.saturating_add(scaled);
    } else {
        warn!(pool = %pool.address, token = %token, "Flashloan of a token foreign to the pool");
    }

    ctx.touch(receiver, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{handle_event, HandlerOptions};
    use crate::error::IndexerError;
    use crate::ids::{address_id, event_id};
    use crate::math::WAD;
    use crate::store::{NftSubKind, Store};
    use crate::testing::{addr, meta, meta_at, MockReader, POOL};
    use alloy::primitives::{Bytes, U256};
    use alloy::sol_types::SolCall;
    use indexer_chain::contracts::{erc20_non_subset_hash, IERC20PoolFactory, IERC721SubsetFactory};
    use indexer_chain::{PoolEventKind, PoolKind, TokenInfo};

    const FACTORY: alloy::primitives::Address = alloy::primitives::Address::repeat_byte(0xfa);

    #[tokio::test]
    async fn test_pool_created_from_fungible_factory() {
        let reader = MockReader::new();
        let mut store = Store::new();
        let new_pool = addr(0x77);

        let mut m = meta_at(FACTORY, 1, 0);
        m.tx_input = Some(Bytes::from(
            IERC20PoolFactory::deployPoolCall {
                collateral_: COLLATERAL,
                quote_: QUOTE,
                interestRate_: U256::from(5u64),
            }
            .abi_encode(),
        ));
        apply(
            &mut store,
            &reader,
            event(
                m.clone(),
                PoolEventKind::PoolCreated {
                    pool: new_pool,
                    subset_hash: erc20_non_subset_hash(),
                },
            ),
        )
        .await;

        let pool = store.pools.get(&address_id(new_pool)).unwrap();
        assert_eq!(pool.kind, PoolKind::Erc20);
        assert_eq!(pool.collateral_token, COLLATERAL);
        assert_eq!(pool.quote_token, QUOTE);
        assert_eq!(store.tokens.len(), 2);
        assert_eq!(store.events.get(&event_id(m.tx_hash, 0)).unwrap().pool, new_pool);
    }

    #[tokio::test]
    async fn test_subset_pool_records_allowed_ids() {
        let reader = MockReader::new();
        let mut store = Store::new();
        let new_pool = addr(0x78);

        let mut m = meta_at(FACTORY, 1, 0);
        m.tx_input = Some(Bytes::from(
            IERC721SubsetFactory::deployPoolCall {
                collateral_: COLLATERAL,
                quote_: QUOTE,
                tokenIds_: ids(&[1, 2, 3]),
                interestRate_: U256::from(5u64),
            }
            .abi_encode(),
        ));
        apply(
            &mut store,
            &reader,
            event(
                m,
                PoolEventKind::PoolCreated {
                    pool: new_pool,
                    subset_hash: alloy::primitives::B256::repeat_byte(0x99),
                },
            ),
        )
        .await;

        let pool = store.pools.get(&address_id(new_pool)).unwrap();
        assert_eq!(pool.kind, PoolKind::Erc721);
        assert_eq!(pool.nft_sub_kind, Some(NftSubKind::Subset));
        assert_eq!(pool.token_ids_allowed, ids(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_pool_created_without_input_is_fatal() {
        let reader = MockReader::new();
        let mut store = Store::new();

        let result = handle_event(
            &mut store,
            &reader,
            &event(
                meta_at(FACTORY, 1, 0),
                PoolEventKind::PoolCreated {
                    pool: addr(0x77),
                    subset_hash: erc20_non_subset_hash(),
                },
            ),
            HandlerOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(IndexerError::Calldata(_))));
        assert!(store.pools.is_empty());
    }

    #[tokio::test]
    async fn test_flashloan_scales_by_token_decimals() {
        let reader = MockReader::new();
        reader.set_token_info(
            QUOTE,
            TokenInfo {
                decimals: 6,
                ..Default::default()
            },
        );
        let mut store = store_with_pool(&reader, PoolKind::Erc20).await;

        apply(
            &mut store,
            &reader,
            event(
                meta(3, 0),
                PoolEventKind::Flashloan {
                    receiver: addr(0x33),
                    token: QUOTE,
                    amount: U256::from(2_000_000u64),
                },
            ),
        )
        .await;

        let pool = store.pools.get(&address_id(POOL)).unwrap();
        assert_eq!(pool.quote_token_flashloaned, WAD * U256::from(2u64));
        assert_eq!(pool.collateral_flashloaned, U256::ZERO);
        assert!(store.accounts.contains(&address_id(addr(0x33))));
    }
}

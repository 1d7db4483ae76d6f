//! Borrower-side handlers.

use alloy::primitives::{Address, U256};
use indexer_chain::ChainStateReader;
use tracing::debug;

use super::HandlerCtx;
use crate::error::Result;
use crate::ledger::loan;
use crate::nft;

/// `DrawDebt` and `DrawDebtNFT`; `token_ids` is empty for the former.
pub async fn draw_debt<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    borrower: Address,
    token_ids: &[U256],
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    let (mut position, created) = loan::load_or_create_loan(ctx.store, pool.address, borrower);
    loan::refresh_loan(&mut position, ctx.reader).await?;

    if pool.is_nft() && !token_ids.is_empty() {
        nft::pledge(&mut pool, &mut position, token_ids);
    }
    debug!(
        pool = %pool.address,
        borrower = %borrower,
        t0debt = %position.t0debt,
        collateral = %position.collateral_pledged,
        created,
        "Debt drawn"
    );

    ctx.touch(borrower, &pool, |_| {});
    loan::save_or_prune(ctx.store, position);
    ctx.store.pools.save(pool);
    Ok(())
}

pub async fn repay_debt<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    borrower: Address,
    collateral_pulled: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    let (mut position, _) = loan::load_or_create_loan(ctx.store, pool.address, borrower);
    loan::refresh_loan(&mut position, ctx.reader).await?;

    // pulled collateral leaves the pool entirely
    if pool.is_nft() {
        nft::release_from_loan(&mut pool, &mut position, collateral_pulled, false);
    }

    ctx.touch(borrower, &pool, |_| {});
    loan::save_or_prune(ctx.store, position);
    ctx.store.pools.save(pool);
    Ok(())
}

/// Neutral price re-stamp.
pub async fn loan_stamped<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    borrower: Address,
) -> Result<()> {
    let pool = ctx.resync_pool().await?;
    let (mut position, _) = loan::load_or_create_loan(ctx.store, pool.address, borrower);
    loan::refresh_loan(&mut position, ctx.reader).await?;

    ctx.touch(borrower, &pool, |_| {});
    loan::save_or_prune(ctx.store, position);
    ctx.store.pools.save(pool);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use crate::ids::{address_id, loan_id};
    use crate::math::{wad_from_str, WAD};
    use crate::testing::{meta, MockReader, POOL};
    use alloy::primitives::U256;
    use indexer_chain::{BorrowerInfo, PoolEventKind, PoolKind};

    fn borrower() -> alloy::primitives::Address {
        crate::testing::addr(0x0b)
    }

    #[tokio::test]
    async fn test_draw_then_full_repay_prunes_loan() {
        let reader = MockReader::new();
        let mut store = store_with_pool(&reader, PoolKind::Erc20).await;

        reader.set_borrower_info(
            POOL,
            borrower(),
            BorrowerInfo {
                t0_debt: WAD,
                collateral: WAD * U256::from(3u64),
                ..Default::default()
            },
        );
        apply(
            &mut store,
            &reader,
            event(
                meta(10, 0),
                PoolEventKind::DrawDebt {
                    borrower: borrower(),
                    amount_borrowed: WAD,
                    collateral_pledged: WAD * U256::from(3u64),
                    lup: U256::ZERO,
                },
            ),
        )
        .await;
        let id = loan_id(POOL, borrower());
        assert_eq!(store.loans.get(&id).unwrap().t0debt, WAD);
        assert_eq!(
            store.accounts.get(&address_id(borrower())).unwrap().loans,
            vec![id.clone()]
        );

        reader.set_borrower_info(POOL, borrower(), BorrowerInfo::default());
        apply(
            &mut store,
            &reader,
            event(
                meta(11, 0),
                PoolEventKind::RepayDebt {
                    borrower: borrower(),
                    quote_repaid: WAD,
                    collateral_pulled: WAD * U256::from(3u64),
                    lup: U256::ZERO,
                },
            ),
        )
        .await;
        assert!(!store.loans.contains(&id));
        assert!(store.accounts.get(&address_id(borrower())).unwrap().loans.is_empty());
    }

    #[tokio::test]
    async fn test_nft_repay_releases_last_ids_out_of_pool() {
        let reader = MockReader::new();
        let mut store = store_with_pool(&reader, PoolKind::Erc721).await;

        reader.set_borrower_info(
            POOL,
            borrower(),
            BorrowerInfo {
                t0_debt: WAD,
                collateral: WAD * U256::from(3u64),
                ..Default::default()
            },
        );
        apply(
            &mut store,
            &reader,
            event(
                meta(10, 0),
                PoolEventKind::DrawDebtNft {
                    borrower: borrower(),
                    amount_borrowed: WAD,
                    token_ids_pledged: ids(&[7, 8, 9]),
                    lup: U256::ZERO,
                },
            ),
        )
        .await;

        reader.set_borrower_info(
            POOL,
            borrower(),
            BorrowerInfo {
                t0_debt: WAD,
                collateral: WAD,
                ..Default::default()
            },
        );
        apply(
            &mut store,
            &reader,
            event(
                meta(11, 0),
                PoolEventKind::RepayDebt {
                    borrower: borrower(),
                    quote_repaid: U256::ZERO,
                    collateral_pulled: wad_from_str("2.5").unwrap(),
                    lup: U256::ZERO,
                },
            ),
        )
        .await;

        let position = store.loans.get(&loan_id(POOL, borrower())).unwrap();
        assert_eq!(position.token_ids_pledged, ids(&[7]));
        let pool = store.pools.get(&address_id(POOL)).unwrap();
        assert_eq!(pool.token_ids_pledged, ids(&[7]));
        assert!(pool.bucket_token_ids.is_empty());
    }
}

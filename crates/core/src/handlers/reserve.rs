//! Reserve auction handlers.

use alloy::primitives::U256;
use indexer_chain::ChainStateReader;

use super::HandlerCtx;
use crate::error::Result;
use crate::ids::event_id;
use crate::reserve::{self, Leg};
use crate::store::push_unique;

async fn leg<R: ChainStateReader + ?Sized>(
    ctx: &HandlerCtx<'_, R>,
    claimable_reserves_remaining: U256,
    auction_price: U256,
    burn_epoch: U256,
) -> Result<Leg> {
    let burn = ctx
        .reader
        .burn_info(ctx.pool_address(), burn_epoch)
        .await?;
    Ok(Leg {
        actor: ctx.meta.tx_from,
        burn_epoch,
        claimable_reserves_remaining,
        auction_price,
        total_burned: burn.total_burned,
    })
}

pub async fn kick_reserve_auction<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    claimable_reserves_remaining: U256,
    auction_price: U256,
    burn_epoch: U256,
) -> Result<()> {
    let leg = leg(ctx, claimable_reserves_remaining, auction_price, burn_epoch).await?;
    let mut pool = ctx.resync_pool().await?;
    reserve::kick(ctx.store, &mut pool, &leg, ctx.meta);

    let record = event_id(ctx.meta.tx_hash, ctx.meta.log_index);
    ctx.touch(leg.actor, &pool, |a| {
        push_unique(&mut a.reserve_auctions, record);
    });
    ctx.store.pools.save(pool);
    Ok(())
}

pub async fn take_reserve_auction<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    claimable_reserves_remaining: U256,
    auction_price: U256,
    burn_epoch: U256,
) -> Result<()> {
    let leg = leg(ctx, claimable_reserves_remaining, auction_price, burn_epoch).await?;
    let mut pool = ctx.resync_pool().await?;
    reserve::take(ctx.store, &mut pool, &leg, ctx.meta)?;

    let record = event_id(ctx.meta.tx_hash, ctx.meta.log_index);
    ctx.touch(leg.actor, &pool, |a| {
        push_unique(&mut a.reserve_auctions, record);
    });
    ctx.store.pools.save(pool);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use crate::ids::{address_id, reserve_process_id};
    use crate::math::WAD;
    use crate::testing::{meta, MockReader, POOL, TX_FROM};
    use alloy::primitives::U256;
    use indexer_chain::{BurnInfo, PoolEventKind, PoolKind};

    fn burned(reader: &MockReader, epoch: U256, total: u64) {
        reader.set_burn_info(
            POOL,
            epoch,
            BurnInfo {
                total_burned: WAD * U256::from(total),
                ..Default::default()
            },
        );
    }

    #[tokio::test]
    async fn test_kick_then_take_accumulates_burn() {
        let reader = MockReader::new();
        let mut store = store_with_pool(&reader, PoolKind::Erc20).await;
        let epoch = U256::from(3u64);

        burned(&reader, epoch, 1);
        apply(
            &mut store,
            &reader,
            event(
                meta(10, 0),
                PoolEventKind::KickReserveAuction {
                    claimable_reserves_remaining: WAD * U256::from(200u64),
                    auction_price: WAD,
                    current_burn_epoch: epoch,
                },
            ),
        )
        .await;

        burned(&reader, epoch, 100);
        apply(
            &mut store,
            &reader,
            event(
                meta(11, 0),
                PoolEventKind::ReserveAuction {
                    claimable_reserves_remaining: WAD * U256::from(100u64),
                    auction_price: WAD,
                    current_burn_epoch: epoch,
                },
            ),
        )
        .await;

        let process = store
            .reserve_processes
            .get(&reserve_process_id(POOL, epoch))
            .unwrap();
        assert_eq!(process.kicker, TX_FROM);
        assert_eq!(process.kicker_reward, WAD * U256::from(2u64));
        assert_eq!(process.ajna_burned_across_all_takes, WAD * U256::from(99u64));

        let pool = store.pools.get(&address_id(POOL)).unwrap();
        assert_eq!(pool.total_ajna_burned, WAD * U256::from(100u64));
        // legs carry their own records
        assert!(store.events.is_empty());
        let account = store.accounts.get(&address_id(TX_FROM)).unwrap();
        assert_eq!(account.reserve_auctions.len(), 2);
    }
}

//! Liquidation auction handlers.

use alloy::primitives::{Address, U256};
use indexer_chain::ChainStateReader;
use tracing::{debug, info};

use super::HandlerCtx;
use crate::auction;
use crate::error::Result;
use crate::ids::event_id;
use crate::ledger::{bucket, lend, loan};
use crate::nft;
use crate::store::{
    push_unique, AuctionSettle, BucketTake, Kick, LiquidationAuction, Loan, NftSettleAward, Pool,
    Provenance, Settle, Take,
};

/// Fields shared by `Take` and `BucketTake`.
#[derive(Debug, Clone, Copy)]
pub struct TakeFields {
    pub borrower: Address,
    pub amount: U256,
    pub collateral: U256,
    pub bond_change: U256,
    pub is_reward: bool,
}

pub async fn kick<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    borrower: Address,
    debt: U256,
    collateral: U256,
    bond: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    let (mut position, _) = loan::load_or_create_loan(ctx.store, pool.address, borrower);
    // t0 debt now includes the kick penalty
    loan::refresh_loan(&mut position, ctx.reader).await?;

    let info = ctx.reader.auction_info(pool.address, borrower).await?;
    let status = ctx.reader.auction_status(pool.address, borrower).await?;

    let (mut record, created) = auction::open(ctx.store, &mut position, ctx.meta);
    auction::apply_snapshot(&mut record, &info, &status);
    if record.kicker.is_zero() {
        record.kicker = ctx.meta.tx_from;
    }
    let kicker = record.kicker;
    let kicker_info = ctx.reader.kicker_info(pool.address, kicker).await?;

    let stored = ctx.store.kicks.get(&record.kick);
    let replayed = stored.is_some();
    // takes already applied moved the locked bond
    let locked = stored.map_or(bond, |k| k.locked);

    let kick = Kick {
        id: record.kick.clone(),
        pool: pool.address,
        borrower,
        kicker,
        loan: position.id.clone(),
        auction: record.id.clone(),
        debt,
        collateral,
        bond,
        locked,
        claimable: kicker_info.claimable,
        starting_price: status.price,
        at: Provenance::from(ctx.meta),
    };
    if !replayed {
        pool.total_bond_escrowed = pool.total_bond_escrowed.saturating_add(bond);
    }
    push_unique(&mut pool.liquidation_auctions, record.id.clone());

    info!(
        pool = %pool.address,
        borrower = %borrower,
        kicker = %kicker,
        debt = %debt,
        bond = %bond,
        kick_block = record.kick_block,
        created,
        "Loan kicked"
    );

    let kick_id = kick.id.clone();
    ctx.touch(kicker, &pool, |a| {
        push_unique(&mut a.kicks, kick_id);
    });
    ctx.store.kicks.save(kick);
    ctx.store.auctions.save(record);
    loan::save_or_prune(ctx.store, position);
    ctx.store.pools.save(pool);
    Ok(())
}

/// Open auction state for a take.
struct Taken {
    pool: Pool,
    position: Loan,
    record: LiquidationAuction,
    kick: Kick,
}

/// Shared part of both take kinds: re-read the auction, move the bond and
/// resync the loan.
async fn apply_take<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    take: &TakeFields,
) -> Result<Taken> {
    let mut pool = ctx.resync_pool().await?;
    let mut position = loan::load_loan(ctx.store, pool.address, take.borrower)?;
    let mut record = loan::load_auction(ctx.store, &position)?;
    let mut kick = auction::load_kick(ctx.store, &record)?;

    let info = ctx.reader.auction_info(pool.address, take.borrower).await?;
    let status = ctx.reader.auction_status(pool.address, take.borrower).await?;
    auction::apply_snapshot(&mut record, &info, &status);
    record.last_take_price = status.price;

    auction::adjust_bond(&mut pool, &mut kick, take.bond_change, take.is_reward);
    loan::refresh_loan(&mut position, ctx.reader).await?;

    Ok(Taken {
        pool,
        position,
        record,
        kick,
    })
}

pub async fn take<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    take: TakeFields,
) -> Result<()> {
    let Taken {
        mut pool,
        mut position,
        mut record,
        kick,
    } = apply_take(ctx, &take).await?;

    // taken collateral leaves with the taker
    if pool.is_nft() {
        nft::release_from_loan(&mut pool, &mut position, take.collateral, false);
    }

    let taker = ctx.meta.tx_from;
    let row = Take {
        id: event_id(ctx.meta.tx_hash, ctx.meta.log_index),
        pool: pool.address,
        taker,
        borrower: take.borrower,
        loan: position.id.clone(),
        auction: record.id.clone(),
        amount: take.amount,
        collateral: take.collateral,
        bond_change: take.bond_change,
        is_reward: take.is_reward,
        auction_price: record.auction_price,
        at: Provenance::from(ctx.meta),
    };
    push_unique(&mut record.takes, row.id.clone());

    debug!(
        pool = %pool.address,
        borrower = %take.borrower,
        taker = %taker,
        collateral = %take.collateral,
        debt_remaining = %record.debt_remaining,
        "Auction taken"
    );

    let take_id = row.id.clone();
    ctx.touch(taker, &pool, |a| {
        push_unique(&mut a.takes, take_id);
    });
    ctx.store.takes.save(row);
    ctx.store.kicks.save(kick);
    ctx.store.auctions.save(record);
    ctx.store.loans.save(position);
    ctx.store.pools.save(pool);
    Ok(())
}

/// First half of a bucket take; consumed by [`bucket_take`].
pub fn bucket_take_lp_awarded<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    taker: Address,
    kicker: Address,
    lp_awarded_taker: U256,
    lp_awarded_kicker: U256,
) {
    auction::stage_lp_award(
        ctx.store,
        ctx.meta,
        taker,
        kicker,
        lp_awarded_taker,
        lp_awarded_kicker,
    );
}

pub async fn bucket_take<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    take: TakeFields,
    index: u32,
) -> Result<()> {
    let award = auction::take_lp_award(ctx.store, ctx.meta)?;
    let Taken {
        mut pool,
        mut position,
        mut record,
        kick,
    } = apply_take(ctx, &take).await?;

    let mut target = bucket::load_refreshed(ctx.store, ctx.reader, pool.address, index).await?;
    for (holder, lp) in [
        (award.taker, award.lp_awarded_taker),
        (award.kicker, award.lp_awarded_kicker),
    ] {
        if lp.is_zero() {
            continue;
        }
        let (mut share, _) = lend::load_or_create_lend(ctx.store, &target, holder);
        lend::add_lp(&mut share, lp);
        share.deposit_time = ctx.meta.block_timestamp;
        lend::refresh_value(&mut share, ctx.reader).await?;
        lend::commit(ctx.store, &mut target, share);
    }
    ctx.store.buckets.save(target);

    // collateral bought by the bucket stays in the pool
    if pool.is_nft() {
        nft::release_from_loan(&mut pool, &mut position, take.collateral, true);
    }

    let row = BucketTake {
        id: event_id(ctx.meta.tx_hash, ctx.meta.log_index),
        pool: pool.address,
        taker: award.taker,
        kicker: award.kicker,
        borrower: take.borrower,
        loan: position.id.clone(),
        auction: record.id.clone(),
        index,
        amount: take.amount,
        collateral: take.collateral,
        bond_change: take.bond_change,
        is_reward: take.is_reward,
        auction_price: record.auction_price,
        lp_awarded_taker: award.lp_awarded_taker,
        lp_awarded_kicker: award.lp_awarded_kicker,
        at: Provenance::from(ctx.meta),
    };
    push_unique(&mut record.bucket_takes, row.id.clone());

    debug!(
        pool = %pool.address,
        borrower = %take.borrower,
        index,
        taker = %award.taker,
        "Auction bucket taken"
    );

    let take_id = row.id.clone();
    ctx.touch(award.taker, &pool, |a| {
        push_unique(&mut a.takes, take_id);
    });
    ctx.store.bucket_takes.save(row);
    ctx.store.kicks.save(kick);
    ctx.store.auctions.save(record);
    ctx.store.loans.save(position);
    ctx.store.pools.save(pool);
    Ok(())
}

/// Terminal settlement. Replaying it leaves the auction settled and the
/// loan's t0 debt at zero.
pub async fn settle<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    borrower: Address,
    settled_debt: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    let mut position = loan::load_loan(ctx.store, pool.address, borrower)?;
    let mut record = loan::load_auction(ctx.store, &position)?;

    loan::refresh_loan(&mut position, ctx.reader).await?;
    position.t0debt = U256::ZERO;
    record.debt_remaining = U256::ZERO;
    record.collateral_remaining = position.collateral_pledged;
    auction::close(&mut pool, &mut record, &mut position, ctx.meta);

    if pool.is_nft() {
        let remaining = position.collateral_pledged;
        nft::rebalance_settled(&mut pool, &mut position, remaining);
    }

    let settler = ctx.meta.tx_from;
    let row = Settle {
        id: event_id(ctx.meta.tx_hash, ctx.meta.log_index),
        pool: pool.address,
        settler,
        borrower,
        loan: position.id.clone(),
        auction: record.id.clone(),
        settled_debt,
        at: Provenance::from(ctx.meta),
    };
    push_unique(&mut record.settles, row.id.clone());

    info!(
        pool = %pool.address,
        borrower = %borrower,
        settled_debt = %settled_debt,
        "Auction settled"
    );

    let settle_id = row.id.clone();
    ctx.touch(settler, &pool, |a| {
        push_unique(&mut a.settles, settle_id);
    });
    ctx.store.settles.save(row);
    ctx.store.auctions.save(record);
    ctx.store.loans.save(position);
    ctx.store.pools.save(pool);
    Ok(())
}

/// `AuctionSettle`, or `AuctionNFTSettle` when `nft_award` carries the
/// `(lp, index)` awarded to the borrower for fractional collateral.
pub async fn auction_settle<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    borrower: Address,
    collateral: U256,
    nft_award: Option<(U256, u32)>,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    let mut position = loan::load_loan(ctx.store, pool.address, borrower)?;
    let mut record = loan::load_auction(ctx.store, &position)?;

    record.collateral_remaining = collateral;
    auction::close(&mut pool, &mut record, &mut position, ctx.meta);

    if let Some((lp, index)) = nft_award {
        let mut target =
            bucket::load_refreshed(ctx.store, ctx.reader, pool.address, index).await?;
        let (mut share, _) = lend::load_or_create_lend(ctx.store, &target, borrower);
        lend::add_lp(&mut share, lp);
        share.deposit_time = ctx.meta.block_timestamp;
        lend::refresh_value(&mut share, ctx.reader).await?;
        lend::commit(ctx.store, &mut target, share);
        ctx.store.buckets.save(target);
    }
    if pool.is_nft() {
        nft::rebalance_settled(&mut pool, &mut position, collateral);
    }

    let row = AuctionSettle {
        id: event_id(ctx.meta.tx_hash, ctx.meta.log_index),
        pool: pool.address,
        borrower,
        loan: position.id.clone(),
        auction: record.id.clone(),
        collateral,
        nft_award: nft_award.map(|(lp, index)| NftSettleAward { lp, index }),
        at: Provenance::from(ctx.meta),
    };
    record.auction_settle = Some(row.id.clone());

    ctx.touch(borrower, &pool, |_| {});
    ctx.store.auction_settles.save(row);
    ctx.store.auctions.save(record);
    ctx.store.loans.save(position);
    ctx.store.pools.save(pool);
    Ok(())
}

pub async fn bond_withdrawn<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    kicker: Address,
    amount: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    pool.total_bond_escrowed = pool.total_bond_escrowed.saturating_sub(amount);
    ctx.touch(kicker, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

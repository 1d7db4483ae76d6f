//! LP allowance, transferor and transfer handlers.
//!
//! Allowance bookkeeping needs no chain reads; only [`transfer_lp`] resyncs
//! the buckets it moves LP through.

use alloy::primitives::{Address, U256};
use indexer_chain::ChainStateReader;
use tracing::{debug, warn};

use super::HandlerCtx;
use crate::error::Result;
use crate::ids::{bucket_id, lend_id};
use crate::ledger::{allowance, bucket, lend};

pub fn increase_allowance<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    owner: Address,
    spender: Address,
    indexes: &[u32],
    amounts: &[U256],
) -> Result<()> {
    let pool = ctx.count_pool_tx()?;
    allowance::increase(ctx.store, pool.address, owner, spender, indexes, amounts);
    ctx.touch(owner, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

pub fn decrease_allowance<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    owner: Address,
    spender: Address,
    indexes: &[u32],
    amounts: &[U256],
) -> Result<()> {
    let pool = ctx.count_pool_tx()?;
    allowance::decrease(ctx.store, pool.address, owner, spender, indexes, amounts);
    ctx.touch(owner, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

pub fn revoke_allowance<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    owner: Address,
    spender: Address,
    indexes: &[u32],
) -> Result<()> {
    let pool = ctx.count_pool_tx()?;
    allowance::revoke(ctx.store, pool.address, owner, spender, indexes);
    ctx.touch(owner, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

pub fn approve_transferors<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    lender: Address,
    transferors: &[Address],
) -> Result<()> {
    let pool = ctx.count_pool_tx()?;
    allowance::approve_transferors(ctx.store, pool.address, lender, transferors);
    ctx.touch(lender, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

pub fn revoke_transferors<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    lender: Address,
    transferors: &[Address],
) -> Result<()> {
    let pool = ctx.count_pool_tx()?;
    allowance::revoke_transferors(ctx.store, pool.address, lender, transferors);
    ctx.touch(lender, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

/// One index of a `TransferLP`, as seen before any LP is moved.
#[derive(Debug, Clone, Copy)]
struct TransferLeg {
    allowed: Option<U256>,
    tracked: U256,
    remaining: U256,
}

/// Split the event's total `lp` across its indexes.
///
/// A single index moved exactly `lp`. Otherwise an index the owner still
/// holds LP at moved its allowance (or, without one, the drop from tracked
/// LP); indexes the owner was emptied at share what is left of `lp` in
/// order, each capped by its allowance.
fn split_transfer(lp: U256, legs: &[TransferLeg]) -> Vec<U256> {
    if legs.len() == 1 {
        return vec![lp];
    }

    let exact = |leg: &TransferLeg| {
        leg.allowed
            .unwrap_or_else(|| leg.tracked.saturating_sub(leg.remaining))
    };
    let mut residual = legs
        .iter()
        .filter(|leg| !leg.remaining.is_zero())
        .fold(lp, |left, leg| left.saturating_sub(exact(leg)));

    legs.iter()
        .map(|leg| {
            if !leg.remaining.is_zero() {
                return exact(leg);
            }
            let amount = leg.allowed.map_or(residual, |a| a.min(residual));
            residual -= amount;
            amount
        })
        .collect()
}

/// Move `owner`'s LP at each of `indexes` to `new_owner`.
///
/// The amounts come from the event total and the owner's post-transfer
/// `lenderInfo`, never from tracked LP, so drift in the owner's lend is
/// clamped and diagnosed by the redemption.
pub async fn transfer_lp<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    owner: Address,
    new_owner: Address,
    indexes: &[u32],
    lp: U256,
) -> Result<()> {
    let pool = ctx.resync_pool().await?;

    let mut legs = Vec::with_capacity(indexes.len());
    for &index in indexes {
        let allowed = allowance::consume(ctx.store, pool.address, owner, new_owner, index);
        let tracked = ctx
            .store
            .lends
            .get(&lend_id(&bucket_id(pool.address, index), owner))
            .map(|l| l.lpb)
            .unwrap_or_default();
        let remaining = ctx
            .reader
            .lender_info(pool.address, index, owner)
            .await?
            .lp_balance;
        if allowed.is_none() {
            warn!(
                pool = %pool.address,
                index,
                owner = %owner,
                new_owner = %new_owner,
                "LP transfer without tracked allowance"
            );
        }
        legs.push(TransferLeg {
            allowed,
            tracked,
            remaining,
        });
    }
    let amounts = split_transfer(lp, &legs);

    for (&index, amount) in indexes.iter().zip(amounts) {
        let mut target =
            bucket::load_refreshed(ctx.store, ctx.reader, pool.address, index).await?;
        let (mut from, _) = lend::load_or_create_lend(ctx.store, &target, owner);

        lend::redeem_lp(ctx.store, &mut from, amount, ctx.meta);
        let owner_deposit_time = from.deposit_time;
        lend::refresh_value(&mut from, ctx.reader).await?;
        ctx.verify(&from).await?;
        lend::commit(ctx.store, &mut target, from);

        let (mut to, _) = lend::load_or_create_lend(ctx.store, &target, new_owner);
        lend::add_lp(&mut to, amount);
        to.deposit_time = to.deposit_time.max(owner_deposit_time);
        lend::refresh_value(&mut to, ctx.reader).await?;
        ctx.verify(&to).await?;
        lend::commit(ctx.store, &mut target, to);

        debug!(
            pool = %pool.address,
            index,
            owner = %owner,
            new_owner = %new_owner,
            lp = %amount,
            "LP transferred"
        );
        ctx.store.buckets.save(target);
    }

    ctx.touch(owner, &pool, |_| {});
    ctx.touch(new_owner, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

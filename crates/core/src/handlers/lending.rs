//! Deposit-side handlers: quote and collateral in and out of buckets.

use alloy::primitives::{Address, U256};
use indexer_chain::{decode_merge_or_remove, ChainStateReader, DecodeError};
use tracing::debug;

use super::HandlerCtx;
use crate::error::Result;
use crate::ledger::{bucket, lend};
use crate::math::whole_tokens;
use crate::nft;
use crate::store::Pool;

/// Apply `delta` to `lender`'s LP at `index` and resync the bucket.
async fn apply_lp<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    pool: &Pool,
    lender: Address,
    index: u32,
    delta: LpDelta,
) -> Result<()> {
    let mut bucket = bucket::load_refreshed(ctx.store, ctx.reader, pool.address, index).await?;
    let (mut position, _) = lend::load_or_create_lend(ctx.store, &bucket, lender);

    match delta {
        LpDelta::Award(amount) => {
            lend::add_lp(&mut position, amount);
            position.deposit_time = ctx.meta.block_timestamp;
        }
        LpDelta::Redeem(amount) => {
            lend::redeem_lp(ctx.store, &mut position, amount, ctx.meta);
        }
    }
    lend::refresh_value(&mut position, ctx.reader).await?;
    ctx.verify(&position).await?;

    lend::commit(ctx.store, &mut bucket, position);
    ctx.store.buckets.save(bucket);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum LpDelta {
    Award(U256),
    Redeem(U256),
}

pub async fn add_quote_token<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    lender: Address,
    index: u32,
    lp_awarded: U256,
) -> Result<()> {
    let pool = ctx.resync_pool().await?;
    apply_lp(ctx, &pool, lender, index, LpDelta::Award(lp_awarded)).await?;
    ctx.touch(lender, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

/// `from` and `to` are `(index, lp)` pairs: LP redeemed at the source and
/// awarded at the destination.
pub async fn move_quote_token<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    lender: Address,
    from: (u32, U256),
    to: (u32, U256),
) -> Result<()> {
    let pool = ctx.resync_pool().await?;
    apply_lp(ctx, &pool, lender, from.0, LpDelta::Redeem(from.1)).await?;
    apply_lp(ctx, &pool, lender, to.0, LpDelta::Award(to.1)).await?;
    ctx.touch(lender, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

pub async fn remove_quote_token<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    lender: Address,
    index: u32,
    lp_redeemed: U256,
) -> Result<()> {
    let pool = ctx.resync_pool().await?;
    apply_lp(ctx, &pool, lender, index, LpDelta::Redeem(lp_redeemed)).await?;
    ctx.touch(lender, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

/// Fungible `AddCollateral` and `AddCollateralNFT`; `token_ids` is empty
/// for the former.
pub async fn add_collateral<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    actor: Address,
    index: u32,
    lp_awarded: U256,
    token_ids: &[U256],
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    apply_lp(ctx, &pool, actor, index, LpDelta::Award(lp_awarded)).await?;
    if pool.is_nft() {
        nft::add_to_buckets(&mut pool, token_ids);
    }
    ctx.touch(actor, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

pub async fn remove_collateral<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    claimer: Address,
    index: u32,
    amount: U256,
    lp_redeemed: U256,
) -> Result<()> {
    let mut pool = ctx.resync_pool().await?;
    apply_lp(ctx, &pool, claimer, index, LpDelta::Redeem(lp_redeemed)).await?;
    if pool.is_nft() {
        let removed = nft::remove_from_buckets(&mut pool, whole_tokens(amount));
        debug!(pool = %pool.address, count = removed.len(), "NFT collateral left buckets");
    }
    ctx.touch(claimer, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

/// `MergeOrRemoveCollateralNFT`. The event carries neither the removal
/// indexes nor the destination, so both come from the calldata.
pub async fn merge_or_remove_collateral<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    actor: Address,
    to_index_lps: U256,
) -> Result<()> {
    let input = ctx
        .meta
        .tx_input
        .as_ref()
        .ok_or(DecodeError::MissingInput("MergeOrRemoveCollateralNFT"))?;
    let call = decode_merge_or_remove(input)?;

    let mut pool = ctx.resync_pool().await?;

    // the event has no per-index redemptions: re-read the actor's LP
    for index in &call.removal_indexes {
        let mut bucket =
            bucket::load_refreshed(ctx.store, ctx.reader, pool.address, *index).await?;
        let (mut position, _) = lend::load_or_create_lend(ctx.store, &bucket, actor);
        position.lpb = ctx
            .reader
            .lender_info(pool.address, *index, actor)
            .await?
            .lp_balance;
        lend::refresh_value(&mut position, ctx.reader).await?;
        lend::commit(ctx.store, &mut bucket, position);
        ctx.store.buckets.save(bucket);
    }

    // a destination among the removal indexes was already re-read
    if !to_index_lps.is_zero() && !call.removal_indexes.contains(&call.to_index) {
        apply_lp(ctx, &pool, actor, call.to_index, LpDelta::Award(to_index_lps)).await?;
    }

    let count = usize::try_from(call.no_of_nfts_to_remove).unwrap_or(usize::MAX);
    let removed = nft::remove_from_buckets(&mut pool, count);
    debug!(
        pool = %pool.address,
        actor = %actor,
        to_index = call.to_index,
        removed = removed.len(),
        "Merged NFT collateral"
    );

    ctx.touch(actor, &pool, |_| {});
    ctx.store.pools.save(pool);
    Ok(())
}

/// Every lend in the bucket forfeits its LP.
pub async fn bucket_bankruptcy<R: ChainStateReader + ?Sized>(
    ctx: &mut HandlerCtx<'_, R>,
    index: u32,
) -> Result<()> {
    let pool = ctx.resync_pool().await?;
    let mut bucket = bucket::load_refreshed(ctx.store, ctx.reader, pool.address, index).await?;

    let members = bucket.lends.clone();
    for id in &members {
        if let Some(mut position) = ctx.store.lends.load(id) {
            position.lpb = U256::ZERO;
            position.lpb_value_in_quote = U256::ZERO;
            lend::commit(ctx.store, &mut bucket, position);
        }
    }
    debug!(pool = %pool.address, index, forfeited = members.len(), "Bucket bankrupt");

    ctx.store.buckets.save(bucket);
    ctx.store.pools.save(pool);
    Ok(())
}

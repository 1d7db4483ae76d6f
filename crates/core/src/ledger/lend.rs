//! Per-lender LP positions.
//!
//! `lpb` is accumulated from event deltas because no bulk per-lender read
//! exists. It never goes negative: an over-redemption clamps to zero and
//! leaves a [`Diagnostic::LpDrift`] behind.

use alloy::primitives::{Address, U256};
use indexer_chain::{ChainStateReader, EventMeta};
use tracing::{debug, warn};

use crate::error::Result;
use crate::ids::lend_id;
use crate::ledger::account;
use crate::store::{push_unique, remove_item, Bucket, Diagnostic, Lend, Provenance, Store};

pub fn load_or_create_lend(store: &Store, bucket: &Bucket, lender: Address) -> (Lend, bool) {
    store
        .lends
        .load_or_create(&lend_id(&bucket.id, lender), || Lend::new(bucket, lender))
}

pub fn add_lp(lend: &mut Lend, amount: U256) {
    lend.lpb = lend.lpb.saturating_add(amount);
}

/// Subtract `amount` from the lend, clamping at zero.
///
/// Returns the LP actually removed.
pub fn redeem_lp(store: &mut Store, lend: &mut Lend, amount: U256, meta: &EventMeta) -> U256 {
    if amount <= lend.lpb {
        lend.lpb -= amount;
        return amount;
    }

    let tracked = lend.lpb;
    warn!(
        pool = %lend.pool,
        index = lend.bucket_index,
        lender = %lend.lender,
        tracked = %tracked,
        redeemed = %amount,
        block = meta.block_number,
        "LP redemption exceeds tracked balance, clamping to zero"
    );
    store.diagnose(Diagnostic::LpDrift {
        lend: lend.id.clone(),
        pool: lend.pool,
        index: lend.bucket_index,
        lender: lend.lender,
        tracked,
        redeemed: amount,
        at: Provenance::from(meta),
    });
    lend.lpb = U256::ZERO;
    tracked
}

/// Recompute the quote value of the lend's LP with a conversion read.
pub async fn refresh_value<R: ChainStateReader + ?Sized>(lend: &mut Lend, reader: &R) -> Result<()> {
    lend.lpb_value_in_quote = if lend.lpb.is_zero() {
        U256::ZERO
    } else {
        reader
            .lp_to_quote_tokens(lend.pool, lend.lpb, lend.bucket_index)
            .await?
    };
    Ok(())
}

/// Persist the lend, or prune it once its LP is gone.
///
/// Keeps the bucket's and the lender's membership lists in step. The bucket
/// itself is saved by the caller.
pub fn commit(store: &mut Store, bucket: &mut Bucket, lend: Lend) {
    let member = !lend.lpb.is_zero();
    account::set_lend_membership(store, lend.lender, &lend.id, member);

    if member {
        push_unique(&mut bucket.lends, lend.id.clone());
        store.lends.save(lend);
    } else {
        remove_item(&mut bucket.lends, &lend.id);
        if store.lends.remove(&lend.id).is_some() {
            debug!(pool = %lend.pool, index = lend.bucket_index, lender = %lend.lender, "Lend pruned");
        }
    }
}

/// Compare the tracked balance with `lenderInfo`, recording any mismatch.
///
/// The tracked value is left as is.
pub async fn verify<R: ChainStateReader + ?Sized>(
    store: &mut Store,
    reader: &R,
    lend: &Lend,
    meta: &EventMeta,
) -> Result<()> {
    let info = reader
        .lender_info(lend.pool, lend.bucket_index, lend.lender)
        .await?;
    if info.lp_balance != lend.lpb {
        warn!(
            pool = %lend.pool,
            index = lend.bucket_index,
            lender = %lend.lender,
            tracked = %lend.lpb,
            on_chain = %info.lp_balance,
            "Tracked LP differs from lenderInfo"
        );
        store.diagnose(Diagnostic::LpMismatch {
            lend: lend.id.clone(),
            pool: lend.pool,
            index: lend.bucket_index,
            lender: lend.lender,
            tracked: lend.lpb,
            on_chain: info.lp_balance,
            at: Provenance::from(meta),
        });
    }
    Ok(())
}

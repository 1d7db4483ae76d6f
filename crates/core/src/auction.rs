//! Liquidation auction state machine.
//!
//! `none -> kicked -> taken* -> settled`. Mutable auction fields are always
//! overwritten from `auctionInfo` / `auctionStatus`; only the escrowed bond
//! and the kick's locked bond move by event deltas.
//!
//! A bucket take is two logs in one transaction: `BucketTakeLPAwarded` at
//! log index `n` immediately followed by `BucketTake` at `n + 1`. The award
//! is staged under the id the take will look it up by.

use alloy::primitives::{Address, U256};
use indexer_chain::{AuctionInfo, AuctionStatus, EventMeta};
use tracing::debug;

use crate::error::{IndexerError, Result};
use crate::ids::{auction_id, event_id, EntityId};
use crate::store::{
    remove_item, BucketTakeLpAward, Kick, LiquidationAuction, Loan, Pool, Store,
};

fn to_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Overwrite the auction's mutable fields from the two auction reads.
///
/// A zero kicker in `info` (the auction already left the queue) keeps the
/// recorded kicker.
pub fn apply_snapshot(auction: &mut LiquidationAuction, info: &AuctionInfo, status: &AuctionStatus) {
    if !info.kicker.is_zero() {
        auction.kicker = info.kicker;
    }
    if !info.kick_time.is_zero() {
        auction.kick_time = to_u64(info.kick_time);
    }
    auction.bond_size = info.bond_size;
    auction.bond_factor = info.bond_factor;
    auction.neutral_price = info.neutral_price;
    auction.reference_price = info.reference_price;
    auction.debt_to_collateral = info.debt_to_collateral;

    auction.debt_remaining = status.debt_to_cover;
    auction.collateral_remaining = status.collateral;
    auction.auction_price = status.price;
}

/// Open the loan's auction for the kick at `meta`.
///
/// Returns the auction and whether it was created; replaying the kick
/// yields the same auction.
pub fn open(store: &Store, loan: &mut Loan, meta: &EventMeta) -> (LiquidationAuction, bool) {
    let kick = event_id(meta.tx_hash, meta.log_index);
    let id = auction_id(loan.pool, &loan.id, meta.block_number);
    let (mut auction, created) = store
        .auctions
        .load_or_create(&id, || LiquidationAuction::new(loan, kick, meta.block_number));
    if created {
        auction.kick_time = meta.block_timestamp;
    }
    loan.in_liquidation = true;
    loan.liquidation_auction = Some(auction.id.clone());
    (auction, created)
}

/// Signed bond adjustment of a take: a reward grows the escrow and the
/// kicker's locked bond, a penalty shrinks both.
pub fn adjust_bond(pool: &mut Pool, kick: &mut Kick, bond_change: U256, is_reward: bool) {
    if is_reward {
        pool.total_bond_escrowed = pool.total_bond_escrowed.saturating_add(bond_change);
        kick.locked = kick.locked.saturating_add(bond_change);
    } else {
        pool.total_bond_escrowed = pool.total_bond_escrowed.saturating_sub(bond_change);
        kick.locked = kick.locked.saturating_sub(bond_change);
    }
}

/// The auction's kick record; it is written together with the auction.
pub fn load_kick(store: &Store, auction: &LiquidationAuction) -> Result<Kick> {
    store
        .kicks
        .load(&auction.kick)
        .ok_or_else(|| IndexerError::missing::<Kick>(&auction.kick))
}

/// Stage the LP award for the `BucketTake` expected at the next log index.
pub fn stage_lp_award(
    store: &mut Store,
    meta: &EventMeta,
    taker: Address,
    kicker: Address,
    lp_awarded_taker: U256,
    lp_awarded_kicker: U256,
) -> EntityId {
    let id = event_id(meta.tx_hash, meta.log_index + 1);
    debug!(tx = %meta.tx_hash, log_index = meta.log_index + 1, "Staged bucket take LP award");
    store.bucket_take_awards.save(BucketTakeLpAward {
        id: id.clone(),
        pool: meta.address,
        taker,
        kicker,
        lp_awarded_taker,
        lp_awarded_kicker,
    });
    id
}

/// Consume the award staged for the bucket take at `meta`.
pub fn take_lp_award(store: &mut Store, meta: &EventMeta) -> Result<BucketTakeLpAward> {
    let id = event_id(meta.tx_hash, meta.log_index);
    store
        .bucket_take_awards
        .remove(&id)
        .ok_or(IndexerError::MissingLpAward { id })
}

/// Terminal transition. The loan keeps its link so companion settle events
/// in the same transaction still resolve the auction.
pub fn close(pool: &mut Pool, auction: &mut LiquidationAuction, loan: &mut Loan, meta: &EventMeta) {
    if !auction.settled {
        auction.settled = true;
        auction.settle_time = Some(meta.block_timestamp);
    }
    loan.in_liquidation = false;
    remove_item(&mut pool.liquidation_auctions, &auction.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, meta};
    use indexer_chain::PoolKind;

    #[test]
    fn test_open_is_keyed_by_kick_block() {
        let mut store = Store::new();
        let mut loan = Loan::new(addr(1), addr(2));

        let (first, created) = open(&store, &mut loan, &meta(10, 3));
        assert!(created);
        store.auctions.save(first.clone());

        let (replayed, created) = open(&store, &mut loan, &meta(10, 3));
        assert!(!created);
        assert_eq!(replayed.id, first.id);

        let (later, created) = open(&store, &mut loan, &meta(20, 0));
        assert!(created);
        assert_ne!(later.id, first.id);
        assert_eq!(loan.liquidation_auction, Some(later.id));
    }

    #[test]
    fn test_adjust_bond_signed_by_reward_flag() {
        let mut pool = Pool::new(addr(1), PoolKind::Erc20, &meta(1, 0));
        pool.total_bond_escrowed = U256::from(100u64);
        let mut kick = Kick {
            id: event_id(meta(1, 0).tx_hash, 0),
            pool: addr(1),
            borrower: addr(2),
            kicker: addr(3),
            loan: crate::ids::loan_id(addr(1), addr(2)),
            auction: EntityId::from(addr(9)),
            debt: U256::ZERO,
            collateral: U256::ZERO,
            bond: U256::from(100u64),
            locked: U256::from(100u64),
            claimable: U256::ZERO,
            starting_price: U256::ZERO,
            at: Default::default(),
        };

        adjust_bond(&mut pool, &mut kick, U256::from(10u64), true);
        assert_eq!(pool.total_bond_escrowed, U256::from(110u64));
        assert_eq!(kick.locked, U256::from(110u64));

        adjust_bond(&mut pool, &mut kick, U256::from(500u64), false);
        assert_eq!(pool.total_bond_escrowed, U256::ZERO);
        assert_eq!(kick.locked, U256::ZERO);
    }

    #[test]
    fn test_lp_award_staged_for_next_log() {
        let mut store = Store::new();
        stage_lp_award(&mut store, &meta(5, 7), addr(3), addr(4), U256::from(1u64), U256::from(2u64));

        assert!(matches!(
            take_lp_award(&mut store, &meta(5, 7)),
            Err(IndexerError::MissingLpAward { .. })
        ));
        let award = take_lp_award(&mut store, &meta(5, 8)).unwrap();
        assert_eq!(award.lp_awarded_kicker, U256::from(2u64));
        assert!(store.bucket_take_awards.is_empty());
    }

    #[test]
    fn test_apply_snapshot_overwrites() {
        let loan = Loan::new(addr(1), addr(2));
        let mut auction = LiquidationAuction::new(&loan, EntityId::from(addr(9)), 1);
        auction.debt_remaining = U256::from(1_000u64);

        apply_snapshot(
            &mut auction,
            &AuctionInfo {
                kicker: addr(3),
                bond_size: U256::from(5u64),
                ..Default::default()
            },
            &AuctionStatus {
                debt_to_cover: U256::from(40u64),
                collateral: U256::from(2u64),
                price: U256::from(7u64),
                ..Default::default()
            },
        );

        assert_eq!(auction.kicker, addr(3));
        assert_eq!(auction.debt_remaining, U256::from(40u64));
        assert_eq!(auction.collateral_remaining, U256::from(2u64));
        assert_eq!(auction.auction_price, U256::from(7u64));
    }
}

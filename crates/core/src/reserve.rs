//! Reserve auction ledger.
//!
//! One [`ReserveAuctionProcess`] per (pool, burn epoch) aggregates the kick
//! and every take of that auction. Each leg also leaves an immutable
//! [`ReserveAuction`] carrying the AJNA burned since the previous leg, taken
//! from the pool's cumulative `burnInfo(epoch).totalBurned`.

use alloy::primitives::{Address, U256};
use indexer_chain::EventMeta;
use tracing::{debug, info};

use crate::error::{IndexerError, Result};
use crate::ids::{event_id, reserve_process_id};
use crate::math::{wmul, WAD};
use crate::store::{
    push_unique, Pool, Provenance, ReserveAuction, ReserveAuctionProcess, ReserveLegKind, Store,
};

/// Kicker reward: 1% of the claimable reserves at kick.
pub fn kicker_reward(claimable_reserves: U256) -> U256 {
    wmul(claimable_reserves, WAD / U256::from(100u64))
}

/// Fields shared by both legs.
#[derive(Debug, Clone)]
pub struct Leg {
    pub actor: Address,
    pub burn_epoch: U256,
    pub claimable_reserves_remaining: U256,
    pub auction_price: U256,
    /// Cumulative AJNA burned by the pool as of this leg
    pub total_burned: U256,
}

fn write_leg(
    store: &mut Store,
    process: &mut ReserveAuctionProcess,
    kind: ReserveLegKind,
    leg: &Leg,
    incremental: U256,
    meta: &EventMeta,
) {
    let record = ReserveAuction {
        id: event_id(meta.tx_hash, meta.log_index),
        process: process.id.clone(),
        pool: process.pool,
        kind,
        actor: leg.actor,
        burn_epoch: leg.burn_epoch,
        claimable_reserves_remaining: leg.claimable_reserves_remaining,
        auction_price: leg.auction_price,
        incremental_ajna_burned: incremental,
        at: Provenance::from(meta),
    };
    push_unique(&mut process.legs, record.id.clone());
    store.reserve_auctions.save(record);
    process.total_burned_at_last_leg = leg.total_burned;
}

/// Start (or replay) the process for `leg.burn_epoch`.
pub fn kick(store: &mut Store, pool: &mut Pool, leg: &Leg, meta: &EventMeta) -> ReserveAuctionProcess {
    let id = reserve_process_id(pool.address, leg.burn_epoch);
    let (mut process, created) = store
        .reserve_processes
        .load_or_create(&id, || ReserveAuctionProcess::new(pool.address, leg.burn_epoch));

    if created {
        process.kicker = leg.actor;
        process.kick_time = meta.block_timestamp;
        process.claimable_reserves = leg.claimable_reserves_remaining;
        process.kicker_reward = kicker_reward(leg.claimable_reserves_remaining);
    }

    let incremental = leg.total_burned.saturating_sub(pool.total_ajna_burned);
    write_leg(store, &mut process, ReserveLegKind::Kick, leg, incremental, meta);

    pool.total_ajna_burned = leg.total_burned;
    push_unique(&mut pool.reserve_auctions, process.id.clone());

    info!(
        pool = %pool.address,
        epoch = %leg.burn_epoch,
        claimable = %process.claimable_reserves,
        kicker = %process.kicker,
        "Reserve auction kicked"
    );
    store.reserve_processes.save(process.clone());
    process
}

/// Record a take against the epoch's open process.
pub fn take(
    store: &mut Store,
    pool: &mut Pool,
    leg: &Leg,
    meta: &EventMeta,
) -> Result<ReserveAuctionProcess> {
    let id = reserve_process_id(pool.address, leg.burn_epoch);
    let mut process = store
        .reserve_processes
        .load(&id)
        .ok_or_else(|| IndexerError::missing::<ReserveAuctionProcess>(&id))?;

    let incremental = leg.total_burned.saturating_sub(process.total_burned_at_last_leg);
    process.ajna_burned_across_all_takes = process
        .ajna_burned_across_all_takes
        .saturating_add(incremental);
    write_leg(store, &mut process, ReserveLegKind::Take, leg, incremental, meta);

    pool.total_ajna_burned = leg.total_burned;

    debug!(
        pool = %pool.address,
        epoch = %leg.burn_epoch,
        burned = %incremental,
        total = %process.ajna_burned_across_all_takes,
        "Reserve auction taken"
    );
    store.reserve_processes.save(process.clone());
    Ok(process)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, meta};
    use indexer_chain::PoolKind;

    fn leg(total_burned: U256) -> Leg {
        Leg {
            actor: addr(7),
            burn_epoch: U256::from(1u64),
            claimable_reserves_remaining: WAD * U256::from(100u64),
            auction_price: WAD,
            total_burned,
        }
    }

    #[test]
    fn test_kicker_reward_is_one_percent() {
        assert_eq!(kicker_reward(WAD * U256::from(100u64)), WAD);
    }

    #[test]
    fn test_take_records_incremental_burn() {
        let mut store = Store::new();
        let mut pool = Pool::new(addr(1), PoolKind::Erc20, &meta(1, 0));

        kick(&mut store, &mut pool, &leg(WAD), &meta(2, 0));
        let process = take(&mut store, &mut pool, &leg(WAD * U256::from(100u64)), &meta(3, 0)).unwrap();

        assert_eq!(process.ajna_burned_across_all_takes, WAD * U256::from(99u64));
        assert_eq!(process.legs.len(), 2);
        let take_leg = store.reserve_auctions.get(&process.legs[1]).unwrap();
        assert_eq!(take_leg.kind, ReserveLegKind::Take);
        assert_eq!(take_leg.incremental_ajna_burned, WAD * U256::from(99u64));
        assert_eq!(pool.total_ajna_burned, WAD * U256::from(100u64));
        assert_eq!(pool.reserve_auctions, vec![process.id]);
    }

    #[test]
    fn test_take_without_kick_is_fatal() {
        let mut store = Store::new();
        let mut pool = Pool::new(addr(1), PoolKind::Erc20, &meta(1, 0));
        assert!(matches!(
            take(&mut store, &mut pool, &leg(WAD), &meta(3, 0)),
            Err(IndexerError::MissingEntity { kind: "ReserveAuctionProcess", .. })
        ));
    }
}

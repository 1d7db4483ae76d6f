//! Event handlers: one function per pool event, grouped by concern.
//!
//! [`handle_event`] pins the reader to the event's block, dispatches on the
//! event kind and, for everything that is not an auction leg, writes the
//! generic [`EventRecord`]. A handler performs all of its reads before the
//! writes that depend on them and leaves the store consistent on success.
//! On error the event is aborted; the caller decides whether to stop.

mod borrowing;
mod lending;
mod liquidation;
mod lp;
mod pool;
mod reserve;

use alloy::primitives::Address;
use indexer_chain::{ChainStateReader, EventMeta, PoolEvent, PoolEventKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::ledger::{account, lend, pool as pool_ledger};
use crate::store::{Account, EventRecord, Lend, Pool, Store};

/// Switches that change handler behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerOptions {
    /// Cross-check accumulated `Lend.lpb` against `lenderInfo`
    #[serde(default)]
    pub verify_lend_balances: bool,
}

/// Everything a handler works with for one event.
pub struct HandlerCtx<'a, R: ?Sized> {
    pub store: &'a mut Store,
    pub reader: &'a R,
    pub meta: &'a EventMeta,
    pub options: HandlerOptions,
}

impl<'a, R: ChainStateReader + ?Sized> HandlerCtx<'a, R> {
    /// The emitting pool.
    pub fn pool_address(&self) -> Address {
        self.meta.address
    }

    /// Load the emitting pool, resync it and count the transaction.
    pub async fn resync_pool(&mut self) -> Result<Pool> {
        let mut pool = pool_ledger::load_pool(self.store, self.pool_address())?;
        pool_ledger::update_pool(&mut pool, self.store, self.reader).await?;
        pool_ledger::count_tx(self.store, &mut pool);
        Ok(pool)
    }

    /// Load the emitting pool and count the transaction, without reads.
    pub fn count_pool_tx(&mut self) -> Result<Pool> {
        let mut pool = pool_ledger::load_pool(self.store, self.pool_address())?;
        pool_ledger::count_tx(self.store, &mut pool);
        Ok(pool)
    }

    /// Count a transaction by `address` in `pool`.
    pub fn touch(&mut self, address: Address, pool: &Pool, update: impl FnOnce(&mut Account)) {
        account::touch(self.store, address, &pool.id, update);
    }

    /// `lenderInfo` cross-check, when enabled.
    pub async fn verify(&mut self, lend: &Lend) -> Result<()> {
        if self.options.verify_lend_balances {
            lend::verify(self.store, self.reader, lend, self.meta).await?;
        }
        Ok(())
    }
}

/// Events that leave their own record instead of an [`EventRecord`].
fn has_own_record(kind: &PoolEventKind) -> bool {
    matches!(
        kind,
        PoolEventKind::Kick { .. }
            | PoolEventKind::Take { .. }
            | PoolEventKind::BucketTake { .. }
            | PoolEventKind::BucketTakeLpAwarded { .. }
            | PoolEventKind::Settle { .. }
            | PoolEventKind::AuctionSettle { .. }
            | PoolEventKind::AuctionNftSettle { .. }
            | PoolEventKind::KickReserveAuction { .. }
            | PoolEventKind::ReserveAuction { .. }
    )
}

/// Apply one event to the store.
pub async fn handle_event<R: ChainStateReader + ?Sized>(
    store: &mut Store,
    reader: &R,
    event: &PoolEvent,
    options: HandlerOptions,
) -> Result<()> {
    let meta = &event.meta;
    reader.pin_block(meta.block_number);
    debug!(
        event = event.name(),
        pool = %meta.address,
        block = meta.block_number,
        log_index = meta.log_index,
        "Handling event"
    );

    let mut ctx = HandlerCtx {
        store,
        reader,
        meta,
        options,
    };

    use PoolEventKind as K;
    match &event.kind {
        K::PoolCreated { pool, subset_hash } => {
            pool::pool_created(&mut ctx, *pool, *subset_hash).await?
        }
        K::ResetInterestRate { new_rate, .. } | K::UpdateInterestRate { new_rate, .. } => {
            pool::interest_rate(&mut ctx, *new_rate).await?
        }
        K::Flashloan {
            receiver,
            token,
            amount,
        } => pool::flashloan(&mut ctx, *receiver, *token, *amount).await?,

        K::AddQuoteToken {
            lender,
            index,
            lp_awarded,
            ..
        } => lending::add_quote_token(&mut ctx, *lender, *index, *lp_awarded).await?,
        K::MoveQuoteToken {
            lender,
            from,
            to,
            lp_redeemed_from,
            lp_awarded_to,
            ..
        } => {
            lending::move_quote_token(
                &mut ctx,
                *lender,
                (*from, *lp_redeemed_from),
                (*to, *lp_awarded_to),
            )
            .await?
        }
        K::RemoveQuoteToken {
            lender,
            index,
            lp_redeemed,
            ..
        } => lending::remove_quote_token(&mut ctx, *lender, *index, *lp_redeemed).await?,
        K::AddCollateral {
            actor,
            index,
            lp_awarded,
            ..
        } => lending::add_collateral(&mut ctx, *actor, *index, *lp_awarded, &[]).await?,
        K::AddCollateralNft {
            actor,
            index,
            token_ids,
            lp_awarded,
        } => lending::add_collateral(&mut ctx, *actor, *index, *lp_awarded, token_ids).await?,
        K::RemoveCollateral {
            claimer,
            index,
            amount,
            lp_redeemed,
        } => lending::remove_collateral(&mut ctx, *claimer, *index, *amount, *lp_redeemed).await?,
        K::MergeOrRemoveCollateralNft {
            actor,
            to_index_lps,
            ..
        } => lending::merge_or_remove_collateral(&mut ctx, *actor, *to_index_lps).await?,
        K::BucketBankruptcy { index, .. } => lending::bucket_bankruptcy(&mut ctx, *index).await?,

        K::DrawDebt { borrower, .. } => borrowing::draw_debt(&mut ctx, *borrower, &[]).await?,
        K::DrawDebtNft {
            borrower,
            token_ids_pledged,
            ..
        } => borrowing::draw_debt(&mut ctx, *borrower, token_ids_pledged).await?,
        K::RepayDebt {
            borrower,
            collateral_pulled,
            ..
        } => borrowing::repay_debt(&mut ctx, *borrower, *collateral_pulled).await?,
        K::LoanStamped { borrower } => borrowing::loan_stamped(&mut ctx, *borrower).await?,

        K::Kick {
            borrower,
            debt,
            collateral,
            bond,
        } => liquidation::kick(&mut ctx, *borrower, *debt, *collateral, *bond).await?,
        K::Take {
            borrower,
            amount,
            collateral,
            bond_change,
            is_reward,
        } => {
            let take = liquidation::TakeFields {
                borrower: *borrower,
                amount: *amount,
                collateral: *collateral,
                bond_change: *bond_change,
                is_reward: *is_reward,
            };
            liquidation::take(&mut ctx, take).await?
        }
        K::BucketTakeLpAwarded {
            taker,
            kicker,
            lp_awarded_taker,
            lp_awarded_kicker,
        } => liquidation::bucket_take_lp_awarded(
            &mut ctx,
            *taker,
            *kicker,
            *lp_awarded_taker,
            *lp_awarded_kicker,
        ),
        K::BucketTake {
            borrower,
            index,
            amount,
            collateral,
            bond_change,
            is_reward,
        } => {
            let take = liquidation::TakeFields {
                borrower: *borrower,
                amount: *amount,
                collateral: *collateral,
                bond_change: *bond_change,
                is_reward: *is_reward,
            };
            liquidation::bucket_take(&mut ctx, take, *index).await?
        }
        K::Settle {
            borrower,
            settled_debt,
        } => liquidation::settle(&mut ctx, *borrower, *settled_debt).await?,
        K::AuctionSettle {
            borrower,
            collateral,
        } => liquidation::auction_settle(&mut ctx, *borrower, *collateral, None).await?,
        K::AuctionNftSettle {
            borrower,
            collateral,
            lp,
            index,
        } => {
            liquidation::auction_settle(&mut ctx, *borrower, *collateral, Some((*lp, *index)))
                .await?
        }
        K::BondWithdrawn { kicker, amount, .. } => {
            liquidation::bond_withdrawn(&mut ctx, *kicker, *amount).await?
        }

        K::KickReserveAuction {
            claimable_reserves_remaining,
            auction_price,
            current_burn_epoch,
        } => {
            reserve::kick_reserve_auction(
                &mut ctx,
                *claimable_reserves_remaining,
                *auction_price,
                *current_burn_epoch,
            )
            .await?
        }
        K::ReserveAuction {
            claimable_reserves_remaining,
            auction_price,
            current_burn_epoch,
        } => {
            reserve::take_reserve_auction(
                &mut ctx,
                *claimable_reserves_remaining,
                *auction_price,
                *current_burn_epoch,
            )
            .await?
        }

        K::IncreaseLpAllowance {
            owner,
            spender,
            indexes,
            amounts,
        } => lp::increase_allowance(&mut ctx, *owner, *spender, indexes, amounts)?,
        K::DecreaseLpAllowance {
            owner,
            spender,
            indexes,
            amounts,
        } => lp::decrease_allowance(&mut ctx, *owner, *spender, indexes, amounts)?,
        K::RevokeLpAllowance {
            owner,
            spender,
            indexes,
        } => lp::revoke_allowance(&mut ctx, *owner, *spender, indexes)?,
        K::ApproveLpTransferors {
            lender,
            transferors,
        } => lp::approve_transferors(&mut ctx, *lender, transferors)?,
        K::RevokeLpTransferors {
            lender,
            transferors,
        } => lp::revoke_transferors(&mut ctx, *lender, transferors)?,
        K::TransferLp {
            owner,
            new_owner,
            indexes,
            lp,
        } => lp::transfer_lp(&mut ctx, *owner, *new_owner, indexes, *lp).await?,
    }

    if !has_own_record(&event.kind) {
        let mut record = EventRecord::new(meta, &event.kind);
        if let PoolEventKind::PoolCreated { pool, .. } = &event.kind {
            record.pool = *pool;
        }
        ctx.store.events.save(record);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::ids::{address_id, event_id};
    use crate::testing::{meta, MockReader, POOL};
    use alloy::primitives::U256;
    use indexer_chain::PoolKind;

    #[tokio::test]
    async fn test_event_record_and_pool_tx_count() {
        let reader = MockReader::new();
        let mut store = store_with_pool(&reader, PoolKind::Erc20).await;

        let m = meta(5, 2);
        apply(
            &mut store,
            &reader,
            event(
                m.clone(),
                PoolEventKind::UpdateInterestRate {
                    old_rate: U256::from(1u64),
                    new_rate: U256::from(2u64),
                },
            ),
        )
        .await;

        let record = store.events.get(&event_id(m.tx_hash, 2)).unwrap();
        assert_eq!(record.name, "UpdateInterestRate");
        let pool = store.pools.get(&address_id(POOL)).unwrap();
        assert_eq!(pool.tx_count, 1);
        assert_eq!(pool.interest_rate, U256::from(2u64));
        assert_eq!(reader.pinned_block(), 5);
    }

    #[tokio::test]
    async fn test_event_for_unknown_pool_is_fatal() {
        let reader = MockReader::new();
        let mut store = Store::new();

        let result = handle_event(
            &mut store,
            &reader,
            &event(meta(5, 0), PoolEventKind::LoanStamped { borrower: lender() }),
            HandlerOptions::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(crate::error::IndexerError::MissingEntity { kind: "Pool", .. })
        ));
    }
}

//! Borrower loans.

use alloy::primitives::Address;
use indexer_chain::ChainStateReader;
use tracing::debug;

use crate::error::{IndexerError, Result};
use crate::ids::loan_id;
use crate::ledger::account;
use crate::store::{LiquidationAuction, Loan, Store};

pub fn load_or_create_loan(store: &Store, pool: Address, borrower: Address) -> (Loan, bool) {
    store
        .loans
        .load_or_create(&loan_id(pool, borrower), || Loan::new(pool, borrower))
}

/// Loan that an earlier event must have created.
pub fn load_loan(store: &Store, pool: Address, borrower: Address) -> Result<Loan> {
    let id = loan_id(pool, borrower);
    store
        .loans
        .load(&id)
        .ok_or_else(|| IndexerError::missing::<Loan>(&id))
}

/// The loan's open auction; absent is a structural fault.
pub fn load_auction(store: &Store, loan: &Loan) -> Result<LiquidationAuction> {
    let id = loan
        .liquidation_auction
        .as_ref()
        .ok_or_else(|| IndexerError::missing::<LiquidationAuction>(&loan.id))?;
    store
        .auctions
        .load(id)
        .ok_or_else(|| IndexerError::missing::<LiquidationAuction>(id))
}

/// Overwrite collateral, t0 debt and prices from `borrowerInfo`.
pub async fn refresh_loan<R: ChainStateReader + ?Sized>(loan: &mut Loan, reader: &R) -> Result<()> {
    let info = reader.borrower_info(loan.pool, loan.borrower).await?;
    loan.collateral_pledged = info.collateral;
    loan.t0debt = info.t0_debt;
    loan.threshold_price = info.threshold_price;
    loan.t0_neutral_price = info.t0_neutral_price;
    Ok(())
}

pub fn is_empty(loan: &Loan) -> bool {
    loan.collateral_pledged.is_zero() && loan.t0debt.is_zero() && !loan.in_liquidation
}

/// Persist the loan, or delete it once both collateral and debt are zero.
///
/// Deleting a loan that is already gone is a no-op.
pub fn save_or_prune(store: &mut Store, loan: Loan) {
    if is_empty(&loan) {
        account::set_loan_membership(store, loan.borrower, &loan.id, false);
        if store.loans.remove(&loan.id).is_some() {
            debug!(pool = %loan.pool, borrower = %loan.borrower, "Loan pruned");
        }
    } else {
        account::set_loan_membership(store, loan.borrower, &loan.id, true);
        store.loans.save(loan);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WAD;
    use crate::testing::MockReader;
    use alloy::primitives::U256;
    use indexer_chain::BorrowerInfo;

    #[tokio::test]
    async fn test_refresh_and_prune() {
        let reader = MockReader::new();
        let pool = Address::repeat_byte(1);
        let borrower = Address::repeat_byte(2);
        let mut store = Store::new();

        reader.set_borrower_info(
            pool,
            borrower,
            BorrowerInfo {
                t0_debt: WAD,
                collateral: WAD * U256::from(2u64),
                ..Default::default()
            },
        );

        let (mut loan, created) = load_or_create_loan(&store, pool, borrower);
        assert!(created);
        refresh_loan(&mut loan, &reader).await.unwrap();
        save_or_prune(&mut store, loan);
        assert!(store.loans.contains(&loan_id(pool, borrower)));

        reader.set_borrower_info(pool, borrower, BorrowerInfo::default());
        let mut loan = load_loan(&store, pool, borrower).unwrap();
        refresh_loan(&mut loan, &reader).await.unwrap();
        save_or_prune(&mut store, loan.clone());
        assert!(!store.loans.contains(&loan.id));

        // already gone
        save_or_prune(&mut store, loan);
        assert!(store.loans.is_empty());
    }

    #[test]
    fn test_missing_auction_is_fatal() {
        let store = Store::new();
        let loan = Loan::new(Address::repeat_byte(1), Address::repeat_byte(2));
        assert!(matches!(
            load_auction(&store, &loan),
            Err(IndexerError::MissingEntity { kind: "LiquidationAuction", .. })
        ));
    }
}

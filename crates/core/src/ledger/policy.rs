//! How each derived field is maintained.
//!
//! Fields are either re-fetched wholesale from chain state after every
//! mutating event, or accumulated from event deltas. The table is the
//! reference handlers are written against; it is also checked in tests.

/// Maintenance rule for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Overwritten from a chain read.
    Refetch(&'static str),
    /// Accumulated from event deltas, never below zero.
    AccumulateClamped,
    /// Accumulated from event deltas.
    Accumulate,
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyRow {
    pub entity: &'static str,
    pub field: &'static str,
    pub policy: FieldPolicy,
}

const fn row(entity: &'static str, field: &'static str, policy: FieldPolicy) -> PolicyRow {
    PolicyRow {
        entity,
        field,
        policy,
    }
}

use FieldPolicy::*;

pub const LEDGER_POLICY: &[PolicyRow] = &[
    row("Bucket", "price", Refetch("bucketInfo")),
    row("Bucket", "deposit", Refetch("bucketInfo")),
    row("Bucket", "collateral", Refetch("bucketInfo")),
    row("Bucket", "lpb", Refetch("bucketInfo")),
    row("Bucket", "exchange_rate", Refetch("bucketInfo")),
    row("Lend", "lpb", AccumulateClamped),
    row("Lend", "lpb_value_in_quote", Refetch("lpToQuoteTokens")),
    row("Loan", "collateral_pledged", Refetch("borrowerInfo")),
    row("Loan", "t0debt", Refetch("borrowerInfo")),
    row("Loan", "threshold_price", Refetch("borrowerInfo")),
    row("LiquidationAuction", "debt_remaining", Refetch("auctionStatus")),
    row("LiquidationAuction", "collateral_remaining", Refetch("auctionStatus")),
    row("LiquidationAuction", "neutral_price", Refetch("auctionInfo")),
    row("LiquidationAuction", "bond_size", Refetch("auctionInfo")),
    row("Kick", "locked", AccumulateClamped),
    row("Pool", "pool_size", Refetch("poolLoansInfo")),
    row("Pool", "t0debt", Refetch("debtInfo")),
    row("Pool", "lup", Refetch("poolPricesInfo")),
    row("Pool", "reserves", Refetch("poolReservesInfo")),
    row("Pool", "actual_utilization", Refetch("poolUtilizationInfo")),
    row("Pool", "pledged_collateral", Refetch("pledgedCollateral")),
    row("Pool", "total_bond_escrowed", AccumulateClamped),
    row("Pool", "tx_count", Accumulate),
    row("Pool", "quote_token_flashloaned", Accumulate),
    row("Pool", "total_ajna_burned", Refetch("burnInfo")),
    row("ReserveAuctionProcess", "ajna_burned_across_all_takes", Accumulate),
    row("Account", "tx_count", Accumulate),
];

/// Policy for `entity.field`, if the field is listed.
pub fn policy_for(entity: &str, field: &str) -> Option<FieldPolicy> {
    LEDGER_POLICY
        .iter()
        .find(|r| r.entity == entity && r.field == field)
        .map(|r| r.policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bucket_fields_are_refetched_and_lend_lp_accumulates() {
        for field in ["price", "deposit", "collateral", "lpb", "exchange_rate"] {
            assert!(matches!(policy_for("Bucket", field), Some(Refetch(_))));
        }
        assert_eq!(policy_for("Lend", "lpb"), Some(AccumulateClamped));
    }

    #[test]
    fn test_no_field_listed_twice() {
        let mut seen = HashSet::new();
        for r in LEDGER_POLICY {
            assert!(seen.insert((r.entity, r.field)), "{}.{} duplicated", r.entity, r.field);
        }
    }
}

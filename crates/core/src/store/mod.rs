//! In-memory keyed entity store.
//!
//! One [`Table`] per record kind. There is no referential integrity at this
//! level; handlers keep cross-record links consistent.

mod amount;
mod entities;
mod snapshot;
mod table;

pub use amount::{from_decimal, to_decimal, wad};
pub use entities::{
    Account, AuctionSettle, Bucket, BucketTake, BucketTakeLpAward, Diagnostic, EventRecord, Kick,
    Lend, LiquidationAuction, Loan, LpAllowance, LpAllowanceList, LpTransferorList,
    NftSettleAward, NftSubKind, Pool, Provenance, ReserveAuction, ReserveAuctionProcess,
    ReserveLegKind, Settle, Take, Token,
};
pub use snapshot::{Cursor, SnapshotError};
pub use table::{Entity, Table};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub pools: Table<Pool>,
    pub tokens: Table<Token>,
    pub buckets: Table<Bucket>,
    pub lends: Table<Lend>,
    pub loans: Table<Loan>,
    pub accounts: Table<Account>,
    pub auctions: Table<LiquidationAuction>,
    pub kicks: Table<Kick>,
    pub takes: Table<Take>,
    pub bucket_take_awards: Table<BucketTakeLpAward>,
    pub bucket_takes: Table<BucketTake>,
    pub settles: Table<Settle>,
    pub auction_settles: Table<AuctionSettle>,
    pub reserve_processes: Table<ReserveAuctionProcess>,
    pub reserve_auctions: Table<ReserveAuction>,
    pub allowance_lists: Table<LpAllowanceList>,
    pub allowances: Table<LpAllowance>,
    pub transferor_lists: Table<LpTransferorList>,
    pub events: Table<EventRecord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Last fully applied event
    pub cursor: Option<Cursor>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Append `id` unless already present.
pub(crate) fn push_unique<T: PartialEq>(list: &mut Vec<T>, id: T) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

/// Drop every occurrence of `id`, keeping order.
pub(crate) fn remove_item<T: PartialEq>(list: &mut Vec<T>, id: &T) -> bool {
    let before = list.len();
    list.retain(|x| x != id);
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_unique_and_remove() {
        let mut list = vec![1, 2];
        assert!(push_unique(&mut list, 3));
        assert!(!push_unique(&mut list, 2));
        assert!(remove_item(&mut list, &1));
        assert!(!remove_item(&mut list, &9));
        assert_eq!(list, vec![2, 3]);
    }
}

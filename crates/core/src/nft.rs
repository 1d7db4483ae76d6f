//! NFT collateral token-id allocation.
//!
//! In an NFT pool every token id held by the pool sits in exactly one place:
//! a loan's pledged list (mirrored, in pledge order, by the pool's pledged
//! list) or the pool's bucket-held list. When a loan's collateral drops by a
//! WAD amount `Δ`, the last `floor(Δ / WAD)` ids of the loan leave it.
//! Fractional remainders stay pledged.

use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use indexer_chain::EventMeta;
use tracing::warn;

use crate::ids::address_id;
use crate::math::whole_tokens;
use crate::store::{Diagnostic, Loan, Pool, Provenance, Store};

/// Remove the last `n` ids, returning them in their original order.
pub fn take_last(ids: &mut Vec<U256>, n: usize) -> Vec<U256> {
    let split = ids.len().saturating_sub(n);
    ids.split_off(split)
}

/// Remove each of `targets` from `ids` (first occurrence), keeping the order
/// of what remains. Ids that are not present are ignored.
pub fn find_and_remove_token_ids(targets: &[U256], ids: &mut Vec<U256>) {
    for target in targets {
        if let Some(pos) = ids.iter().position(|id| id == target) {
            ids.remove(pos);
        }
    }
}

/// A borrower pledged `token_ids`.
pub fn pledge(pool: &mut Pool, loan: &mut Loan, token_ids: &[U256]) {
    loan.token_ids_pledged.extend_from_slice(token_ids);
    pool.token_ids_pledged.extend_from_slice(token_ids);
}

/// The loan's collateral dropped by `amount`: release the last whole tokens.
///
/// With `to_buckets` the released ids become bucket-held; otherwise they
/// have left the pool.
pub fn release_from_loan(
    pool: &mut Pool,
    loan: &mut Loan,
    amount: U256,
    to_buckets: bool,
) -> Vec<U256> {
    let released = take_last(&mut loan.token_ids_pledged, whole_tokens(amount));
    find_and_remove_token_ids(&released, &mut pool.token_ids_pledged);
    if to_buckets {
        pool.bucket_token_ids.extend_from_slice(&released);
    }
    released
}

/// After settlement the loan keeps `floor(remaining)` ids; the rest move to
/// the buckets. Running it again changes nothing.
pub fn rebalance_settled(pool: &mut Pool, loan: &mut Loan, remaining: U256) -> Vec<U256> {
    let keep = whole_tokens(remaining);
    let excess = loan.token_ids_pledged.len().saturating_sub(keep);
    let moved = take_last(&mut loan.token_ids_pledged, excess);
    find_and_remove_token_ids(&moved, &mut pool.token_ids_pledged);
    pool.bucket_token_ids.extend_from_slice(&moved);
    moved
}

/// Ids deposited straight into a bucket.
pub fn add_to_buckets(pool: &mut Pool, token_ids: &[U256]) {
    pool.bucket_token_ids.extend_from_slice(token_ids);
}

/// `count` whole tokens withdrawn from the buckets, last deposited first.
pub fn remove_from_buckets(pool: &mut Pool, count: usize) -> Vec<U256> {
    take_last(&mut pool.bucket_token_ids, count)
}

/// Outcome of [`check_partition`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Ids found in more than one place
    pub overlapping: Vec<U256>,
    /// Ids pledged by the pool but by no loan, or by a loan but not the pool
    pub unmatched: Vec<U256>,
}

impl PartitionReport {
    pub fn is_clean(&self) -> bool {
        self.overlapping.is_empty() && self.unmatched.is_empty()
    }
}

/// Verify the token-id partition over a pool and its loans.
pub fn check_partition<'a>(pool: &Pool, loans: impl IntoIterator<Item = &'a Loan>) -> PartitionReport {
    let mut report = PartitionReport::default();
    let mut owner: HashSet<U256> = HashSet::new();

    let mut loan_ids: Vec<U256> = Vec::new();
    for loan in loans {
        loan_ids.extend_from_slice(&loan.token_ids_pledged);
    }

    for id in loan_ids.iter().chain(pool.bucket_token_ids.iter()) {
        if !owner.insert(*id) && !report.overlapping.contains(id) {
            report.overlapping.push(*id);
        }
    }

    let pooled: HashSet<U256> = pool.token_ids_pledged.iter().copied().collect();
    let by_loans: HashSet<U256> = loan_ids.iter().copied().collect();
    for id in pooled.symmetric_difference(&by_loans) {
        report.unmatched.push(*id);
    }
    report.unmatched.sort();

    report
}

/// Run [`check_partition`] over a stored pool, recording any violation.
pub fn audit_pool(store: &mut Store, pool: Address, meta: &EventMeta) -> PartitionReport {
    let Some(record) = store.pools.get(&address_id(pool)) else {
        return PartitionReport::default();
    };
    let report = check_partition(record, store.loans.values().filter(|l| l.pool == pool));

    if !report.is_clean() {
        warn!(
            pool = %pool,
            overlapping = report.overlapping.len(),
            unmatched = report.unmatched.len(),
            block = meta.block_number,
            "NFT token id partition violated"
        );
        store.diagnose(Diagnostic::NftPartition {
            pool,
            overlapping: report.overlapping.clone(),
            unmatched: report.unmatched.clone(),
            at: Provenance::from(meta),
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::wad_from_str;
    use crate::testing::meta;
    use indexer_chain::PoolKind;

    fn ids(values: &[u64]) -> Vec<U256> {
        values.iter().map(|v| U256::from(*v)).collect()
    }

    fn setup(pledged: &[u64]) -> (Pool, Loan) {
        let mut pool = Pool::new(Address::repeat_byte(1), PoolKind::Erc721, &meta(1, 0));
        let mut loan = Loan::new(pool.address, Address::repeat_byte(2));
        pledge(&mut pool, &mut loan, &ids(pledged));
        (pool, loan)
    }

    #[test]
    fn test_take_removes_last_three_in_pledge_order() {
        let (mut pool, mut loan) = setup(&[234, 345, 456, 567, 789]);

        let released = release_from_loan(
            &mut pool,
            &mut loan,
            wad_from_str("3.9675").unwrap(),
            false,
        );

        assert_eq!(released, ids(&[456, 567, 789]));
        assert_eq!(loan.token_ids_pledged, ids(&[234, 345]));
        assert_eq!(pool.token_ids_pledged, ids(&[234, 345]));
        for id in &released {
            assert!(!pool.bucket_token_ids.contains(id));
        }
        assert!(check_partition(&pool, [&loan]).is_clean());
    }

    #[test]
    fn test_fractional_amount_stays_pledged() {
        let (mut pool, mut loan) = setup(&[1, 2]);
        let released = release_from_loan(&mut pool, &mut loan, wad_from_str("0.75").unwrap(), true);
        assert!(released.is_empty());
        assert_eq!(loan.token_ids_pledged, ids(&[1, 2]));
    }

    #[test]
    fn test_find_and_remove_preserves_order_and_tolerates_absence() {
        let mut list = ids(&[5, 6, 7, 8]);
        find_and_remove_token_ids(&ids(&[6, 42, 8]), &mut list);
        assert_eq!(list, ids(&[5, 7]));
    }

    #[test]
    fn test_rebalance_settled_is_idempotent() {
        let (mut pool, mut loan) = setup(&[10, 20, 30]);
        let remaining = wad_from_str("1.4").unwrap();

        let moved = rebalance_settled(&mut pool, &mut loan, remaining);
        assert_eq!(moved, ids(&[20, 30]));
        assert_eq!(loan.token_ids_pledged, ids(&[10]));
        assert_eq!(pool.bucket_token_ids, ids(&[20, 30]));

        let again = rebalance_settled(&mut pool, &mut loan, remaining);
        assert!(again.is_empty());
        assert_eq!(pool.bucket_token_ids, ids(&[20, 30]));
        assert!(check_partition(&pool, [&loan]).is_clean());
    }

    #[test]
    fn test_check_partition_reports_overlap() {
        let (mut pool, loan) = setup(&[1, 2]);
        pool.bucket_token_ids.push(U256::from(2u64));

        let report = check_partition(&pool, [&loan]);
        assert_eq!(report.overlapping, ids(&[2]));
        assert!(report.unmatched.is_empty());
    }

    #[test]
    fn test_audit_pool_records_overlap() {
        let (mut pool, loan) = setup(&[1, 2]);
        pool.bucket_token_ids.push(U256::from(1u64));
        let mut store = Store::new();
        let address = pool.address;
        store.pools.save(pool);
        store.loans.save(loan);

        let report = audit_pool(&mut store, address, &meta(2, 0));
        assert_eq!(report.overlapping, ids(&[1]));
        assert!(matches!(
            store.diagnostics.as_slice(),
            [Diagnostic::NftPartition { .. }]
        ));
    }

    #[test]
    fn test_audit_pool_records_unmatched() {
        let (mut pool, loan) = setup(&[1, 2]);
        // pledged at pool level, held by no loan
        pool.token_ids_pledged.push(U256::from(9u64));
        let mut store = Store::new();
        let address = pool.address;
        store.pools.save(pool);
        store.loans.save(loan);

        let report = audit_pool(&mut store, address, &meta(2, 0));
        assert!(report.overlapping.is_empty());
        assert_eq!(report.unmatched, ids(&[9]));
        match store.diagnostics.as_slice() {
            [Diagnostic::NftPartition {
                overlapping,
                unmatched,
                ..
            }] => {
                assert!(overlapping.is_empty());
                assert_eq!(unmatched, &ids(&[9]));
            }
            other => panic!("expected one partition diagnostic, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_from_buckets_lifo() {
        let (mut pool, _) = setup(&[]);
        add_to_buckets(&mut pool, &ids(&[3, 4, 5]));
        assert_eq!(remove_from_buckets(&mut pool, 2), ids(&[4, 5]));
        assert_eq!(pool.bucket_token_ids, ids(&[3]));
    }
}

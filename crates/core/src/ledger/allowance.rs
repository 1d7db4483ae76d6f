//! LP allowances and approved transferors.
//!
//! Child allowances live under a per (pool, owner, spender) list; a list is
//! deleted as soon as its last child goes.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::ids::{allowance_id, allowance_list_id, transferor_list_id};
use crate::store::{
    push_unique, remove_item, LpAllowance, LpAllowanceList, LpTransferorList, Store,
};

fn load_or_create_list(
    store: &Store,
    pool: Address,
    owner: Address,
    spender: Address,
) -> LpAllowanceList {
    store
        .allowance_lists
        .load_or_create(&allowance_list_id(pool, owner, spender), || {
            LpAllowanceList::new(pool, owner, spender)
        })
        .0
}

fn save_or_prune_list(store: &mut Store, list: LpAllowanceList) {
    if list.allowances.is_empty() {
        if store.allowance_lists.remove(&list.id).is_some() {
            debug!(pool = %list.pool, owner = %list.owner, spender = %list.spender, "Allowance list pruned");
        }
    } else {
        store.allowance_lists.save(list);
    }
}

/// Add `amounts[i]` to the allowance at `indexes[i]`.
pub fn increase(
    store: &mut Store,
    pool: Address,
    owner: Address,
    spender: Address,
    indexes: &[u32],
    amounts: &[U256],
) {
    let mut list = load_or_create_list(store, pool, owner, spender);
    for (index, amount) in indexes.iter().zip(amounts) {
        let (mut allowance, _) = store
            .allowances
            .load_or_create(&allowance_id(&list.id, *index), || {
                LpAllowance::new(&list.id, *index)
            });
        allowance.amount = allowance.amount.saturating_add(*amount);
        push_unique(&mut list.allowances, allowance.id.clone());
        store.allowances.save(allowance);
    }
    save_or_prune_list(store, list);
}

/// Subtract `amounts[i]`; an allowance reaching zero is deleted.
pub fn decrease(
    store: &mut Store,
    pool: Address,
    owner: Address,
    spender: Address,
    indexes: &[u32],
    amounts: &[U256],
) {
    let Some(mut list) = store
        .allowance_lists
        .load(&allowance_list_id(pool, owner, spender))
    else {
        return;
    };

    for (index, amount) in indexes.iter().zip(amounts) {
        let id = allowance_id(&list.id, *index);
        let Some(mut allowance) = store.allowances.load(&id) else {
            continue;
        };
        if *amount >= allowance.amount {
            store.allowances.remove(&id);
            remove_item(&mut list.allowances, &id);
        } else {
            allowance.amount -= *amount;
            store.allowances.save(allowance);
        }
    }
    save_or_prune_list(store, list);
}

/// Delete the allowances at `indexes`.
pub fn revoke(store: &mut Store, pool: Address, owner: Address, spender: Address, indexes: &[u32]) {
    let Some(mut list) = store
        .allowance_lists
        .load(&allowance_list_id(pool, owner, spender))
    else {
        return;
    };

    for index in indexes {
        let id = allowance_id(&list.id, *index);
        store.allowances.remove(&id);
        remove_item(&mut list.allowances, &id);
    }
    save_or_prune_list(store, list);
}

/// Remove and return the allowance at `index`, if one is tracked.
///
/// A transfer consumes the whole allowance for the index.
pub fn consume(
    store: &mut Store,
    pool: Address,
    owner: Address,
    spender: Address,
    index: u32,
) -> Option<U256> {
    let mut list = store
        .allowance_lists
        .load(&allowance_list_id(pool, owner, spender))?;
    let id = allowance_id(&list.id, index);
    let allowance = store.allowances.remove(&id)?;
    remove_item(&mut list.allowances, &id);
    save_or_prune_list(store, list);
    Some(allowance.amount)
}

pub fn approve_transferors(
    store: &mut Store,
    pool: Address,
    lender: Address,
    transferors: &[Address],
) {
    let (mut list, _) = store
        .transferor_lists
        .load_or_create(&transferor_list_id(pool, lender), || {
            LpTransferorList::new(pool, lender)
        });
    for t in transferors {
        push_unique(&mut list.transferors, *t);
    }
    store.transferor_lists.save(list);
}

pub fn revoke_transferors(
    store: &mut Store,
    pool: Address,
    lender: Address,
    transferors: &[Address],
) {
    let Some(mut list) = store.transferor_lists.load(&transferor_list_id(pool, lender)) else {
        return;
    };
    for t in transferors {
        remove_item(&mut list.transferors, t);
    }
    if list.transferors.is_empty() {
        store.transferor_lists.remove(&list.id);
    } else {
        store.transferor_lists.save(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: Address = Address::repeat_byte(1);
    const OWNER: Address = Address::repeat_byte(2);
    const SPENDER: Address = Address::repeat_byte(3);

    fn amount(store: &Store, index: u32) -> Option<U256> {
        let list = allowance_list_id(POOL, OWNER, SPENDER);
        store
            .allowances
            .get(&allowance_id(&list, index))
            .map(|a| a.amount)
    }

    #[test]
    fn test_increase_accumulates() {
        let mut store = Store::new();
        increase(&mut store, POOL, OWNER, SPENDER, &[10, 11], &[U256::from(5u64), U256::from(7u64)]);
        increase(&mut store, POOL, OWNER, SPENDER, &[10], &[U256::from(1u64)]);

        assert_eq!(amount(&store, 10), Some(U256::from(6u64)));
        assert_eq!(amount(&store, 11), Some(U256::from(7u64)));
        assert_eq!(store.allowance_lists.len(), 1);
    }

    #[test]
    fn test_decrease_in_place_then_delete_and_prune() {
        let mut store = Store::new();
        increase(&mut store, POOL, OWNER, SPENDER, &[10], &[U256::from(5u64)]);

        decrease(&mut store, POOL, OWNER, SPENDER, &[10], &[U256::from(2u64)]);
        assert_eq!(amount(&store, 10), Some(U256::from(3u64)));

        decrease(&mut store, POOL, OWNER, SPENDER, &[10], &[U256::from(9u64)]);
        assert_eq!(amount(&store, 10), None);
        assert!(store.allowance_lists.is_empty());
    }

    #[test]
    fn test_revoke_prunes_list() {
        let mut store = Store::new();
        increase(&mut store, POOL, OWNER, SPENDER, &[1, 2], &[U256::from(1u64), U256::from(1u64)]);

        revoke(&mut store, POOL, OWNER, SPENDER, &[1]);
        assert_eq!(store.allowance_lists.len(), 1);

        revoke(&mut store, POOL, OWNER, SPENDER, &[2]);
        assert!(store.allowance_lists.is_empty());
        assert!(store.allowances.is_empty());
    }

    #[test]
    fn test_consume_removes_allowance() {
        let mut store = Store::new();
        increase(&mut store, POOL, OWNER, SPENDER, &[4], &[U256::from(8u64)]);

        assert_eq!(consume(&mut store, POOL, OWNER, SPENDER, 4), Some(U256::from(8u64)));
        assert_eq!(consume(&mut store, POOL, OWNER, SPENDER, 4), None);
        assert!(store.allowance_lists.is_empty());
    }

    #[test]
    fn test_transferors_unique_and_pruned() {
        let mut store = Store::new();
        let t = Address::repeat_byte(9);

        approve_transferors(&mut store, POOL, OWNER, &[t, t]);
        let list = store.transferor_lists.get(&transferor_list_id(POOL, OWNER)).unwrap();
        assert_eq!(list.transferors, vec![t]);

        revoke_transferors(&mut store, POOL, OWNER, &[t]);
        assert!(store.transferor_lists.is_empty());
    }
}

//! Cross-pool account aggregates.

use alloy::primitives::Address;

use crate::ids::{address_id, EntityId};
use crate::store::{push_unique, remove_item, Account, Store};

/// Count a transaction by `address` in `pool` and apply `update`.
pub fn touch(
    store: &mut Store,
    address: Address,
    pool: &EntityId,
    update: impl FnOnce(&mut Account),
) {
    let (mut account, _) = store
        .accounts
        .load_or_create(&address_id(address), || Account::new(address));
    push_unique(&mut account.pools, pool.clone());
    account.tx_count += 1;
    update(&mut account);
    store.accounts.save(account);
}

/// Apply `update` to `address` without counting a transaction.
pub fn link(store: &mut Store, address: Address, update: impl FnOnce(&mut Account)) {
    let (mut account, _) = store
        .accounts
        .load_or_create(&address_id(address), || Account::new(address));
    update(&mut account);
    store.accounts.save(account);
}

/// Add or drop `lend` from the account's lend list.
pub fn set_lend_membership(store: &mut Store, address: Address, lend: &EntityId, member: bool) {
    link(store, address, |a| {
        if member {
            push_unique(&mut a.lends, lend.clone());
        } else {
            remove_item(&mut a.lends, lend);
        }
    });
}

/// Add or drop `loan` from the account's loan list.
pub fn set_loan_membership(store: &mut Store, address: Address, loan: &EntityId, member: bool) {
    link(store, address, |a| {
        if member {
            push_unique(&mut a.loans, loan.clone());
        } else {
            remove_item(&mut a.loans, loan);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_counts_and_links_pool() {
        let mut store = Store::new();
        let addr = Address::repeat_byte(3);
        let pool = EntityId::from(Address::repeat_byte(1));

        touch(&mut store, addr, &pool, |_| {});
        touch(&mut store, addr, &pool, |_| {});

        let account = store.accounts.get(&address_id(addr)).unwrap();
        assert_eq!(account.tx_count, 2);
        assert_eq!(account.pools, vec![pool]);
    }

    #[test]
    fn test_lend_membership() {
        let mut store = Store::new();
        let addr = Address::repeat_byte(3);
        let lend = EntityId::from(Address::repeat_byte(9));

        set_lend_membership(&mut store, addr, &lend, true);
        set_lend_membership(&mut store, addr, &lend, true);
        assert_eq!(store.accounts.get(&address_id(addr)).unwrap().lends.len(), 1);

        set_lend_membership(&mut store, addr, &lend, false);
        assert!(store.accounts.get(&address_id(addr)).unwrap().lends.is_empty());
    }
}

//! Deterministic entity keys.
//!
//! Every key is a byte string concatenated from stable components, so
//! processing the same event twice always lands on the same records.

use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

const BUCKET_SEP: u8 = b'#';
const SEP: u8 = b'|';

/// Opaque store key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Bytes);

impl EntityId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn join(parts: &[&[u8]]) -> Self {
        let len = parts.iter().map(|p| p.len()).sum();
        let mut buf = Vec::with_capacity(len);
        for part in parts {
            buf.extend_from_slice(part);
        }
        Self(Bytes::from(buf))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Address> for EntityId {
    fn from(addr: Address) -> Self {
        Self(Bytes::copy_from_slice(addr.as_slice()))
    }
}

/// Pool, account and token records are keyed by their address.
pub fn address_id(addr: Address) -> EntityId {
    EntityId::from(addr)
}

/// `pool ‖ '#' ‖ index`
pub fn bucket_id(pool: Address, index: u32) -> EntityId {
    EntityId::join(&[
        pool.as_slice(),
        &[BUCKET_SEP],
        index.to_string().as_bytes(),
    ])
}

/// `bucketId ‖ '|' ‖ lender`
pub fn lend_id(bucket: &EntityId, lender: Address) -> EntityId {
    EntityId::join(&[bucket.as_bytes(), &[SEP], lender.as_slice()])
}

/// `pool ‖ '|' ‖ borrower`
pub fn loan_id(pool: Address, borrower: Address) -> EntityId {
    EntityId::join(&[pool.as_slice(), &[SEP], borrower.as_slice()])
}

/// `pool ‖ '|' ‖ loanId ‖ '|' ‖ kickBlock`
pub fn auction_id(pool: Address, loan: &EntityId, kick_block: u64) -> EntityId {
    EntityId::join(&[
        pool.as_slice(),
        &[SEP],
        loan.as_bytes(),
        &[SEP],
        kick_block.to_string().as_bytes(),
    ])
}

/// `txHash ‖ logIndex` (log index as 4 big-endian bytes)
pub fn event_id(tx_hash: B256, log_index: u64) -> EntityId {
    let idx = u32::try_from(log_index).unwrap_or(u32::MAX);
    EntityId::join(&[tx_hash.as_slice(), &idx.to_be_bytes()])
}

/// `pool ‖ '|' ‖ burnEpoch`
pub fn reserve_process_id(pool: Address, epoch: U256) -> EntityId {
    EntityId::join(&[pool.as_slice(), &[SEP], epoch.to_string().as_bytes()])
}

/// `pool ‖ '|' ‖ owner ‖ '|' ‖ spender`
pub fn allowance_list_id(pool: Address, owner: Address, spender: Address) -> EntityId {
    EntityId::join(&[
        pool.as_slice(),
        &[SEP],
        owner.as_slice(),
        &[SEP],
        spender.as_slice(),
    ])
}

/// `allowanceListId ‖ '|' ‖ index`
pub fn allowance_id(list: &EntityId, index: u32) -> EntityId {
    EntityId::join(&[list.as_bytes(), &[SEP], index.to_string().as_bytes()])
}

/// `pool ‖ '|' ‖ lender`
pub fn transferor_list_id(pool: Address, lender: Address) -> EntityId {
    EntityId::join(&[pool.as_slice(), &[SEP], lender.as_slice()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_id_layout() {
        let pool = Address::repeat_byte(0x11);
        let id = bucket_id(pool, 3696);

        let bytes = id.as_bytes();
        assert_eq!(&bytes[..20], pool.as_slice());
        assert_eq!(bytes[20], b'#');
        assert_eq!(&bytes[21..], b"3696");
    }

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let pool = Address::repeat_byte(1);
        let lender = Address::repeat_byte(2);

        assert_eq!(bucket_id(pool, 1), bucket_id(pool, 1));
        assert_ne!(bucket_id(pool, 1), bucket_id(pool, 10));

        let b = bucket_id(pool, 1);
        assert_ne!(lend_id(&b, lender), loan_id(pool, lender));
    }

    #[test]
    fn test_auction_id_distinguishes_kick_blocks() {
        let pool = Address::repeat_byte(1);
        let loan = loan_id(pool, Address::repeat_byte(2));

        assert_ne!(auction_id(pool, &loan, 100), auction_id(pool, &loan, 101));
    }

    #[test]
    fn test_event_id_next_log_index() {
        let tx = B256::repeat_byte(9);
        let a = event_id(tx, 7);
        let b = event_id(tx, 8);

        assert_eq!(a.as_bytes().len(), 36);
        assert_eq!(&a.as_bytes()[32..], &[0, 0, 0, 7]);
        assert_ne!(a, b);
    }
}

//! Indexer errors. Every variant aborts the event being processed.

use indexer_chain::{DecodeError, ReadError, SourceError};
use thiserror::Error;

use crate::ids::EntityId;
use crate::store::SnapshotError;

#[derive(Debug, Error)]
pub enum IndexerError {
    /// A record the handler relies on was never created.
    #[error("{kind} {id} expected but not found")]
    MissingEntity { kind: &'static str, id: EntityId },

    /// `BucketTake` arrived without its staged `BucketTakeLPAwarded`.
    #[error("no staged LP award at {id} for bucket take")]
    MissingLpAward { id: EntityId },

    #[error("calldata decode failed: {0}")]
    Calldata(#[from] DecodeError),

    #[error("chain read failed: {0}")]
    Read(#[from] ReadError),

    #[error("log fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl IndexerError {
    pub fn missing<T: crate::store::Entity>(id: &EntityId) -> Self {
        Self::MissingEntity {
            kind: T::KIND,
            id: id.clone(),
        }
    }
}

pub type Result<T, E = IndexerError> = std::result::Result<T, E>;

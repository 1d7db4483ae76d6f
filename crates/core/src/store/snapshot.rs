//! JSON snapshots of the store.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::Store;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Position of the last applied event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    pub block: u64,
    pub tx_index: u64,
    pub log_index: u64,
}

impl Cursor {
    pub fn position(&self) -> (u64, u64, u64) {
        (self.block, self.tx_index, self.log_index)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Store {
    /// Write the store to `path` via a temp file and rename.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(io_err(dir))?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(self)?;
        fs::write(&tmp, &bytes).map_err(io_err(&tmp))?;
        fs::rename(&tmp, path).map_err(io_err(path))?;

        debug!(
            path = %path.display(),
            bytes = bytes.len(),
            cursor = ?self.cursor,
            "Snapshot written"
        );
        Ok(())
    }

    /// Load a snapshot, or an empty store when `path` does not exist.
    pub fn load_snapshot(path: &Path) -> Result<Self, SnapshotError> {
        if !path.exists() {
            info!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(Self::default());
        }

        let bytes = fs::read(path).map_err(io_err(path))?;
        let store: Store = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            pools = store.pools.len(),
            cursor = ?store.cursor,
            "Snapshot loaded"
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Bucket, Diagnostic, Lend, Provenance};
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_snapshot_restores_store() {
        let dir = std::env::temp_dir().join(format!("indexer-snapshot-{}", std::process::id()));
        let path = dir.join("store.json");

        let mut store = Store::new();
        let pool = Address::repeat_byte(1);
        let mut bucket = Bucket::new(pool, 2500);
        bucket.deposit = U256::from(42u64);
        let lend = Lend::new(&bucket, Address::repeat_byte(2));
        bucket.lends.push(lend.id.clone());
        store.buckets.save(bucket.clone());
        store.lends.save(lend);
        store.diagnose(Diagnostic::NftPartition {
            pool,
            overlapping: vec![U256::from(7u64)],
            unmatched: Vec::new(),
            at: Provenance::default(),
        });
        store.cursor = Some(Cursor {
            block: 10,
            tx_index: 1,
            log_index: 4,
        });

        store.save_snapshot(&path).unwrap();
        let restored = Store::load_snapshot(&path).unwrap();

        assert_eq!(restored.buckets.get(&bucket.id), Some(&bucket));
        assert_eq!(restored.lends.len(), 1);
        assert_eq!(restored.diagnostics.len(), 1);
        assert_eq!(restored.cursor.unwrap().position(), (10, 1, 4));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let path = std::env::temp_dir().join("indexer-snapshot-does-not-exist.json");
        let store = Store::load_snapshot(&path).unwrap();
        assert!(store.pools.is_empty());
        assert!(store.cursor.is_none());
    }
}

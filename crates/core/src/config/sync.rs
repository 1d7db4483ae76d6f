//! Sync and persistence settings with profile support.
//!
//! A profile (`default`, `backfill`, `live`) provides the base `[sync]`
//! values; fields set in the config file override it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Block range and follow-head behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// First block to index when no snapshot exists
    #[serde(default)]
    pub start_block: u64,

    /// Blocks per `eth_getLogs` range
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Blocks kept behind the head
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    /// Head polling interval once caught up (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Cross-check tracked LP against `lenderInfo` after every LP change
    #[serde(default)]
    pub verify_lend_balances: bool,
}

fn default_profile_name() -> String {
    "default".to_string()
}
fn default_batch_size() -> u64 {
    2_000
}
fn default_confirmations() -> u64 {
    12
}
fn default_poll_interval() -> u64 {
    4_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            start_block: 0,
            batch_size: default_batch_size(),
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval(),
            verify_lend_balances: false,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Large ranges, no drift checks.
    pub fn backfill() -> Self {
        Self {
            profile: "backfill".to_string(),
            batch_size: 10_000,
            confirmations: 64,
            poll_interval_ms: 12_000,
            ..Default::default()
        }
    }

    /// Small ranges close to the head, with drift checks.
    pub fn live() -> Self {
        Self {
            profile: "live".to_string(),
            batch_size: 200,
            confirmations: 3,
            poll_interval_ms: 1_000,
            verify_lend_balances: true,
            ..Default::default()
        }
    }

    /// Resolve a profile by name; unknown names fall back to the default.
    pub fn profile(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "backfill" | "historical" => Self::backfill(),
            "live" | "head" => Self::live(),
            _ => Self::default(),
        }
    }

    pub fn apply(&mut self, overrides: &SyncOverrides) {
        if let Some(v) = overrides.start_block {
            self.start_block = v;
        }
        if let Some(v) = overrides.batch_size {
            self.batch_size = v.max(1);
        }
        if let Some(v) = overrides.confirmations {
            self.confirmations = v;
        }
        if let Some(v) = overrides.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = overrides.verify_lend_balances {
            self.verify_lend_balances = v;
        }
    }
}

/// `[sync]` as written in the config file; unset fields keep the profile value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOverrides {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<u64>,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub verify_lend_balances: Option<bool>,
}

/// Snapshot persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Snapshot file; no snapshots are written when unset
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: Option<PathBuf>,

    /// Write a snapshot every N applied batches
    #[serde(default = "default_snapshot_every")]
    pub snapshot_every_batches: u64,
}

fn default_snapshot_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/store.json"))
}
fn default_snapshot_every() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_every_batches: default_snapshot_every(),
        }
    }
}

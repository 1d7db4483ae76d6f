//! Chain endpoint and contract addresses.

use alloy::primitives::Address;
use indexer_chain::PoolKind;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// `[chain]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP RPC endpoint, `${VAR}` references are expanded
    pub rpc_url: String,
    /// Expected chain id; checked against the endpoint when set
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// `[contracts]` as written, before address resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub pool_info_utils: String,
    #[serde(default)]
    pub erc20_factory: Option<String>,
    #[serde(default)]
    pub erc721_factory: Option<String>,
    /// Pools indexed from the start block even if created earlier
    #[serde(default)]
    pub pools: Vec<PoolEntry>,
}

/// One `[[contracts.pools]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry {
    pub address: String,
    pub kind: PoolKind,
}

/// A configured pool with its address parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguredPool {
    pub address: Address,
    pub kind: PoolKind,
}

/// Resolved contract addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContracts {
    pub pool_info_utils: Address,
    pub erc20_factory: Option<Address>,
    pub erc721_factory: Option<Address>,
    pub pools: Vec<ConfiguredPool>,
}

impl ResolvedContracts {
    /// Factories whose `PoolCreated` logs are followed.
    pub fn factories(&self) -> Vec<Address> {
        self.erc20_factory
            .into_iter()
            .chain(self.erc721_factory)
            .collect()
    }
}

impl ChainConfig {
    /// Expand environment variables in config values.
    pub fn expand_env_vars(&mut self) {
        self.rpc_url = expand_env(&self.rpc_url);
    }
}

fn env_pattern() -> Option<&'static regex_lite::Regex> {
    static PATTERN: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| regex_lite::Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// Expand ${VAR_NAME} patterns with environment variable values.
///
/// Unset variables are left in place.
pub(crate) fn expand_env(s: &str) -> String {
    let mut result = s.to_string();
    let Some(pattern) = env_pattern() else {
        return result;
    };
    for cap in pattern.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }
    result
}

//! Transaction calldata decoding.
//!
//! Two events carry less than the indexer needs: `PoolCreated` says nothing
//! about the tokens, and `MergeOrRemoveCollateralNFT` omits the bucket
//! indexes it touched. Both are recovered from the transaction input.

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;

use crate::contracts::{
    erc20_non_subset_hash, IERC20PoolFactory, IERC721CollectionFactory, IERC721PoolCalls,
    IERC721SubsetFactory,
};
use crate::events::DecodeError;

/// Pool flavour as seen by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Erc20,
    Erc721,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc20 => "erc20",
            Self::Erc721 => "erc721",
        }
    }
}

/// Parameters of a decoded `deployPool` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPool {
    pub kind: PoolKind,
    pub collateral: Address,
    pub quote: Address,
    pub interest_rate: U256,
    /// Subset token ids; empty for collection pools and ERC-20 pools
    pub token_ids: Vec<U256>,
}

/// Decode a factory `deployPool` call.
///
/// The ERC-20 hash selects the single fungible shape; anything else is an
/// NFT pool, where the subset shape is tried before the collection shape.
pub fn decode_deploy_pool(input: &[u8], subset_hash: B256) -> Result<DeployPool, DecodeError> {
    if subset_hash == erc20_non_subset_hash() {
        let call = IERC20PoolFactory::deployPoolCall::abi_decode(input, true).map_err(
            |source| DecodeError::Abi {
                event: "deployPool(address,address,uint256)",
                source,
            },
        )?;
        return Ok(DeployPool {
            kind: PoolKind::Erc20,
            collateral: call.collateral_,
            quote: call.quote_,
            interest_rate: call.interestRate_,
            token_ids: Vec::new(),
        });
    }

    if let Ok(call) = IERC721SubsetFactory::deployPoolCall::abi_decode(input, true) {
        return Ok(DeployPool {
            kind: PoolKind::Erc721,
            collateral: call.collateral_,
            quote: call.quote_,
            interest_rate: call.interestRate_,
            token_ids: call.tokenIds_,
        });
    }

    if let Ok(call) = IERC721CollectionFactory::deployPoolCall::abi_decode(input, true) {
        return Ok(DeployPool {
            kind: PoolKind::Erc721,
            collateral: call.collateral_,
            quote: call.quote_,
            interest_rate: call.interestRate_,
            token_ids: Vec::new(),
        });
    }

    Err(DecodeError::NoCandidate {
        call: "deployPool",
        tried: "subset, collection".to_string(),
    })
}

/// Buckets named by a `mergeOrRemoveCollateral` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOrRemove {
    pub removal_indexes: Vec<u32>,
    pub no_of_nfts_to_remove: U256,
    pub to_index: u32,
}

fn narrow(value: U256) -> Result<u32, DecodeError> {
    u32::try_from(value).map_err(|_| DecodeError::IndexOutOfRange(value))
}

fn merge_from_call(
    call: IERC721PoolCalls::mergeOrRemoveCollateralCall,
) -> Result<MergeOrRemove, DecodeError> {
    Ok(MergeOrRemove {
        removal_indexes: call
            .removalIndexes_
            .into_iter()
            .map(narrow)
            .collect::<Result<_, _>>()?,
        no_of_nfts_to_remove: call.noOfNFTsToRemove_,
        to_index: narrow(call.toIndex_)?,
    })
}

/// Decode `mergeOrRemoveCollateral`, either called directly or wrapped in a
/// `multicall` batch (first matching inner call wins).
pub fn decode_merge_or_remove(input: &[u8]) -> Result<MergeOrRemove, DecodeError> {
    if let Ok(call) = IERC721PoolCalls::mergeOrRemoveCollateralCall::abi_decode(input, true) {
        return merge_from_call(call);
    }

    if let Ok(batch) = IERC721PoolCalls::multicallCall::abi_decode(input, true) {
        for inner in batch.data {
            if let Ok(call) =
                IERC721PoolCalls::mergeOrRemoveCollateralCall::abi_decode(&inner, true)
            {
                return merge_from_call(call);
            }
        }
    }

    Err(DecodeError::NoCandidate {
        call: "mergeOrRemoveCollateral",
        tried: "direct, multicall".to_string(),
    })
}

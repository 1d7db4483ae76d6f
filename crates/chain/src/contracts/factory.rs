//! Pool factory interfaces.
//!
//! The NFT factory has been deployed with two `deployPool` shapes over time,
//! so each shape gets its own interface and the decoder tries them in order.

use alloy::primitives::{keccak256, B256};
use alloy::sol;

sol! {
    #[derive(Debug)]
    interface IPoolFactory {
        event PoolCreated(address pool_, bytes32 subsetHash_);
    }
}

sol! {
    interface IERC20PoolFactory {
        function deployPool(address collateral_, address quote_, uint256 interestRate_) external returns (address pool_);
    }
}

sol! {
    interface IERC721SubsetFactory {
        function deployPool(address collateral_, address quote_, uint256[] tokenIds_, uint256 interestRate_) external returns (address pool_);
    }
}

sol! {
    interface IERC721CollectionFactory {
        function deployPool(address collateral_, address quote_, uint256 interestRate_) external returns (address pool_);
    }
}

/// keccak256("ERC20_NON_SUBSET_HASH")
pub fn erc20_non_subset_hash() -> B256 {
    keccak256("ERC20_NON_SUBSET_HASH")
}

/// keccak256("ERC721_NON_SUBSET_HASH")
pub fn erc721_non_subset_hash() -> B256 {
    keccak256("ERC721_NON_SUBSET_HASH")
}

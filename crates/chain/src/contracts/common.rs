//! Token interfaces shared by every pool.
//!
//! ERC-721 collections answer `name`, `symbol`, `balanceOf` and (when
//! enumerable) `totalSupply` with the same selectors as ERC-20, so one
//! interface serves both; only `decimals` is fungible-only.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
    }
}

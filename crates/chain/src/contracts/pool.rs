//! Pool contract interfaces.
//!
//! Fungible and NFT pools share most of their event ABI; the variants that
//! differ (`AddCollateralNFT`, `DrawDebtNFT`, `AuctionNFTSettle`,
//! `MergeOrRemoveCollateralNFT`) are declared alongside the shared ones so a
//! single signature table covers both pool kinds.

use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    /// Events emitted by fungible and NFT pools.
    #[derive(Debug)]
    interface IPoolEvents {
        event AddCollateral(address indexed actor, uint256 indexed index, uint256 amount, uint256 lpAwarded);
        event AddCollateralNFT(address indexed actor, uint256 indexed index, uint256[] tokenIds, uint256 lpAwarded);
        event AddQuoteToken(address indexed lender, uint256 indexed index, uint256 amount, uint256 lpAwarded, uint256 lup);
        event MoveQuoteToken(address indexed lender, uint256 indexed from, uint256 indexed to, uint256 amount, uint256 lpRedeemedFrom, uint256 lpAwardedTo, uint256 lup);
        event RemoveQuoteToken(address indexed lender, uint256 indexed index, uint256 amount, uint256 lpRedeemed, uint256 lup);
        event RemoveCollateral(address indexed claimer, uint256 indexed index, uint256 amount, uint256 lpRedeemed);
        event MergeOrRemoveCollateralNFT(address indexed actor, uint256 collateralMerged, uint256 toIndexLps);

        event DrawDebt(address indexed borrower, uint256 amountBorrowed, uint256 collateralPledged, uint256 lup);
        event DrawDebtNFT(address indexed borrower, uint256 amountBorrowed, uint256[] tokenIdsPledged, uint256 lup);
        event RepayDebt(address indexed borrower, uint256 quoteRepaid, uint256 collateralPulled, uint256 lup);
        event LoanStamped(address indexed borrower);

        event Kick(address indexed borrower, uint256 debt, uint256 collateral, uint256 bond);
        event Take(address indexed borrower, uint256 amount, uint256 collateral, uint256 bondChange, bool isReward);
        event BucketTake(address indexed borrower, uint256 index, uint256 amount, uint256 collateral, uint256 bondChange, bool isReward);
        event BucketTakeLPAwarded(address indexed taker, address indexed kicker, uint256 lpAwardedTaker, uint256 lpAwardedKicker);
        event Settle(address indexed borrower, uint256 settledDebt);
        event AuctionSettle(address indexed borrower, uint256 collateral);
        event AuctionNFTSettle(address indexed borrower, uint256 collateral, uint256 lp, uint256 index);
        event BondWithdrawn(address indexed kicker, address indexed reciever, uint256 amount);
        event BucketBankruptcy(uint256 indexed index, uint256 lpForfeited);

        event KickReserveAuction(uint256 claimableReservesRemaining, uint256 auctionPrice, uint256 currentBurnEpoch);
        event ReserveAuction(uint256 claimableReservesRemaining, uint256 auctionPrice, uint256 currentBurnEpoch);

        event IncreaseLPAllowance(address indexed owner, address indexed spender, uint256[] indexes, uint256[] amounts);
        event DecreaseLPAllowance(address indexed owner, address indexed spender, uint256[] indexes, uint256[] amounts);
        event RevokeLPAllowance(address indexed owner, address indexed spender, uint256[] indexes);
        event ApproveLPTransferors(address indexed lender, address[] transferors);
        event RevokeLPTransferors(address indexed lender, address[] transferors);
        event TransferLP(address owner, address newOwner, uint256[] indexes, uint256 lp);

        event ResetInterestRate(uint256 oldRate, uint256 newRate);
        event UpdateInterestRate(uint256 oldRate, uint256 newRate);
        event Flashloan(address indexed receiver, address indexed token, uint256 amount);
    }
}

sol! {
    /// Pool read surface (state owned by the pool contract itself).
    #[sol(rpc)]
    interface IPool {
        function auctionInfo(address borrower_) external view returns (
            address kicker_,
            uint256 bondFactor_,
            uint256 bondSize_,
            uint256 kickTime_,
            uint256 referencePrice_,
            uint256 neutralPrice_,
            uint256 debtToCollateral_,
            address head_,
            address next_,
            address prev_
        );
        function borrowerInfo(address borrower_) external view returns (uint256 t0Debt_, uint256 collateral_, uint256 npTpRatio_);
        function debtInfo() external view returns (uint256 debt_, uint256 accruedDebt_, uint256 debtInAuction_, uint256 t0Debt2ToCollateral_);
        function lenderInfo(uint256 index_, address lender_) external view returns (uint256 lpBalance_, uint256 depositTime_);
        function kickerInfo(address kicker_) external view returns (uint256 claimable_, uint256 locked_);
        function pledgedCollateral() external view returns (uint256);
        function interestRateInfo() external view returns (uint256 interestRate_, uint256 interestRateUpdate_);
        function currentBurnEpoch() external view returns (uint256);
        function burnInfo(uint256 burnEventEpoch_) external view returns (uint256 timestamp_, uint256 totalInterest_, uint256 totalBurned_);
        function collateralAddress() external pure returns (address);
        function quoteTokenAddress() external pure returns (address);
    }
}

sol! {
    /// NFT pool calls whose calldata the indexer decodes.
    interface IERC721PoolCalls {
        function mergeOrRemoveCollateral(uint256[] removalIndexes_, uint256 noOfNFTsToRemove_, uint256 toIndex_) external returns (uint256 collateralMerged_, uint256 bucketLP_);
        function multicall(bytes[] data) external returns (bytes[] results);
    }
}

/// Every pool event signature, for log filtering.
pub fn pool_event_signatures() -> Vec<B256> {
    use IPoolEvents::*;

    vec![
        AddCollateral::SIGNATURE_HASH,
        AddCollateralNFT::SIGNATURE_HASH,
        AddQuoteToken::SIGNATURE_HASH,
        MoveQuoteToken::SIGNATURE_HASH,
        RemoveQuoteToken::SIGNATURE_HASH,
        RemoveCollateral::SIGNATURE_HASH,
        MergeOrRemoveCollateralNFT::SIGNATURE_HASH,
        DrawDebt::SIGNATURE_HASH,
        DrawDebtNFT::SIGNATURE_HASH,
        RepayDebt::SIGNATURE_HASH,
        LoanStamped::SIGNATURE_HASH,
        Kick::SIGNATURE_HASH,
        Take::SIGNATURE_HASH,
        BucketTake::SIGNATURE_HASH,
        BucketTakeLPAwarded::SIGNATURE_HASH,
        Settle::SIGNATURE_HASH,
        AuctionSettle::SIGNATURE_HASH,
        AuctionNFTSettle::SIGNATURE_HASH,
        BondWithdrawn::SIGNATURE_HASH,
        BucketBankruptcy::SIGNATURE_HASH,
        KickReserveAuction::SIGNATURE_HASH,
        ReserveAuction::SIGNATURE_HASH,
        IncreaseLPAllowance::SIGNATURE_HASH,
        DecreaseLPAllowance::SIGNATURE_HASH,
        RevokeLPAllowance::SIGNATURE_HASH,
        ApproveLPTransferors::SIGNATURE_HASH,
        RevokeLPTransferors::SIGNATURE_HASH,
        TransferLP::SIGNATURE_HASH,
        ResetInterestRate::SIGNATURE_HASH,
        UpdateInterestRate::SIGNATURE_HASH,
        Flashloan::SIGNATURE_HASH,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use std::collections::HashSet;

    #[test]
    fn test_signatures_are_unique() {
        let sigs = pool_event_signatures();
        let unique: HashSet<_> = sigs.iter().collect();
        assert_eq!(unique.len(), sigs.len());
    }

    #[test]
    fn test_signature_matches_canonical_form() {
        assert_eq!(
            IPoolEvents::AddQuoteToken::SIGNATURE_HASH,
            keccak256("AddQuoteToken(address,uint256,uint256,uint256,uint256)")
        );
        assert_eq!(
            IPoolEvents::BucketTakeLPAwarded::SIGNATURE_HASH,
            keccak256("BucketTakeLPAwarded(address,address,uint256,uint256)")
        );
    }
}

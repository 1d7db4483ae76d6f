//! PoolInfoUtils: the shared read-only helper deployed once per chain.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IPoolInfoUtils {
        function auctionStatus(address ajnaPool_, address borrower_) external view returns (
            uint256 kickTime_,
            uint256 collateral_,
            uint256 debtToCover_,
            bool isCollateralized_,
            uint256 price_,
            uint256 neutralPrice_,
            uint256 referencePrice_,
            uint256 debtToCollateral_,
            uint256 bondFactor_
        );
        function borrowerInfo(address ajnaPool_, address borrower_) external view returns (
            uint256 debt_,
            uint256 collateral_,
            uint256 t0Np_,
            uint256 thresholdPrice_
        );
        function bucketInfo(address ajnaPool_, uint256 index_) external view returns (
            uint256 price_,
            uint256 quoteTokens_,
            uint256 collateral_,
            uint256 bucketLP_,
            uint256 scale_,
            uint256 exchangeRate_
        );
        function lpToQuoteTokens(address ajnaPool_, uint256 lp_, uint256 index_) external view returns (uint256 quoteAmount_);
        function poolLoansInfo(address ajnaPool_) external view returns (
            uint256 poolSize_,
            uint256 loansCount_,
            address maxBorrower_,
            uint256 pendingInflator_,
            uint256 pendingInterestFactor_
        );
        function poolPricesInfo(address ajnaPool_) external view returns (
            uint256 hpb_,
            uint256 hpbIndex_,
            uint256 htp_,
            uint256 htpIndex_,
            uint256 lup_,
            uint256 lupIndex_
        );
        function poolReservesInfo(address ajnaPool_) external view returns (
            uint256 reserves_,
            uint256 claimableReserves_,
            uint256 claimableReservesRemaining_,
            uint256 auctionPrice_,
            uint256 timeRemaining_
        );
        function poolUtilizationInfo(address ajnaPool_) external view returns (
            uint256 poolMinDebtAmount_,
            uint256 poolCollateralization_,
            uint256 poolActualUtilization_,
            uint256 poolTargetUtilization_
        );
        function borrowFeeRate(address ajnaPool_) external view returns (uint256);
        function depositFeeRate(address ajnaPool_) external view returns (uint256);
        function lenderInterestMargin(address ajnaPool_) external view returns (uint256);
    }
}

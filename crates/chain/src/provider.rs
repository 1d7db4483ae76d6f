//! Alloy-backed chain-state reader.
//! Uses typed `sol!` contract calls against the pool and PoolInfoUtils.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::eips::BlockId;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::contracts::{IPool, IPoolInfoUtils, IERC20};
use crate::reader::{
    AuctionInfo, AuctionStatus, BorrowerInfo, BucketInfo, BurnInfo, ChainStateReader, DebtInfo,
    KickerInfo, LenderInfo, LoansInfo, PoolTokens, PricesInfo, RatesInfo, ReadError,
    ReservesInfo, TokenInfo, UtilizationInfo, DEFAULT_DECIMALS, UNKNOWN_NAME, UNKNOWN_SYMBOL,
};

/// Whether a failed call reverted (or returned nothing decodable) as opposed
/// to failing in transit.
fn is_revert(err: &alloy::contract::Error) -> bool {
    match err {
        alloy::contract::Error::TransportError(e) => e.as_error_resp().is_some(),
        alloy::contract::Error::ZeroData(..) | alloy::contract::Error::AbiError(_) => true,
        _ => false,
    }
}

/// Resolve a call result: `Ok(None)` when it reverted, error on transport failure.
fn settle<T>(
    call: &'static str,
    target: Address,
    result: Result<T, alloy::contract::Error>,
) -> Result<Option<T>, ReadError> {
    match result {
        Ok(ret) => Ok(Some(ret)),
        Err(e) if is_revert(&e) => {
            warn!(call, target = %target, error = %e, "Read reverted, using default");
            Ok(None)
        }
        Err(e) => Err(ReadError::Transport {
            call,
            target,
            message: e.to_string(),
        }),
    }
}

fn narrow_index(value: U256) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Chain-state reader over an HTTP provider.
///
/// Token metadata is immutable and cached per address.
pub struct AlloyReader {
    provider: DynProvider,
    pool_info_utils: Address,
    /// Pinned block; 0 reads at latest
    block: AtomicU64,
    tokens: DashMap<Address, TokenInfo>,
}

impl AlloyReader {
    /// Connect to `rpc_url` and verify the endpoint answers.
    pub async fn connect(rpc_url: &str, pool_info_utils: Address) -> Result<Self, ReadError> {
        let url = rpc_url
            .parse()
            .map_err(|_| ReadError::InvalidUrl(rpc_url.to_string()))?;
        let provider = ProviderBuilder::new().on_http(url).erased();

        let block = provider
            .get_block_number()
            .await
            .map_err(|e| ReadError::Rpc(e.to_string()))?;
        info!(block, pool_info_utils = %pool_info_utils, "Reader connection verified");

        Ok(Self {
            provider,
            pool_info_utils,
            block: AtomicU64::new(0),
            tokens: DashMap::new(),
        })
    }

    /// Underlying provider, shared with the log source.
    pub fn provider(&self) -> DynProvider {
        self.provider.clone()
    }

    /// Chain id of the connected endpoint.
    pub async fn chain_id(&self) -> Result<u64, ReadError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ReadError::Rpc(e.to_string()))
    }

    fn at(&self) -> BlockId {
        match self.block.load(Ordering::Relaxed) {
            0 => BlockId::latest(),
            n => BlockId::number(n),
        }
    }
}

#[async_trait]
impl ChainStateReader for AlloyReader {
    fn pin_block(&self, block: u64) {
        self.block.store(block, Ordering::Relaxed);
    }

    async fn bucket_info(&self, pool: Address, index: u32) -> Result<BucketInfo, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .bucketInfo(pool, U256::from(index))
            .block(self.at())
            .call()
            .await;

        Ok(settle("bucketInfo", pool, result)?
            .map(|r| BucketInfo {
                price: r.price_,
                quote_tokens: r.quoteTokens_,
                collateral: r.collateral_,
                bucket_lp: r.bucketLP_,
                scale: r.scale_,
                exchange_rate: r.exchangeRate_,
            })
            .unwrap_or_default())
    }

    async fn lender_info(
        &self,
        pool: Address,
        index: u32,
        lender: Address,
    ) -> Result<LenderInfo, ReadError> {
        let result = IPool::new(pool, &self.provider)
            .lenderInfo(U256::from(index), lender)
            .block(self.at())
            .call()
            .await;

        Ok(settle("lenderInfo", pool, result)?
            .map(|r| LenderInfo {
                lp_balance: r.lpBalance_,
                deposit_time: r.depositTime_,
            })
            .unwrap_or_default())
    }

    async fn lp_to_quote_tokens(
        &self,
        pool: Address,
        lp: U256,
        index: u32,
    ) -> Result<U256, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .lpToQuoteTokens(pool, lp, U256::from(index))
            .block(self.at())
            .call()
            .await;

        Ok(settle("lpToQuoteTokens", pool, result)?
            .map(|r| r.quoteAmount_)
            .unwrap_or_default())
    }

    async fn borrower_info(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<BorrowerInfo, ReadError> {
        let at = self.at();
        let pool_contract = IPool::new(pool, &self.provider);
        let utils = IPoolInfoUtils::new(self.pool_info_utils, &self.provider);
        let pool_call = pool_contract.borrowerInfo(borrower).block(at);
        let utils_call = utils.borrowerInfo(pool, borrower).block(at);

        let (from_pool, from_utils) = tokio::join!(pool_call.call(), utils_call.call());
        let from_pool = settle("borrowerInfo", pool, from_pool)?;
        let from_utils = settle("poolInfoUtils.borrowerInfo", pool, from_utils)?;

        let mut info = BorrowerInfo::default();
        if let Some(r) = from_pool {
            info.t0_debt = r.t0Debt_;
            info.collateral = r.collateral_;
            info.np_tp_ratio = r.npTpRatio_;
        }
        if let Some(r) = from_utils {
            info.debt = r.debt_;
            info.collateral = r.collateral_;
            info.t0_neutral_price = r.t0Np_;
            info.threshold_price = r.thresholdPrice_;
        }
        Ok(info)
    }

    async fn auction_info(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<AuctionInfo, ReadError> {
        let result = IPool::new(pool, &self.provider)
            .auctionInfo(borrower)
            .block(self.at())
            .call()
            .await;

        Ok(settle("auctionInfo", pool, result)?
            .map(|r| AuctionInfo {
                kicker: r.kicker_,
                bond_factor: r.bondFactor_,
                bond_size: r.bondSize_,
                kick_time: r.kickTime_,
                reference_price: r.referencePrice_,
                neutral_price: r.neutralPrice_,
                debt_to_collateral: r.debtToCollateral_,
                head: r.head_,
                next: r.next_,
                prev: r.prev_,
            })
            .unwrap_or_default())
    }

    async fn auction_status(
        &self,
        pool: Address,
        borrower: Address,
    ) -> Result<AuctionStatus, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .auctionStatus(pool, borrower)
            .block(self.at())
            .call()
            .await;

        Ok(settle("auctionStatus", pool, result)?
            .map(|r| AuctionStatus {
                kick_time: r.kickTime_,
                collateral: r.collateral_,
                debt_to_cover: r.debtToCover_,
                is_collateralized: r.isCollateralized_,
                price: r.price_,
                neutral_price: r.neutralPrice_,
                reference_price: r.referencePrice_,
                debt_to_collateral: r.debtToCollateral_,
                bond_factor: r.bondFactor_,
            })
            .unwrap_or_default())
    }

    async fn kicker_info(&self, pool: Address, kicker: Address) -> Result<KickerInfo, ReadError> {
        let result = IPool::new(pool, &self.provider)
            .kickerInfo(kicker)
            .block(self.at())
            .call()
            .await;

        Ok(settle("kickerInfo", pool, result)?
            .map(|r| KickerInfo {
                claimable: r.claimable_,
                locked: r.locked_,
            })
            .unwrap_or_default())
    }

    async fn debt_info(&self, pool: Address) -> Result<DebtInfo, ReadError> {
        let result = IPool::new(pool, &self.provider).debtInfo().block(self.at()).call().await;

        Ok(settle("debtInfo", pool, result)?
            .map(|r| DebtInfo {
                debt: r.debt_,
                accrued_debt: r.accruedDebt_,
                debt_in_auction: r.debtInAuction_,
                t0_debt2_to_collateral: r.t0Debt2ToCollateral_,
            })
            .unwrap_or_default())
    }

    async fn loans_info(&self, pool: Address) -> Result<LoansInfo, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .poolLoansInfo(pool)
            .block(self.at())
            .call()
            .await;

        Ok(settle("poolLoansInfo", pool, result)?
            .map(|r| LoansInfo {
                pool_size: r.poolSize_,
                loans_count: u64::try_from(r.loansCount_).unwrap_or(u64::MAX),
                max_borrower: r.maxBorrower_,
                pending_inflator: r.pendingInflator_,
                pending_interest_factor: r.pendingInterestFactor_,
            })
            .unwrap_or_default())
    }

    async fn prices_info(&self, pool: Address) -> Result<PricesInfo, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .poolPricesInfo(pool)
            .block(self.at())
            .call()
            .await;

        Ok(settle("poolPricesInfo", pool, result)?
            .map(|r| PricesInfo {
                hpb: r.hpb_,
                hpb_index: narrow_index(r.hpbIndex_),
                htp: r.htp_,
                htp_index: narrow_index(r.htpIndex_),
                lup: r.lup_,
                lup_index: narrow_index(r.lupIndex_),
            })
            .unwrap_or_default())
    }

    async fn reserves_info(&self, pool: Address) -> Result<ReservesInfo, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .poolReservesInfo(pool)
            .block(self.at())
            .call()
            .await;

        Ok(settle("poolReservesInfo", pool, result)?
            .map(|r| ReservesInfo {
                reserves: r.reserves_,
                claimable_reserves: r.claimableReserves_,
                claimable_reserves_remaining: r.claimableReservesRemaining_,
                auction_price: r.auctionPrice_,
                time_remaining: r.timeRemaining_,
            })
            .unwrap_or_default())
    }

    async fn utilization_info(&self, pool: Address) -> Result<UtilizationInfo, ReadError> {
        let result = IPoolInfoUtils::new(self.pool_info_utils, &self.provider)
            .poolUtilizationInfo(pool)
            .block(self.at())
            .call()
            .await;

        Ok(settle("poolUtilizationInfo", pool, result)?
            .map(|r| UtilizationInfo {
                min_debt_amount: r.poolMinDebtAmount_,
                collateralization: r.poolCollateralization_,
                actual_utilization: r.poolActualUtilization_,
                target_utilization: r.poolTargetUtilization_,
            })
            .unwrap_or_default())
    }

    async fn rates_info(&self, pool: Address) -> Result<RatesInfo, ReadError> {
        let at = self.at();
        let pool_contract = IPool::new(pool, &self.provider);
        let utils = IPoolInfoUtils::new(self.pool_info_utils, &self.provider);
        let rate_call = pool_contract.interestRateInfo().block(at);
        let borrow_fee_call = utils.borrowFeeRate(pool).block(at);
        let deposit_fee_call = utils.depositFeeRate(pool).block(at);
        let margin_call = utils.lenderInterestMargin(pool).block(at);

        let (rate, borrow_fee, deposit_fee, margin) = tokio::join!(
            rate_call.call(),
            borrow_fee_call.call(),
            deposit_fee_call.call(),
            margin_call.call()
        );

        let mut info = RatesInfo::default();
        if let Some(r) = settle("interestRateInfo", pool, rate)? {
            info.interest_rate = r.interestRate_;
            info.interest_rate_update = r.interestRateUpdate_;
        }
        if let Some(r) = settle("borrowFeeRate", pool, borrow_fee)? {
            info.borrow_fee_rate = r._0;
        }
        if let Some(r) = settle("depositFeeRate", pool, deposit_fee)? {
            info.deposit_fee_rate = r._0;
        }
        if let Some(r) = settle("lenderInterestMargin", pool, margin)? {
            info.lender_interest_margin = r._0;
        }
        Ok(info)
    }

    async fn pledged_collateral(&self, pool: Address) -> Result<U256, ReadError> {
        let result = IPool::new(pool, &self.provider)
            .pledgedCollateral()
            .block(self.at())
            .call()
            .await;
        Ok(settle("pledgedCollateral", pool, result)?
            .map(|r| r._0)
            .unwrap_or_default())
    }

    async fn current_burn_epoch(&self, pool: Address) -> Result<U256, ReadError> {
        let result = IPool::new(pool, &self.provider)
            .currentBurnEpoch()
            .block(self.at())
            .call()
            .await;
        Ok(settle("currentBurnEpoch", pool, result)?
            .map(|r| r._0)
            .unwrap_or_default())
    }

    async fn burn_info(&self, pool: Address, epoch: U256) -> Result<BurnInfo, ReadError> {
        let result = IPool::new(pool, &self.provider)
            .burnInfo(epoch)
            .block(self.at())
            .call()
            .await;

        Ok(settle("burnInfo", pool, result)?
            .map(|r| BurnInfo {
                timestamp: r.timestamp_,
                total_interest: r.totalInterest_,
                total_burned: r.totalBurned_,
            })
            .unwrap_or_default())
    }

    async fn pool_tokens(&self, pool: Address) -> Result<PoolTokens, ReadError> {
        let contract = IPool::new(pool, &self.provider);
        let collateral_call = contract.collateralAddress();
        let quote_call = contract.quoteTokenAddress();
        let (collateral, quote) = tokio::join!(collateral_call.call(), quote_call.call());

        Ok(PoolTokens {
            collateral: settle("collateralAddress", pool, collateral)?
                .map(|r| r._0)
                .unwrap_or_default(),
            quote: settle("quoteTokenAddress", pool, quote)?
                .map(|r| r._0)
                .unwrap_or_default(),
        })
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ReadError> {
        if let Some(cached) = self.tokens.get(&token) {
            return Ok(cached.clone());
        }

        let contract = IERC20::new(token, &self.provider);
        let name_call = contract.name();
        let symbol_call = contract.symbol();
        let decimals_call = contract.decimals();
        let supply_call = contract.totalSupply();

        let (name, symbol, decimals, supply) = tokio::join!(
            name_call.call(),
            symbol_call.call(),
            decimals_call.call(),
            supply_call.call()
        );

        let info = TokenInfo {
            name: settle("name", token, name)?
                .map(|r| r._0)
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            symbol: settle("symbol", token, symbol)?
                .map(|r| r._0)
                .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
            decimals: settle("decimals", token, decimals)?
                .map(|r| r._0)
                .unwrap_or(DEFAULT_DECIMALS),
            total_supply: settle("totalSupply", token, supply)?
                .map(|r| r._0)
                .unwrap_or_default(),
        };

        debug!(token = %token, symbol = %info.symbol, decimals = info.decimals, "Token metadata cached");
        self.tokens.insert(token, info.clone());
        Ok(info)
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ReadError> {
        let result = IERC20::new(token, &self.provider)
            .balanceOf(holder)
            .block(self.at())
            .call()
            .await;
        Ok(settle("balanceOf", token, result)?
            .map(|r| r._0)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::contract::Error as CallError;
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::transports::{TransportError, TransportErrorKind};

    fn decode_error() -> alloy::dyn_abi::Error {
        alloy::dyn_abi::Error::from(alloy::sol_types::Error::Overrun)
    }

    fn reverted_resp() -> CallError {
        CallError::TransportError(TransportError::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        }))
    }

    #[test]
    fn test_reverts_settle_to_default() {
        let target = Address::repeat_byte(0xaa);
        for err in [
            CallError::ZeroData("bucketInfo".to_string(), decode_error()),
            CallError::AbiError(decode_error()),
            reverted_resp(),
        ] {
            assert!(is_revert(&err));
            let settled: Result<Option<U256>, ReadError> = settle("bucketInfo", target, Err(err));
            assert!(matches!(settled, Ok(None)));
        }
    }

    #[test]
    fn test_transport_failure_propagates() {
        let target = Address::repeat_byte(0xaa);
        let err = CallError::TransportError(TransportErrorKind::custom_str("connection refused"));
        assert!(!is_revert(&err));

        let settled: Result<Option<U256>, ReadError> = settle("debtInfo", target, Err(err));
        match settled {
            Err(ReadError::Transport { call, target: t, message }) => {
                assert_eq!(call, "debtInfo");
                assert_eq!(t, target);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_successful_call_passes_through() {
        let settled = settle("loansInfo", Address::ZERO, Ok(U256::from(7u64)));
        assert!(matches!(settled, Ok(Some(v)) if v == U256::from(7u64)));
    }

    #[test]
    fn test_narrow_index_saturates() {
        assert_eq!(narrow_index(U256::from(4156u64)), 4156);
        assert_eq!(narrow_index(U256::MAX), u32::MAX);
    }

    #[tokio::test]
    #[ignore] // Requires network: ETH_RPC_URL and AJNA_POOL_INFO_UTILS
    async fn test_reader_connects() {
        let rpc_url = std::env::var("ETH_RPC_URL").unwrap();
        let utils = std::env::var("AJNA_POOL_INFO_UTILS")
            .unwrap()
            .parse()
            .unwrap();
        let reader = AlloyReader::connect(&rpc_url, utils).await;

        assert!(reader.is_ok());
    }
}

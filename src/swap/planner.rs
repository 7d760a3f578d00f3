use crate::error::WalletError;
use crate::execution::multicall::{BatchedCall, Multicall};
use crate::execution::rpc_client::RpcClient;
use crate::swap::pool::{PoolKeyData, FEE_TIERS};
use crate::swap::router::{decode_quote_return, encode_exact_input_single_swap, encode_quote_call};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

sol! {
    function getLiquidity(bytes32 poolId) external view returns (uint128 liquidity);
}

/// A fully-built swap: ready to hand to the transaction builder.
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub pool_key: PoolKeyData,
    pub fee_tier: u32,
    pub to: Address,
    pub value: U256,
    pub call_data: Vec<u8>,
    pub min_amount_out: u128,
}

pub struct SwapPlanner {
    rpc: Arc<RpcClient>,
    state_view: Address,
    quoter: Address,
    universal_router: Address,
    wrapped_native: Address,
    multicall: Address,
}

impl SwapPlanner {
    pub fn new(
        rpc: Arc<RpcClient>,
        state_view: Address,
        quoter: Address,
        universal_router: Address,
        wrapped_native: Address,
        multicall: Address,
    ) -> Self {
        Self {
            rpc,
            state_view,
            quoter,
            universal_router,
            wrapped_native,
            multicall,
        }
    }

    /// Scans all four canonical fee tiers in one Multicall3 batch and picks
    /// the tier with the highest non-zero liquidity. Shared by [`Self::plan`]
    /// and [`Self::estimate_input_for_target_output`] so both directions
    /// trade through the same pool.
    async fn select_best_pool(
        &self,
        token_a: Address,
        token_b: Address,
    ) -> Result<PoolKeyData, WalletError> {
        let candidates: Vec<PoolKeyData> = FEE_TIERS
            .iter()
            .map(|(fee, tick_spacing)| PoolKeyData::new(token_a, token_b, *fee, *tick_spacing))
            .collect();

        let multicall = Multicall::new(self.rpc.clone(), self.multicall);
        let calls: Vec<BatchedCall> = candidates
            .iter()
            .map(|key| BatchedCall {
                target: self.state_view,
                call_data: Bytes::from(
                    getLiquidityCall {
                        poolId: key.pool_id(),
                    }
                    .abi_encode(),
                ),
            })
            .collect();

        let results = multicall.aggregate3(calls).await?;

        let best = results
            .iter()
            .zip(candidates.iter())
            .filter_map(|(result, key)| {
                let data = result.as_ref().ok()?;
                let liquidity = getLiquidityCall::abi_decode_returns(data, true)
                    .ok()?
                    .liquidity;
                if liquidity == 0 {
                    None
                } else {
                    Some((*key, liquidity))
                }
            })
            .max_by_key(|(_, liquidity)| *liquidity);

        let (pool_key, liquidity) = best.ok_or(WalletError::NoPool)?;
        info!(
            "selected fee tier {} with liquidity {liquidity} for {token_a}<->{token_b}",
            pool_key.fee
        );
        Ok(pool_key)
    }

    async fn quote(
        &self,
        pool_key: &PoolKeyData,
        zero_for_one: bool,
        amount_in: u128,
    ) -> Result<U256, WalletError> {
        let quote_call = encode_quote_call(pool_key, zero_for_one, amount_in);
        let quote_return = self.rpc.call_contract(self.quoter, &quote_call).await?;
        decode_quote_return(&quote_return).map_err(|e| WalletError::RpcError {
            message: format!("malformed quoter return data: {e}"),
            code: 0,
        })
    }

    /// Approximates how much `tokenIn` is needed to produce `targetOut` of
    /// `tokenOut`, by quoting the reverse direction with `targetOut` as the
    /// trial input and treating the pool as locally linear around the
    /// current price. Used only to size a native->USDC top-up swap; the
    /// actual swap is still built and slippage-protected by [`Self::plan`].
    pub async fn estimate_input_for_target_output(
        &self,
        token_in: Address,
        token_out: Address,
        target_out: u128,
    ) -> Result<u128, WalletError> {
        let pool_key = self.select_best_pool(token_in, token_out).await?;
        let reverse_zero_for_one = pool_key.zero_for_one(token_out);
        let estimated_in = self.quote(&pool_key, reverse_zero_for_one, target_out).await?;
        Ok(estimated_in.try_into().unwrap_or(u128::MAX))
    }

    /// Scans all four canonical fee tiers in one Multicall3 batch, picks the
    /// tier with the highest liquidity, quotes it, and builds Universal
    /// Router call-data for an exact-input single-hop swap.
    ///
    /// `slippage_bps` must be one of `{10, 50, 100, 200}` (validated by the
    /// caller via configuration, not re-checked here).
    pub async fn plan(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        recipient: Address,
        slippage_bps: u32,
        now: chrono::DateTime<chrono::Utc>,
        deadline_minutes: i64,
    ) -> Result<SwapPlan, WalletError> {
        let pool_key = self.select_best_pool(token_in, token_out).await?;
        let zero_for_one = pool_key.zero_for_one(token_in);
        let amount_out = self.quote(&pool_key, zero_for_one, amount_in).await?;

        if amount_out.is_zero() {
            warn!("quoter returned zero output for pool fee={}", pool_key.fee);
        }

        let min_amount_out = amount_out
            .checked_mul(U256::from(10_000 - slippage_bps))
            .and_then(|v| v.checked_div(U256::from(10_000u32)))
            .unwrap_or(U256::ZERO);
        let min_amount_out: u128 = min_amount_out.try_into().unwrap_or(u128::MAX);

        let deadline = U256::from((now + Duration::minutes(deadline_minutes)).timestamp());

        let call_data = encode_exact_input_single_swap(
            &pool_key,
            zero_for_one,
            amount_in,
            min_amount_out,
            recipient,
            deadline,
        );

        // Native-sentinel input pays as msg.value; ERC-20 input pays via
        // Permit2 and carries zero value (no pre-approval needed).
        let value = if token_in == self.wrapped_native {
            U256::from(amount_in)
        } else {
            U256::ZERO
        };

        Ok(SwapPlan {
            pool_key,
            fee_tier: pool_key.fee,
            to: self.universal_router,
            value,
            call_data,
            min_amount_out,
        })
    }
}

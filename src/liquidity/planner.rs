//! Mint planning for concentrated-liquidity positions
//!
//! A plan always reads the pool live, centers a fixed four-spacing range on
//! the nearest usable tick and sizes the position from the caller's amounts.

use super::pool::{compute_pool_address, sort_tokens, FeeTier, PoolState};
use super::position::Position;
use super::tick_math::{nearest_usable_tick, MAX_TICK, MIN_TICK};
use crate::chain::{Chain, ChainReader};
use crate::config::LiquidityConfig;
use crate::error::PlanError;
use crate::intent::{IntentKind, LiquidityMintIntent, TokenAmount};
use crate::tx::{build_typed, CompiledTransaction, FeePolicy};

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, TransactionRequest, I256, U256};
use ethers::utils::id;
use std::sync::Arc;
use tracing::{debug, info};

/// Position manager `mint(MintParams)`
pub const MINT_SIGNATURE: &str =
    "mint((address,address,uint24,int24,int24,uint256,uint256,uint256,uint256,address,uint256))";

/// Half-width of the minted range, in tick spacings
const RANGE_SPACINGS: i32 = 2;

/// Symmetric range of `2 * RANGE_SPACINGS` spacings around the nearest usable tick
pub fn tick_range(current_tick: i32, tick_spacing: i32) -> (i32, i32) {
    let center = nearest_usable_tick(current_tick, tick_spacing);
    (
        center - RANGE_SPACINGS * tick_spacing,
        center + RANGE_SPACINGS * tick_spacing,
    )
}

/// Fully derived mint parameters, consumed immediately into calldata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSpec {
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: FeeTier,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: U256,
    pub amount1_desired: U256,
    pub amount0_min: U256,
    pub amount1_min: U256,
    pub recipient: Address,
    /// Unix seconds
    pub deadline: u64,
    pub slippage_bps: u32,
}

impl PositionSpec {
    pub fn mint_calldata(&self) -> Bytes {
        let params = Token::Tuple(vec![
            Token::Address(self.token0),
            Token::Address(self.token1),
            Token::Uint(U256::from(self.fee.fee())),
            Token::Int(I256::from(self.tick_lower).into_raw()),
            Token::Int(I256::from(self.tick_upper).into_raw()),
            Token::Uint(self.amount0_desired),
            Token::Uint(self.amount1_desired),
            Token::Uint(self.amount0_min),
            Token::Uint(self.amount1_min),
            Token::Address(self.recipient),
            Token::Uint(U256::from(self.deadline)),
        ]);

        let mut data = id(MINT_SIGNATURE).to_vec();
        data.extend_from_slice(&abi::encode(&[params]));
        data.into()
    }
}

pub struct LiquidityPositionPlanner {
    reader: Arc<dyn ChainReader>,
    deadline_secs: u64,
    slippage_bps: u32,
    fee_policy: FeePolicy,
}

impl LiquidityPositionPlanner {
    pub fn new(reader: Arc<dyn ChainReader>, config: &LiquidityConfig) -> Self {
        Self {
            reader,
            deadline_secs: config.deadline_secs,
            slippage_bps: config.slippage_bps,
            fee_policy: FeePolicy::from_config(config),
        }
    }

    /// Read the pool and derive every mint parameter
    pub async fn plan_position(
        &self,
        chain: &Chain,
        intent: &LiquidityMintIntent,
    ) -> Result<PositionSpec, PlanError> {
        if intent.factory_address.is_zero() {
            return Err(PlanError::PoolAddressUnresolved(
                "pool factory address is zero".to_string(),
            ));
        }
        let (token0, token1) = sort_tokens(intent.token_a, intent.token_b).ok_or_else(|| {
            PlanError::PoolAddressUnresolved(format!(
                "token pair is a single token {:?}",
                intent.token_a
            ))
        })?;

        // Amounts and decimals travel with their token when the pair is flipped
        let flipped = token0 != intent.token_a;
        let (amount0, amount1) = {
            let a = scale(&intent.amount_a, intent.decimals_a)?;
            let b = scale(&intent.amount_b, intent.decimals_b)?;
            if flipped {
                (b, a)
            } else {
                (a, b)
            }
        };

        let pool = compute_pool_address(intent.factory_address, token0, token1, intent.fee_tier);
        debug!(chain_id = chain.id(), ?pool, fee = intent.fee_tier.fee(), "Derived pool address");

        let state = self.read_pool(chain, pool, intent.fee_tier).await?;
        let (tick_lower, tick_upper) = tick_range(state.current_tick, state.tick_spacing);

        let position =
            Position::from_amounts(state, tick_lower, tick_upper, amount0, amount1, true)?;
        let (amount0_desired, amount1_desired) = position.mint_amounts()?;
        let (amount0_min, amount1_min) = position.mint_amounts_with_slippage(self.slippage_bps)?;

        let deadline = (chrono::Utc::now().timestamp().max(0) as u64) + self.deadline_secs;

        info!(
            chain_id = chain.id(),
            ?pool,
            current_tick = state.current_tick,
            tick_lower,
            tick_upper,
            liquidity = position.liquidity(),
            "Planned liquidity position"
        );

        Ok(PositionSpec {
            pool,
            token0,
            token1,
            fee: intent.fee_tier,
            tick_lower,
            tick_upper,
            amount0_desired,
            amount1_desired,
            amount0_min,
            amount1_min,
            recipient: intent.from_address,
            deadline,
            slippage_bps: self.slippage_bps,
        })
    }

    /// Plan the position and wrap its mint call for the position manager
    pub async fn plan_mint(
        &self,
        chain: &Chain,
        intent: &LiquidityMintIntent,
    ) -> Result<CompiledTransaction, PlanError> {
        let spec = self.plan_position(chain, intent).await?;

        let calldata = spec.mint_calldata();
        if calldata.len() <= 4 {
            return Err(PlanError::CalldataEncodingFailed(
                "mint produced no arguments".to_string(),
            ));
        }

        let request = TransactionRequest::new()
            .from(intent.from_address)
            .to(intent.npm_address)
            .data(calldata)
            .value(U256::zero());
        let tx = build_typed(request, Some(self.fee_policy.gas_price()));

        Ok(CompiledTransaction::new(chain.id(), IntentKind::LiquidityMint, tx))
    }

    async fn read_pool(
        &self,
        chain: &Chain,
        pool: Address,
        fee: FeeTier,
    ) -> Result<PoolState, PlanError> {
        let liquidity = self
            .reader
            .liquidity(chain, pool)
            .await?
            .ok_or(PlanError::PoolStateUnavailable {
                pool,
                field: "liquidity",
            })?;
        let slot0 = self
            .reader
            .slot0(chain, pool)
            .await?
            .ok_or(PlanError::PoolStateUnavailable {
                pool,
                field: "slot0",
            })?;

        if !(MIN_TICK..=MAX_TICK).contains(&slot0.tick) {
            return Err(PlanError::PositionUnconstructable(format!(
                "pool reported tick {} out of bounds",
                slot0.tick
            )));
        }

        Ok(PoolState {
            sqrt_price_x96: slot0.sqrt_price_x96,
            liquidity,
            current_tick: slot0.tick,
            tick_spacing: fee.tick_spacing(),
            fee,
        })
    }
}

fn scale(amount: &TokenAmount, decimals: u8) -> Result<U256, PlanError> {
    amount
        .to_base_units(decimals)
        .map_err(|reason| PlanError::InvalidAmount {
            value: amount.to_string(),
            reason,
        })
}

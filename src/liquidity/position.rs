//! Concentrated-liquidity position over a tick range

use super::math::{amount0_delta, amount1_delta, max_liquidity_for_amounts};
use super::pool::PoolState;
use super::tick_math::{
    sqrt_ratio_at_tick, tick_at_sqrt_ratio, MAX_SQRT_RATIO, MIN_SQRT_RATIO,
};
use crate::error::PlanError;

use ethers::types::{U256, U512};

const BPS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pool: PoolState,
    tick_lower: i32,
    tick_upper: i32,
    liquidity: u128,
}

fn sqrt_at(tick: i32) -> Result<U256, PlanError> {
    sqrt_ratio_at_tick(tick)
        .ok_or_else(|| PlanError::PositionUnconstructable(format!("tick {} out of bounds", tick)))
}

fn overflow(what: &str) -> PlanError {
    PlanError::PositionUnconstructable(format!("{} overflowed", what))
}

impl Position {
    pub fn new(
        pool: PoolState,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
    ) -> Result<Self, PlanError> {
        if tick_lower >= tick_upper {
            return Err(PlanError::PositionUnconstructable(format!(
                "empty tick range [{}, {}]",
                tick_lower, tick_upper
            )));
        }
        if tick_lower % pool.tick_spacing != 0 || tick_upper % pool.tick_spacing != 0 {
            return Err(PlanError::PositionUnconstructable(format!(
                "ticks [{}, {}] not aligned to spacing {}",
                tick_lower, tick_upper, pool.tick_spacing
            )));
        }
        sqrt_at(tick_lower)?;
        sqrt_at(tick_upper)?;

        Ok(Self {
            pool,
            tick_lower,
            tick_upper,
            liquidity,
        })
    }

    /// Largest position the two amounts can fund at the pool's current price
    pub fn from_amounts(
        pool: PoolState,
        tick_lower: i32,
        tick_upper: i32,
        amount0: U256,
        amount1: U256,
        full_precision: bool,
    ) -> Result<Self, PlanError> {
        let liquidity = max_liquidity_for_amounts(
            pool.sqrt_price_x96,
            sqrt_at(tick_lower)?,
            sqrt_at(tick_upper)?,
            amount0,
            amount1,
            full_precision,
        )
        .ok_or_else(|| overflow("liquidity"))?;

        if liquidity.is_zero() {
            return Err(PlanError::PositionUnconstructable(
                "amounts produce zero liquidity".to_string(),
            ));
        }
        if liquidity > U256::from(u128::MAX) {
            return Err(overflow("liquidity"));
        }

        Self::new(pool, tick_lower, tick_upper, liquidity.as_u128())
    }

    pub fn tick_lower(&self) -> i32 {
        self.tick_lower
    }

    pub fn tick_upper(&self) -> i32 {
        self.tick_upper
    }

    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    /// Token amounts the mint will pull, rounded up
    pub fn mint_amounts(&self) -> Result<(U256, U256), PlanError> {
        let lower = sqrt_at(self.tick_lower)?;
        let upper = sqrt_at(self.tick_upper)?;
        let price = self.pool.sqrt_price_x96;
        let l = self.liquidity;

        let amounts = if self.pool.current_tick < self.tick_lower {
            (amount0_delta(lower, upper, l, true), Some(U256::zero()))
        } else if self.pool.current_tick < self.tick_upper {
            (
                amount0_delta(price, upper, l, true),
                amount1_delta(lower, price, l, true),
            )
        } else {
            (Some(U256::zero()), amount1_delta(lower, upper, l, true))
        };

        match amounts {
            (Some(amount0), Some(amount1)) => Ok((amount0, amount1)),
            _ => Err(overflow("mint amount")),
        }
    }

    /// Minimum amounts that keep the mint from reverting if the price moves by
    /// at most `slippage_bps` before inclusion
    pub fn mint_amounts_with_slippage(&self, slippage_bps: u32) -> Result<(U256, U256), PlanError> {
        let (price_lower, price_upper) =
            slippage_sqrt_prices(self.pool.sqrt_price_x96, u64::from(slippage_bps))?;

        let pool_at = |sqrt_price_x96: U256| -> Result<PoolState, PlanError> {
            let current_tick = tick_at_sqrt_ratio(sqrt_price_x96).ok_or_else(|| {
                PlanError::PositionUnconstructable("slippage bound outside price range".to_string())
            })?;
            Ok(PoolState {
                sqrt_price_x96,
                liquidity: 0,
                current_tick,
                ..self.pool
            })
        };
        let pool_lower = pool_at(price_lower)?;
        let pool_upper = pool_at(price_upper)?;

        // Liquidity the pool will actually mint from the rounded-up amounts
        let (amount0, amount1) = self.mint_amounts()?;
        let created = Position::from_amounts(
            self.pool,
            self.tick_lower,
            self.tick_upper,
            amount0,
            amount1,
            false,
        )?;

        let (amount0_min, _) =
            Position { pool: pool_upper, ..created }.mint_amounts()?;
        let (_, amount1_min) =
            Position { pool: pool_lower, ..created }.mint_amounts()?;

        Ok((amount0_min, amount1_min))
    }
}

/// sqrt(P * (1 -/+ s)) in Q96, clamped strictly inside the valid price range
fn slippage_sqrt_prices(
    sqrt_price_x96: U256,
    slippage_bps: u64,
) -> Result<(U256, U256), PlanError> {
    if slippage_bps >= BPS {
        return Err(PlanError::PositionUnconstructable(format!(
            "slippage {} bps out of range",
            slippage_bps
        )));
    }

    let price_x192 = sqrt_price_x96.full_mul(sqrt_price_x96);
    let scaled = |factor: u64| -> Result<U256, PlanError> {
        let value = price_x192
            .checked_mul(U512::from(factor))
            .ok_or_else(|| overflow("slippage price"))?
            / U512::from(BPS);
        U256::try_from(value.integer_sqrt()).map_err(|_| overflow("slippage price"))
    };

    let mut lower = scaled(BPS - slippage_bps)?;
    if lower <= MIN_SQRT_RATIO {
        lower = MIN_SQRT_RATIO + 1u64;
    }
    let mut upper = scaled(BPS + slippage_bps)?;
    if upper >= MAX_SQRT_RATIO {
        upper = MAX_SQRT_RATIO - 1u64;
    }
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidity::math::Q96;
    use crate::liquidity::pool::FeeTier;

    const E18: u64 = 1_000_000_000_000_000_000;

    fn pool_at_tick(tick: i32) -> PoolState {
        PoolState {
            sqrt_price_x96: sqrt_ratio_at_tick(tick).unwrap(),
            liquidity: 1 << 80,
            current_tick: tick,
            tick_spacing: 60,
            fee: FeeTier::Medium,
        }
    }

    #[test]
    fn test_in_range_position_uses_both_tokens() {
        let pool = pool_at_tick(0);
        let amount = U256::from(E18);
        let position = Position::from_amounts(pool, -120, 120, amount, amount, true).unwrap();
        assert!(position.liquidity() > 0);

        let (amount0, amount1) = position.mint_amounts().unwrap();
        assert!(amount0 > U256::zero() && amount0 <= amount);
        assert!(amount1 > U256::zero() && amount1 <= amount);
        // symmetric range at price 1 binds on both sides almost equally
        assert!(amount0.max(amount1) - amount0.min(amount1) < U256::from(E18 / 100));
    }

    #[test]
    fn test_out_of_range_position_is_single_sided() {
        let amount = U256::from(E18);

        let below = Position::from_amounts(pool_at_tick(-600), -120, 120, amount, amount, true)
            .unwrap()
            .mint_amounts()
            .unwrap();
        assert!(below.0 > U256::zero());
        assert_eq!(below.1, U256::zero());

        let above = Position::from_amounts(pool_at_tick(600), -120, 120, amount, amount, true)
            .unwrap()
            .mint_amounts()
            .unwrap();
        assert_eq!(above.0, U256::zero());
        assert!(above.1 > U256::zero());
    }

    #[test]
    fn test_zero_amounts_are_unconstructable() {
        let err = Position::from_amounts(pool_at_tick(0), -120, 120, U256::zero(), U256::zero(), true)
            .unwrap_err();
        assert!(matches!(err, PlanError::PositionUnconstructable(_)));
    }

    #[test]
    fn test_rejects_unaligned_or_inverted_range() {
        assert!(Position::new(pool_at_tick(0), -100, 120, 1).is_err());
        assert!(Position::new(pool_at_tick(0), 120, -120, 1).is_err());
    }

    #[test]
    fn test_slippage_minimums_below_desired() {
        let position =
            Position::from_amounts(pool_at_tick(0), -120, 120, U256::from(E18), U256::from(E18), true)
                .unwrap();
        let (desired0, desired1) = position.mint_amounts().unwrap();
        let (min0, min1) = position.mint_amounts_with_slippage(50).unwrap();

        assert!(min0 < desired0);
        assert!(min1 < desired1);
        assert!(min0 > U256::zero() && min1 > U256::zero());
    }

    #[test]
    fn test_slippage_prices_bracket_current() {
        let (lower, upper) = slippage_sqrt_prices(Q96, 50).unwrap();
        assert!(lower < Q96 && Q96 < upper);

        let (lower, _) = slippage_sqrt_prices(MIN_SQRT_RATIO, 50).unwrap();
        assert_eq!(lower, MIN_SQRT_RATIO + 1u64);
        assert!(slippage_sqrt_prices(Q96, 10_000).is_err());
    }
}

//! Full-precision liquidity arithmetic
//!
//! Intermediate products are taken in 512 bits so no step truncates before the
//! final division. Every function returns `None` instead of overflowing.

use ethers::types::{U256, U512};

/// 2^96
pub const Q96: U256 = U256([0, 1 << 32, 0, 0]);

fn narrow(value: U512) -> Option<U256> {
    U256::try_from(value).ok()
}

/// floor(a * b / denominator)
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    narrow(a.full_mul(b) / U512::from(denominator))
}

/// ceil(a * b / denominator)
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let product = a.full_mul(b);
    let denominator = U512::from(denominator);
    let quotient = narrow(product / denominator)?;
    if (product % denominator).is_zero() {
        Some(quotient)
    } else {
        quotient.checked_add(U256::one())
    }
}

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Token0 owed for `liquidity` between two sqrt prices
pub fn amount0_delta(sqrt_a: U256, sqrt_b: U256, liquidity: u128, round_up: bool) -> Option<U256> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    if sqrt_a.is_zero() {
        return None;
    }

    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = sqrt_b - sqrt_a;

    if round_up {
        let inner = mul_div_rounding_up(numerator1, numerator2, sqrt_b)?;
        mul_div_rounding_up(inner, U256::one(), sqrt_a)
    } else {
        Some(mul_div(numerator1, numerator2, sqrt_b)? / sqrt_a)
    }
}

/// Token1 owed for `liquidity` between two sqrt prices
pub fn amount1_delta(sqrt_a: U256, sqrt_b: U256, liquidity: u128, round_up: bool) -> Option<U256> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    let diff = sqrt_b - sqrt_a;

    if round_up {
        mul_div_rounding_up(U256::from(liquidity), diff, Q96)
    } else {
        mul_div(U256::from(liquidity), diff, Q96)
    }
}

fn liquidity_for_amount0_imprecise(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> Option<U256> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    let intermediate = mul_div(sqrt_a, sqrt_b, Q96)?;
    mul_div(amount0, intermediate, sqrt_b - sqrt_a)
}

fn liquidity_for_amount0_precise(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> Option<U256> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return None;
    }
    let numerator = sqrt_a.full_mul(sqrt_b).checked_mul(U512::from(amount0))?;
    let denominator = Q96.full_mul(sqrt_b - sqrt_a);
    narrow(numerator / denominator)
}

fn liquidity_for_amount1(sqrt_a: U256, sqrt_b: U256, amount1: U256) -> Option<U256> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    mul_div(amount1, Q96, sqrt_b - sqrt_a)
}

/// Largest liquidity the given amounts can back at the current price.
///
/// `full_precision` selects the exact amount0 conversion; the imprecise form
/// rounds the price product first and is used when re-deriving a position from
/// its own mint amounts.
pub fn max_liquidity_for_amounts(
    sqrt_current: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    amount0: U256,
    amount1: U256,
    full_precision: bool,
) -> Option<U256> {
    let (sqrt_a, sqrt_b) = sorted(sqrt_a, sqrt_b);
    if sqrt_a == sqrt_b {
        return None;
    }

    let for_amount0 = |lower: U256, upper: U256| {
        if full_precision {
            liquidity_for_amount0_precise(lower, upper, amount0)
        } else {
            liquidity_for_amount0_imprecise(lower, upper, amount0)
        }
    };

    if sqrt_current <= sqrt_a {
        for_amount0(sqrt_a, sqrt_b)
    } else if sqrt_current < sqrt_b {
        let liquidity0 = for_amount0(sqrt_current, sqrt_b)?;
        let liquidity1 = liquidity_for_amount1(sqrt_a, sqrt_current, amount1)?;
        Some(liquidity0.min(liquidity1))
    } else {
        liquidity_for_amount1(sqrt_a, sqrt_b, amount1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E18: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_mul_div_rounding() {
        let (a, b, d) = (U256::from(7u64), U256::from(3u64), U256::from(2u64));
        assert_eq!(mul_div(a, b, d), Some(U256::from(10u64)));
        assert_eq!(mul_div_rounding_up(a, b, d), Some(U256::from(11u64)));
        assert_eq!(mul_div_rounding_up(a, U256::from(2u64), d), Some(a));
        assert_eq!(mul_div(a, b, U256::zero()), None);
    }

    #[test]
    fn test_mul_div_keeps_wide_intermediate() {
        // (2^255 * 4) / 8 only fits if the product is not truncated
        let half = U256::one() << 255;
        assert_eq!(
            mul_div(half, U256::from(4u64), U256::from(8u64)),
            Some(U256::one() << 254)
        );
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::one()), None);
    }

    #[test]
    fn test_amount_deltas_between_price_one_and_two() {
        // sqrt prices 1 and 2 in Q96
        let (a, b) = (Q96, Q96 * 2u64);
        assert_eq!(amount1_delta(a, b, E18, false), Some(U256::from(E18)));
        assert_eq!(amount1_delta(b, a, E18, true), Some(U256::from(E18)));
        assert_eq!(amount0_delta(a, b, E18, false), Some(U256::from(E18 / 2)));
        assert_eq!(amount0_delta(a, b, E18, true), Some(U256::from(E18 / 2)));
    }

    #[test]
    fn test_liquidity_from_amount0_below_range() {
        let (a, b) = (Q96, Q96 * 2u64);
        let amount0 = U256::from(E18 / 2);
        for full_precision in [true, false] {
            assert_eq!(
                max_liquidity_for_amounts(a, a, b, amount0, U256::zero(), full_precision),
                Some(U256::from(E18))
            );
        }
    }

    #[test]
    fn test_liquidity_from_amount1_above_range() {
        let (a, b) = (Q96, Q96 * 2u64);
        assert_eq!(
            max_liquidity_for_amounts(b * 2u64, a, b, U256::zero(), U256::from(E18), true),
            Some(U256::from(E18))
        );
    }

    #[test]
    fn test_in_range_takes_the_binding_side() {
        let (a, b) = (Q96, Q96 * 4u64);
        let current = Q96 * 2u64;
        let plenty = U256::from(E18) * 1_000u64;
        let scarce = U256::from(E18);

        let limited_by_1 = max_liquidity_for_amounts(current, a, b, plenty, scarce, true).unwrap();
        let limited_by_0 = max_liquidity_for_amounts(current, a, b, scarce, plenty, true).unwrap();

        // amount1 = L * (current - a) / Q96 = L
        assert_eq!(limited_by_1, scarce);
        // amount0 = L * Q96 * (b - current) / (current * b) = L / 4
        assert_eq!(limited_by_0, scarce * 4u64);
    }

    #[test]
    fn test_empty_range_has_no_liquidity() {
        assert_eq!(
            max_liquidity_for_amounts(Q96, Q96, Q96, U256::one(), U256::one(), true),
            None
        );
    }
}

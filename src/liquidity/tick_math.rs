//! Tick <-> sqrt price conversion in Q64.96 fixed point

use ethers::types::U256;

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = -MIN_TICK;

/// `sqrt_ratio_at_tick(MIN_TICK)`
pub const MIN_SQRT_RATIO: U256 = U256([4_295_128_739, 0, 0, 0]);
/// `sqrt_ratio_at_tick(MAX_TICK)`
pub const MAX_SQRT_RATIO: U256 = U256([0x5d95_1d52_6398_8d26, 0xefd1_fc6a_5064_8849, 0xfffd_8963, 0]);

/// 1 / sqrt(1.0001)^(2^i) in Q128.128 for bits 1..=19 of |tick|
const BIT_FACTORS: [u128; 19] = [
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

const BIT0_FACTOR: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// sqrt(1.0001^tick) * 2^96, rounded up. `None` outside `[MIN_TICK, MAX_TICK]`.
pub fn sqrt_ratio_at_tick(tick: i32) -> Option<U256> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return None;
    }

    let mut ratio = if abs_tick & 1 != 0 {
        U256::from(BIT0_FACTOR)
    } else {
        U256::one() << 128
    };

    for (i, factor) in BIT_FACTORS.iter().enumerate() {
        if abs_tick & (1 << (i + 1)) != 0 {
            ratio = (ratio * U256::from(*factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let rounding = if (ratio & U256::from(u32::MAX)).is_zero() {
        U256::zero()
    } else {
        U256::one()
    };
    Some((ratio >> 32) + rounding)
}

/// Greatest tick whose sqrt ratio is at most `sqrt_price_x96`
pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Option<i32> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return None;
    }

    let (mut lo, mut hi) = (MIN_TICK, MAX_TICK);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Some(lo)
}

/// Closest multiple of `tick_spacing` to `tick`, halves rounded toward +inf,
/// pulled back inside the tick bounds
pub fn nearest_usable_tick(tick: i32, tick_spacing: i32) -> i32 {
    debug_assert!(tick_spacing > 0, "tick spacing must be positive");

    let (tick, spacing) = (i64::from(tick), i64::from(tick_spacing));
    let rounded = (2 * tick + spacing).div_euclid(2 * spacing) * spacing;

    let usable = if rounded < i64::from(MIN_TICK) {
        rounded + spacing
    } else if rounded > i64::from(MAX_TICK) {
        rounded - spacing
    } else {
        rounded
    };
    usable as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(sqrt_ratio_at_tick(MIN_TICK), Some(MIN_SQRT_RATIO));
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK), Some(MAX_SQRT_RATIO));
        assert_eq!(sqrt_ratio_at_tick(MIN_TICK - 1), None);
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK + 1), None);
        assert_eq!(
            MAX_SQRT_RATIO,
            U256::from_dec_str("1461446703485210103287273052203988822378723970342").unwrap()
        );
    }

    #[test]
    fn test_tick_zero_is_unit_price() {
        assert_eq!(sqrt_ratio_at_tick(0), Some(U256::one() << 96));
        assert_eq!(tick_at_sqrt_ratio(U256::one() << 96), Some(0));
    }

    #[test]
    fn test_ratio_is_monotonic() {
        let mut prev = sqrt_ratio_at_tick(-1_000).unwrap();
        for tick in -999..=1_000 {
            let next = sqrt_ratio_at_tick(tick).unwrap();
            assert!(next > prev, "ratio not increasing at tick {}", tick);
            prev = next;
        }
    }

    #[test]
    fn test_tick_at_sqrt_ratio_inverts() {
        for tick in [MIN_TICK, -200_000, -887, -60, -1, 1, 60, 887, 200_000, MAX_TICK - 1] {
            let ratio = sqrt_ratio_at_tick(tick).unwrap();
            assert_eq!(tick_at_sqrt_ratio(ratio), Some(tick));
            if tick > MIN_TICK {
                assert_eq!(tick_at_sqrt_ratio(ratio - 1u64), Some(tick - 1));
            }
        }
        assert_eq!(tick_at_sqrt_ratio(MAX_SQRT_RATIO), None);
        assert_eq!(tick_at_sqrt_ratio(MIN_SQRT_RATIO - 1u64), None);
    }

    #[test]
    fn test_nearest_usable_tick() {
        assert_eq!(nearest_usable_tick(5, 10), 10);
        assert_eq!(nearest_usable_tick(4, 10), 0);
        assert_eq!(nearest_usable_tick(-5, 10), 0);
        assert_eq!(nearest_usable_tick(-6, 10), -10);
        assert_eq!(nearest_usable_tick(-201_231, 60), -201_240);
        assert_eq!(nearest_usable_tick(MIN_TICK, 60), -887_220);
        assert_eq!(nearest_usable_tick(MAX_TICK, 60), 887_220);
        assert_eq!(nearest_usable_tick(MAX_TICK, 1), MAX_TICK);
    }
}

//! Fixed-point and integer math used by the reserve ledger.

use crate::types::U256;

/// Number of fractional bits in the UQ112.112 fixed-point representation
/// used by the price accumulators.
pub const Q112_SHIFT: usize = 112;

/// Floor integer square root.
pub fn sqrt(value: U256) -> U256 {
    value.root(2)
}

/// Encode an integer as UQ112.112 fixed point.
pub fn uq112_encode(value: U256) -> U256 {
    value << Q112_SHIFT
}

/// Divide a UQ112.112 value by an integer, yielding UQ112.112.
/// Caller guarantees a non-zero divisor.
pub fn uq112_div(numerator: U256, denominator: U256) -> U256 {
    numerator / denominator
}

/// One time-step contribution to a price accumulator:
/// `(reserve_other / reserve_self)` in UQ112.112, times elapsed seconds.
///
/// Wraparound is intentional: accumulators are only ever differenced, so
/// modulo-2^256 arithmetic keeps the deltas meaningful.
pub fn price_accumulator_delta(
    reserve_other: U256,
    reserve_self: U256,
    elapsed_secs: u32,
) -> U256 {
    uq112_div(uq112_encode(reserve_other), reserve_self).wrapping_mul(U256::from(elapsed_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_exact() {
        assert_eq!(sqrt(U256::from(0)), U256::from(0));
        assert_eq!(sqrt(U256::from(1)), U256::from(1));
        assert_eq!(sqrt(U256::from(4)), U256::from(2));
        assert_eq!(sqrt(U256::from(1_000_000)), U256::from(1000));
    }

    #[test]
    fn test_sqrt_floor() {
        assert_eq!(sqrt(U256::from(2)), U256::from(1));
        assert_eq!(sqrt(U256::from(999_999)), U256::from(999));
        // sqrt(1e21 * 1e21) = 1e21
        let e21 = U256::from(10).pow(U256::from(21));
        assert_eq!(sqrt(e21 * e21), e21);
    }

    #[test]
    fn test_uq112_roundtrip() {
        let three = uq112_encode(U256::from(3));
        assert_eq!(uq112_div(three, U256::from(3)), uq112_encode(U256::from(1)));
        // 1/2 in UQ112.112 is 2^111
        assert_eq!(
            uq112_div(uq112_encode(U256::from(1)), U256::from(2)),
            U256::from(1) << 111
        );
    }

    #[test]
    fn test_accumulator_delta_scales_with_time() {
        let one_sec = price_accumulator_delta(U256::from(10), U256::from(5), 1);
        let five_sec = price_accumulator_delta(U256::from(10), U256::from(5), 5);
        assert_eq!(one_sec, uq112_encode(U256::from(2)));
        assert_eq!(five_sec, one_sec * U256::from(5));
    }
}

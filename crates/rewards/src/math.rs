//! 18-decimal fixed-point helpers.
//!
//! Fractions are `Uint256` values scaled by 1e18, so `1e18` is 1.0 and
//! `15e16` is 15%.

use primitive_types::U256;

use rewardtree_core::Uint256;

use crate::{Result, RewardsError};

/// Fixed-point scale.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// log2(e) at 18 decimals.
pub const LOG2_E: u128 = 1_442_695_040_888_963_407;

pub fn one() -> Uint256 {
    Uint256::from(SCALE)
}

/// `value` as an 18-decimal fixed-point number.
pub fn fixed(value: u64) -> Uint256 {
    Uint256::from(value as u128 * SCALE)
}

/// `a * b / c`, failing on overflow or a zero divisor.
pub fn mul_div(a: Uint256, b: Uint256, c: Uint256, what: &'static str) -> Result<Uint256> {
    a.mul_div(b, c).ok_or(RewardsError::Overflow(what))
}

pub fn add(a: Uint256, b: Uint256, what: &'static str) -> Result<Uint256> {
    a.checked_add(b).ok_or(RewardsError::Overflow(what))
}

pub fn sub(a: Uint256, b: Uint256, what: &'static str) -> Result<Uint256> {
    a.checked_sub(b).ok_or(RewardsError::Overflow(what))
}

/// Base-2 logarithm of a fixed-point `x >= 1.0`; zero below that.
///
/// Integer part from the bit length, fractional part by repeated squaring,
/// one bit per step until the step size reaches zero.
pub fn log2(x: Uint256) -> Uint256 {
    let scale = U256::from(SCALE);
    let x = x.inner();
    if x < scale {
        return Uint256::ZERO;
    }

    let n = (x / scale).bits() - 1;
    let mut result = U256::from(n) * scale;
    let mut y = x >> n;
    if y == scale {
        return Uint256::new(result);
    }

    let two = scale * 2;
    let mut delta = scale >> 1usize;
    while !delta.is_zero() {
        // y < 2.0 here, so y * y fits comfortably
        y = y * y / scale;
        if y >= two {
            result += delta;
            y >>= 1usize;
        }
        delta >>= 1usize;
    }
    Uint256::new(result)
}

/// Natural logarithm of a fixed-point `x >= 1.0`; zero below that.
pub fn ln(x: Uint256) -> Result<Uint256> {
    mul_div(log2(x), one(), Uint256::from(LOG2_E), "ln")
}

/// Split `pool` in proportion to `shares`, flooring each part.
///
/// Returns all zeros when `total` is zero. The parts never sum to more than
/// `pool`; the caller owns the remainder.
pub fn pro_rata<K: Copy>(pool: Uint256, shares: &[(K, Uint256)], total: Uint256) -> Result<Vec<(K, Uint256)>> {
    if total.is_zero() {
        return Ok(shares.iter().map(|(k, _)| (*k, Uint256::ZERO)).collect());
    }
    shares
        .iter()
        .map(|(k, share)| Ok((*k, mul_div(pool, *share, total, "pro-rata share")?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Uint256, b: Uint256, tolerance: u64) -> bool {
        let diff = if a > b { a - b } else { b - a };
        diff <= Uint256::from(tolerance)
    }

    #[test]
    fn test_log2_exact_powers() {
        assert_eq!(log2(one()), Uint256::ZERO);
        assert_eq!(log2(fixed(2)), fixed(1));
        assert_eq!(log2(fixed(8)), fixed(3));
        assert_eq!(log2(fixed(1024)), fixed(10));
    }

    #[test]
    fn test_log2_below_one_is_zero() {
        assert_eq!(log2(Uint256::from(SCALE / 2)), Uint256::ZERO);
    }

    #[test]
    fn test_ln_known_values() {
        // ln(2) = 0.693147180559945309...
        assert!(close(ln(fixed(2)).unwrap(), Uint256::from(693_147_180_559_945_309u128), 1_000_000_000));
        // ln(e) = 1
        let e = Uint256::from(2_718_281_828_459_045_235u128);
        assert!(close(ln(e).unwrap(), one(), 1_000_000_000));
        // ln(10) = 2.302585092994045684...
        assert!(close(ln(fixed(10)).unwrap(), Uint256::from(2_302_585_092_994_045_684u128), 1_000_000_000));
    }

    #[test]
    fn test_pro_rata_floors() {
        let shares = [(1u8, Uint256::from(1u64)), (2u8, Uint256::from(2u64))];
        let parts = pro_rata(Uint256::from(100u64), &shares, Uint256::from(3u64)).unwrap();
        assert_eq!(parts, vec![(1, Uint256::from(33u64)), (2, Uint256::from(66u64))]);
    }

    #[test]
    fn test_pro_rata_zero_total() {
        let shares = [(1u8, Uint256::ZERO)];
        let parts = pro_rata(Uint256::from(100u64), &shares, Uint256::ZERO).unwrap();
        assert_eq!(parts, vec![(1, Uint256::ZERO)]);
    }

    #[test]
    fn test_mul_div_zero_divisor_is_overflow() {
        assert_eq!(
            mul_div(one(), one(), Uint256::ZERO, "x"),
            Err(RewardsError::Overflow("x"))
        );
    }
}

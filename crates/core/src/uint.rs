//! Fixed-width 256-bit unsigned integer.
//!
//! Binary form is exactly 32 bytes big-endian, zero padded. JSON form is the
//! decimal string, since amounts routinely exceed 2^63.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use primitive_types::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CoreError, Result};

/// Non-negative integer of at most 256 bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint256(U256);

impl Uint256 {
    pub const ZERO: Self = Self(U256::zero());

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `10^n`.
    pub fn exp10(n: usize) -> Self {
        Self(U256::exp10(n))
    }

    /// Encode as 32 bytes, big-endian, zero padded on the left.
    pub fn to_bytes32(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    /// Decode exactly 32 big-endian bytes.
    pub fn from_bytes32(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CoreError::MalformedInteger(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(U256::from_big_endian(bytes)))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        self.0.checked_mul(other.0).map(Self)
    }

    pub fn checked_div(self, other: Self) -> Option<Self> {
        self.0.checked_div(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self * numerator / denominator` with a 512-bit intermediate product.
    ///
    /// Returns `None` when the denominator is zero or the quotient does not
    /// fit in 256 bits.
    pub fn mul_div(self, numerator: Self, denominator: Self) -> Option<Self> {
        if denominator.is_zero() {
            return None;
        }
        let product: U512 = self.0.full_mul(numerator.0);
        let quotient = product / U512::from(denominator.0);
        U256::try_from(quotient).ok().map(Self)
    }

    /// Floor of the square root.
    pub fn isqrt(self) -> Self {
        Self(self.0.integer_sqrt())
    }

    /// Lowest 64 bits; callers must know the value fits.
    pub fn low_u64(&self) -> u64 {
        self.0.low_u64()
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl From<u64> for Uint256 {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Uint256 {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Uint256 {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl Add for Uint256 {
    type Output = Self;

    /// Panics on overflow; use `checked_add` when operands are untrusted.
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Uint256 {
    type Output = Self;

    /// Panics on underflow; use `checked_sub` when operands are untrusted.
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Uint256 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, v| acc + v)
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Uint256 {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::MalformedInteger(format!(
                "not a non-negative decimal integer: {s:?}"
            )));
        }
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|e| CoreError::MalformedInteger(format!("{s}: {e:?}")))
    }
}

impl Serialize for Uint256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uint256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes32_encoding() {
        let v = Uint256::from(0x0102u64);
        let bytes = v.to_bytes32();
        assert_eq!(&bytes[..30], &[0u8; 30]);
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert_eq!(Uint256::from_bytes32(&bytes).unwrap(), v);
    }

    #[test]
    fn test_max_value_roundtrip() {
        let max = Uint256::new(U256::MAX);
        let bytes = max.to_bytes32();
        assert_eq!(bytes, [0xff; 32]);
        assert_eq!(Uint256::from_bytes32(&bytes).unwrap(), max);
        let s = max.to_string();
        assert_eq!(s.parse::<Uint256>().unwrap(), max);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            Uint256::from_bytes32(&[0u8; 31]),
            Err(CoreError::MalformedInteger(_))
        ));
        assert!(matches!(
            Uint256::from_bytes32(&[0u8; 33]),
            Err(CoreError::MalformedInteger(_))
        ));
    }

    #[test]
    fn test_negative_and_garbage_strings_rejected() {
        assert!("-5".parse::<Uint256>().is_err());
        assert!("".parse::<Uint256>().is_err());
        assert!("12a".parse::<Uint256>().is_err());
        assert!("1e18".parse::<Uint256>().is_err());
        // 2^256 does not fit
        let too_big = "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(too_big.parse::<Uint256>().is_err());
    }

    #[test]
    fn test_json_is_decimal_string() {
        let v = Uint256::exp10(20);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"100000000000000000000\"");
        let parsed: Uint256 = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, v);
        assert!(serde_json::from_str::<Uint256>("100").is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        let max = Uint256::new(U256::MAX);
        let two = Uint256::from(2u64);
        // MAX * 2 overflows 256 bits but the quotient fits
        assert_eq!(max.mul_div(two, two), Some(max));
        assert_eq!(max.mul_div(two, Uint256::from(1u64)), None);
        assert_eq!(two.mul_div(two, Uint256::ZERO), None);
    }

    #[test]
    fn test_isqrt_floor() {
        assert_eq!(Uint256::from(0u64).isqrt(), Uint256::ZERO);
        assert_eq!(Uint256::from(15u64).isqrt(), Uint256::from(3u64));
        assert_eq!(Uint256::from(16u64).isqrt(), Uint256::from(4u64));
        assert_eq!(Uint256::exp10(36).isqrt(), Uint256::exp10(18));
    }
}

//! Rewards Tree Core
//!
//! Generic types and errors shared by every rewards-tree crate: participant
//! addresses, 32-byte hashes, destination network ids and the fixed-width
//! 256-bit integer used for every token and native-currency amount.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub mod uint;

pub use uint::Uint256;

/// Errors shared across all crates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed integer: {0}")]
    MalformedInteger(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Destination network id for a participant's rewards (0 is the main chain)
pub type NetworkId = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Chain block number
pub type BlockNumber = u64;

/// 1 ETH in wei.
pub const ONE_ETH: u128 = 1_000_000_000_000_000_000;

/// One whole governance token in its smallest unit.
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Full validator deposit, in ETH.
pub const VALIDATOR_DEPOSIT_ETH: u64 = 32;

/// 20-byte participant or contract address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Address whose last eight bytes are `n`, big-endian. Handy for fixtures.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 20];
        decode_hex_fixed(s, &mut bytes).map_err(|e| CoreError::InvalidAddress(format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 32-byte hash (Merkle roots, proof siblings).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// An all-zero hash marks an unset root.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Hash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        decode_hex_fixed(s, &mut bytes).map_err(|e| CoreError::InvalidHash(format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decode a hex string (optional `0x`, any case) into a fixed-size buffer.
fn decode_hex_fixed(s: &str, out: &mut [u8]) -> std::result::Result<(), String> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| e.to_string())?;
    if bytes.len() != out.len() {
        return Err(format!("expected {} bytes, got {}", out.len(), bytes.len()));
    }
    out.copy_from_slice(&bytes);
    Ok(())
}

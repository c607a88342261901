//! Rewards Tree Record Codec
//!
//! The per-interval rewards artifact. A [`RewardsFile`] holds the interval
//! header, aggregate totals, per-network totals and per-node entitlements,
//! and commits to the node list with a Merkle root that must match the
//! recomputed tree.
//!
//! Two encodings are supported: a compact binary form (`finalize` /
//! `parse`) and a JSON form (`to_json` / `from_json`) that additionally
//! carries each node's Merkle proof. Every decoding path verifies the file
//! before handing it back.

pub mod binary;
pub mod file;
pub mod json;
pub mod records;

pub use binary::{MAGIC_HEADER, REWARDS_FILE_VERSION};
pub use file::{ProofSet, RewardsFile};
pub use records::{NetworkReward, NodeReward, TotalRewards, LEAF_SIZE};

use rewardtree_core::{Address, Hash, NetworkId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("magic header not found")]
    BadMagicHeader,
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("incorrect size or malformed encoding: {0}")]
    Malformed(String),
    #[error("token amount overflow building leaf for {0}")]
    Overflow(Address),
}

/// A broken structural rule of the rewards file. Never auto-corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("node rewards out of order at {0}")]
    NodeRewardsOutOfOrder(Address),
    #[error("network rewards out of order at network {0}")]
    NetworkRewardsOutOfOrder(NetworkId),
    #[error("duplicate entries for {0} in node rewards")]
    DuplicateNodeReward(Address),
    #[error("duplicate entries for network {0} in network rewards")]
    DuplicateNetworkReward(NetworkId),
    #[error("missing required field totalRewards")]
    MissingTotals,
    #[error("generated root {computed} mismatch against existing root {declared}")]
    RootMismatch { declared: Hash, computed: Hash },
}

pub type Result<T> = std::result::Result<T, FileError>;

//! Rewards Tree Merkle Engine
//!
//! Binary Keccak-256 tree over ordered leaf records. Pairs are hashed in
//! position order (never sorted) and an unpaired node at the end of a level
//! is carried up unchanged rather than duplicated.

pub mod tree;

pub use tree::{verify_proof, MerkleProof, MerkleTree};

use rewardtree_core::Hash;
use sha3::{Digest, Keccak256};

/// Keccak-256 of a byte string.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Leaf hash: Keccak-256 of the raw leaf record.
pub fn hash_leaf(leaf: &[u8]) -> Hash {
    keccak256(leaf)
}

/// Internal node hash: Keccak-256 of `left || right`.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(left.0);
    hasher.update(right.0);
    Hash(hasher.finalize().into())
}

use serde::{Deserialize, Serialize};

use rewardtree_core::Hash;

use crate::{hash_leaf, hash_pair};

/// Inclusion proof for one leaf.
///
/// `index` and `leaf_count` fix the path through the tree; `siblings` are
/// ordered from the leaf level upwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub index: usize,
    pub leaf_count: usize,
    pub siblings: Vec<Hash>,
}

/// A fully built tree. `levels[0]` holds the leaf hashes, the last level
/// holds the root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree over ordered leaf records.
    pub fn build<L: AsRef<[u8]>>(leaves: &[L]) -> Self {
        let hashes: Vec<Hash> = leaves.iter().map(|l| hash_leaf(l.as_ref())).collect();
        Self::from_leaf_hashes(hashes)
    }

    /// Build a tree over already hashed leaves.
    pub fn from_leaf_hashes(hashes: Vec<Hash>) -> Self {
        let mut levels = vec![hashes];

        while levels.last().map_or(0, Vec::len) > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for chunk in current.chunks(2) {
                match chunk {
                    [left, right] => next.push(hash_pair(left, right)),
                    // carried up unchanged
                    [single] => next.push(*single),
                    _ => unreachable!("chunks(2) yields one or two elements"),
                }
            }
            levels.push(next);
        }

        Self { levels }
    }

    /// Root hash. An empty tree has an all-zero root.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Position of a leaf record in the tree, if present.
    pub fn leaf_index(&self, leaf: &[u8]) -> Option<usize> {
        let target = hash_leaf(leaf);
        self.levels[0].iter().position(|h| *h == target)
    }

    /// Proof for a leaf record.
    pub fn proof(&self, leaf: &[u8]) -> Option<MerkleProof> {
        self.leaf_index(leaf).and_then(|i| self.proof_at(i))
    }

    /// Proof for the leaf at `index`.
    pub fn proof_at(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let pair = idx ^ 1;
            if pair < level.len() {
                siblings.push(level[pair]);
            }
            idx /= 2;
        }

        Some(MerkleProof {
            index,
            leaf_count: self.leaf_count(),
            siblings,
        })
    }
}

/// Check that `leaf` is included under `root` according to `proof`.
pub fn verify_proof(root: &Hash, leaf: &[u8], proof: &MerkleProof) -> bool {
    if proof.index >= proof.leaf_count {
        return false;
    }

    let mut hash = hash_leaf(leaf);
    let mut idx = proof.index;
    let mut width = proof.leaf_count;
    let mut siblings = proof.siblings.iter();

    while width > 1 {
        if idx ^ 1 < width {
            let Some(sibling) = siblings.next() else {
                return false;
            };
            hash = if idx % 2 == 0 {
                hash_pair(&hash, sibling)
            } else {
                hash_pair(sibling, &hash)
            };
        }
        idx /= 2;
        width = width.div_ceil(2);
    }

    // Leftover siblings mean the proof is for a different shape
    siblings.next().is_none() && hash == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u8) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i; 116]).collect()
    }

    #[test]
    fn test_empty_merkle_root() {
        let tree = MerkleTree::build::<Vec<u8>>(&[]);
        assert_eq!(tree.root(), Hash::ZERO);
        assert!(tree.proof_at(0).is_none());
    }

    #[test]
    fn test_single_leaf() {
        let leaf = vec![42u8; 116];
        let tree = MerkleTree::build(&[leaf.clone()]);
        assert_eq!(tree.root(), hash_leaf(&leaf));

        let proof = tree.proof(&leaf).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(verify_proof(&tree.root(), &leaf, &proof));
    }

    #[test]
    fn test_two_leaves() {
        let l = leaves(2);
        let tree = MerkleTree::build(&l);
        let expected = hash_pair(&hash_leaf(&l[0]), &hash_leaf(&l[1]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_pairs_are_not_sorted() {
        let l = leaves(2);
        let swapped = vec![l[1].clone(), l[0].clone()];
        assert_ne!(MerkleTree::build(&l).root(), MerkleTree::build(&swapped).root());
    }

    #[test]
    fn test_odd_leaf_promoted_not_duplicated() {
        let l = leaves(3);
        let tree = MerkleTree::build(&l);
        let left = hash_pair(&hash_leaf(&l[0]), &hash_leaf(&l[1]));
        let expected = hash_pair(&left, &hash_leaf(&l[2]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_every_proof_verifies() {
        for n in 1..=17u8 {
            let l = leaves(n);
            let tree = MerkleTree::build(&l);
            let root = tree.root();
            for (i, leaf) in l.iter().enumerate() {
                let proof = tree.proof(leaf).unwrap();
                assert_eq!(proof.index, i);
                assert!(verify_proof(&root, leaf, &proof), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let l = leaves(5);
        let tree = MerkleTree::build(&l);
        let root = tree.root();

        let mut proof = tree.proof(&l[1]).unwrap();
        proof.siblings[0].0[0] ^= 0x01;
        assert!(!verify_proof(&root, &l[1], &proof));

        let mut wrong_index = tree.proof(&l[1]).unwrap();
        wrong_index.index = 0;
        assert!(!verify_proof(&root, &l[1], &wrong_index));

        let mut extra = tree.proof(&l[1]).unwrap();
        extra.siblings.push(Hash::ZERO);
        assert!(!verify_proof(&root, &l[1], &extra));

        let proof = tree.proof(&l[1]).unwrap();
        assert!(!verify_proof(&root, &l[2], &proof));
    }

    #[test]
    fn test_deterministic() {
        let l = leaves(9);
        let r1 = MerkleTree::build(&l).root();
        let r2 = MerkleTree::build(&l).root();
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_missing_leaf_has_no_proof() {
        let tree = MerkleTree::build(&leaves(4));
        assert!(tree.proof(&[0xee; 116]).is_none());
    }
}

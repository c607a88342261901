//! The rewards file aggregate and its verification rules.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rewardtree_core::{Address, Hash, NetworkId, Timestamp, Uint256};
use rewardtree_merkle::{MerkleProof, MerkleTree};
use tracing::debug;

use crate::binary::REWARDS_FILE_VERSION;
use crate::records::{NetworkReward, NodeReward, TotalRewards};
use crate::{InvariantViolation, Result};

/// Merkle root and per-node proofs computed from a node reward list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSet {
    pub root: Hash,
    /// Indexed by position in the node reward list.
    pub proofs: Vec<MerkleProof>,
}

/// The per-interval rewards artifact.
///
/// Reward lists are kept behind accessors so that any mutation drops the
/// memoised proof set.
#[derive(Debug)]
pub struct RewardsFile {
    pub rewards_file_version: u64,
    pub ruleset_version: u64,
    /// Chain id of the network the file was generated for.
    pub network: u64,
    /// Interval index.
    pub index: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub consensus_start_block: u64,
    pub consensus_end_block: u64,
    pub execution_start_block: u64,
    pub execution_end_block: u64,
    pub intervals_passed: u64,
    pub total_rewards: Option<TotalRewards>,
    merkle_root: Hash,
    network_rewards: Vec<NetworkReward>,
    node_rewards: Vec<NodeReward>,
    proofs: Mutex<Option<Arc<ProofSet>>>,
}

impl RewardsFile {
    /// Empty file at the current format version. Totals are unset.
    pub fn new() -> Self {
        Self {
            rewards_file_version: REWARDS_FILE_VERSION,
            ruleset_version: 0,
            network: 0,
            index: 0,
            start_time: 0,
            end_time: 0,
            consensus_start_block: 0,
            consensus_end_block: 0,
            execution_start_block: 0,
            execution_end_block: 0,
            intervals_passed: 0,
            total_rewards: None,
            merkle_root: Hash::ZERO,
            network_rewards: Vec::new(),
            node_rewards: Vec::new(),
            proofs: Mutex::new(None),
        }
    }

    // ─── Reward lists ───────────────────────────────────────────

    pub fn node_rewards(&self) -> &[NodeReward] {
        &self.node_rewards
    }

    pub fn network_rewards(&self) -> &[NetworkReward] {
        &self.network_rewards
    }

    /// Mutable node list. Drops any memoised proofs.
    pub fn node_rewards_mut(&mut self) -> &mut Vec<NodeReward> {
        self.invalidate_proofs();
        &mut self.node_rewards
    }

    /// Mutable network list. Network rewards are not part of the tree, so
    /// proofs survive.
    pub fn network_rewards_mut(&mut self) -> &mut Vec<NetworkReward> {
        &mut self.network_rewards
    }

    /// Sort both lists into canonical order. Used when assembling a new
    /// file; decoders never call this.
    pub fn sort(&mut self) {
        self.node_rewards_mut().sort_by_key(|n| n.address);
        self.network_rewards.sort_by_key(|n| n.network);
    }

    // ─── Merkle root and proofs ─────────────────────────────────

    /// The root as stored in the file. All zero when unset.
    pub fn declared_root(&self) -> Hash {
        self.merkle_root
    }

    /// Overwrite the declared root. Drops any memoised proofs.
    pub fn set_merkle_root(&mut self, root: Hash) {
        self.invalidate_proofs();
        self.merkle_root = root;
    }

    /// The declared root, or the computed one when unset.
    pub fn merkle_root(&self) -> Result<Hash> {
        Ok(self.proofs()?.root)
    }

    /// Merkle proofs for every node, computed at most once per file.
    ///
    /// The node list must already be in canonical order; an unsorted or
    /// duplicated list is reported, never hashed. Fails with `RootMismatch`
    /// when a declared root disagrees with the tree built from the list.
    pub fn proofs(&self) -> Result<Arc<ProofSet>> {
        let mut cache = self.proofs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(set) = cache.as_ref() {
            return Ok(Arc::clone(set));
        }
        self.check_node_order()?;

        let leaves = self
            .node_rewards
            .iter()
            .map(NodeReward::leaf)
            .collect::<Result<Vec<_>>>()?;
        let tree = MerkleTree::build(&leaves);
        let computed = tree.root();

        if !self.merkle_root.is_zero() && self.merkle_root != computed {
            return Err(InvariantViolation::RootMismatch {
                declared: self.merkle_root,
                computed,
            }
            .into());
        }

        let proofs = (0..leaves.len())
            .filter_map(|i| tree.proof_at(i))
            .collect::<Vec<_>>();
        debug!(
            root = hex::encode(computed.0),
            nodes = leaves.len(),
            "computed merkle proofs"
        );

        let set = Arc::new(ProofSet {
            root: computed,
            proofs,
        });
        *cache = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Proof for one node, `None` if the node has no entry.
    pub fn merkle_proof(&self, address: &Address) -> Result<Option<MerkleProof>> {
        let proofs = self.proofs()?;
        // ordering was checked by `proofs`
        let Ok(i) = self.node_rewards.binary_search_by_key(address, |n| n.address) else {
            return Ok(None);
        };
        Ok(proofs.proofs.get(i).cloned())
    }

    fn invalidate_proofs(&mut self) {
        *self.proofs.get_mut().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Store the computed root when none is declared.
    pub(crate) fn fill_root(&mut self) -> Result<()> {
        if self.merkle_root.is_zero() {
            let root = self.merkle_root()?;
            // proofs stay valid, they were computed for this exact list
            self.merkle_root = root;
        }
        Ok(())
    }

    // ─── Verification ───────────────────────────────────────────

    /// Check ordering, uniqueness, totals presence and root consistency.
    pub fn verify(&self) -> Result<()> {
        self.check_node_order()?;

        let mut seen = BTreeSet::new();
        for reward in &self.network_rewards {
            if !seen.insert(reward.network) {
                return Err(InvariantViolation::DuplicateNetworkReward(reward.network).into());
            }
        }
        for pair in self.network_rewards.windows(2) {
            if pair[0].network > pair[1].network {
                return Err(InvariantViolation::NetworkRewardsOutOfOrder(pair[1].network).into());
            }
        }

        if self.total_rewards.is_none() {
            return Err(InvariantViolation::MissingTotals.into());
        }

        self.proofs().map(|_| ())
    }

    /// Node list is unique and strictly ascending by address.
    fn check_node_order(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for node in &self.node_rewards {
            if !seen.insert(node.address) {
                return Err(InvariantViolation::DuplicateNodeReward(node.address).into());
            }
        }
        for pair in self.node_rewards.windows(2) {
            if pair[0].address > pair[1].address {
                return Err(InvariantViolation::NodeRewardsOutOfOrder(pair[1].address).into());
            }
        }
        Ok(())
    }

    // ─── Lookups ────────────────────────────────────────────────

    fn node(&self, address: &Address) -> Option<&NodeReward> {
        self.node_rewards.iter().find(|n| n.address == *address)
    }

    fn network_reward(&self, network: NetworkId) -> Option<&NetworkReward> {
        self.network_rewards.iter().find(|n| n.network == network)
    }

    pub fn has_rewards_for(&self, address: &Address) -> bool {
        self.node(address).is_some()
    }

    pub fn has_rewards_for_network(&self, network: NetworkId) -> bool {
        self.network_reward(network).is_some()
    }

    pub fn node_collateral(&self, address: &Address) -> Uint256 {
        self.node(address).map(|n| n.collateral).unwrap_or_default()
    }

    pub fn node_oracle_dao(&self, address: &Address) -> Uint256 {
        self.node(address).map(|n| n.oracle_dao).unwrap_or_default()
    }

    pub fn node_smoothing_pool_eth(&self, address: &Address) -> Uint256 {
        self.node(address)
            .map(|n| n.smoothing_pool_eth)
            .unwrap_or_default()
    }

    pub fn network_collateral(&self, network: NetworkId) -> Uint256 {
        self.network_reward(network)
            .map(|n| n.collateral)
            .unwrap_or_default()
    }

    pub fn network_oracle_dao(&self, network: NetworkId) -> Uint256 {
        self.network_reward(network)
            .map(|n| n.oracle_dao)
            .unwrap_or_default()
    }

    pub fn network_smoothing_pool_eth(&self, network: NetworkId) -> Uint256 {
        self.network_reward(network)
            .map(|n| n.smoothing_pool_eth)
            .unwrap_or_default()
    }

    /// Construct from already-decoded parts. Callers must verify.
    pub(crate) fn from_parts(
        header: Header,
        merkle_root: Hash,
        total_rewards: Option<TotalRewards>,
        network_rewards: Vec<NetworkReward>,
        node_rewards: Vec<NodeReward>,
    ) -> Self {
        Self {
            rewards_file_version: header.rewards_file_version,
            ruleset_version: header.ruleset_version,
            network: header.network,
            index: header.index,
            start_time: header.start_time,
            end_time: header.end_time,
            consensus_start_block: header.consensus_start_block,
            consensus_end_block: header.consensus_end_block,
            execution_start_block: header.execution_start_block,
            execution_end_block: header.execution_end_block,
            intervals_passed: header.intervals_passed,
            total_rewards,
            merkle_root,
            network_rewards,
            node_rewards,
            proofs: Mutex::new(None),
        }
    }

    pub(crate) fn header(&self) -> Header {
        Header {
            rewards_file_version: self.rewards_file_version,
            ruleset_version: self.ruleset_version,
            network: self.network,
            index: self.index,
            start_time: self.start_time,
            end_time: self.end_time,
            consensus_start_block: self.consensus_start_block,
            consensus_end_block: self.consensus_end_block,
            execution_start_block: self.execution_start_block,
            execution_end_block: self.execution_end_block,
            intervals_passed: self.intervals_passed,
        }
    }
}

/// Scalar header fields shared by both encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Header {
    pub rewards_file_version: u64,
    pub ruleset_version: u64,
    pub network: u64,
    pub index: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub consensus_start_block: u64,
    pub consensus_end_block: u64,
    pub execution_start_block: u64,
    pub execution_end_block: u64,
    pub intervals_passed: u64,
}

impl Default for RewardsFile {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RewardsFile {
    fn clone(&self) -> Self {
        let cached = self
            .proofs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let mut copy = Self::from_parts(
            self.header(),
            self.merkle_root,
            self.total_rewards.clone(),
            self.network_rewards.clone(),
            self.node_rewards.clone(),
        );
        copy.proofs = Mutex::new(cached);
        copy
    }
}

/// Equality over file contents; the proof cache is ignored.
impl PartialEq for RewardsFile {
    fn eq(&self, other: &Self) -> bool {
        self.header() == other.header()
            && self.merkle_root == other.merkle_root
            && self.total_rewards == other.total_rewards
            && self.network_rewards == other.network_rewards
            && self.node_rewards == other.node_rewards
    }
}

impl Eq for RewardsFile {}

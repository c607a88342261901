//! Participant records.
//!
//! [`NodeDetails`] can only be built through [`NodeDetails::new`], which is
//! where the effective-stake floor is enforced.

use rewardtree_core::{Address, NetworkId, Timestamp, Uint256};

/// Per-node values exactly as read from chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNodeDetails {
    pub address: Address,
    pub registration_time: Timestamp,
    pub reward_network: NetworkId,
    pub smoothing_pool_opted_in: bool,
    pub smoothing_pool_changed: Timestamp,
    pub legacy_staked: Uint256,
    pub megapool_staked: Uint256,
    pub effective_stake: Uint256,
    pub minimum_stake: Uint256,
    pub eth_borrowed: Uint256,
    pub eth_bonded: Uint256,
    pub megapool_eth_bonded: Uint256,
    pub minipool_count: u64,
    pub active_minipool_count: u64,
    pub megapool_deployed: bool,
    pub megapool_address: Address,
}

/// A node's pooled-validator contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MegapoolDetails {
    pub address: Address,
    pub active_validators: u64,
    pub locked_validators: u64,
    pub exited_validators: u64,
    /// Bond required for the current active validator count.
    pub bond_requirement: Uint256,
}

/// One participant in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDetails {
    pub address: Address,
    pub registration_time: Timestamp,
    pub reward_network: NetworkId,
    pub smoothing_pool_opted_in: bool,
    pub smoothing_pool_changed: Timestamp,
    pub legacy_staked: Uint256,
    pub megapool_staked: Uint256,
    pub minimum_stake: Uint256,
    pub eth_borrowed: Uint256,
    pub eth_bonded: Uint256,
    pub megapool_eth_bonded: Uint256,
    pub minipool_count: u64,
    pub active_minipool_count: u64,
    pub megapool: Option<MegapoolDetails>,
    /// Native-currency balance of the node address.
    pub balance: Uint256,
    effective_stake: Uint256,
}

impl NodeDetails {
    /// Build a participant record. Effective stake below the node's minimum
    /// is floored to zero here and nowhere else.
    pub fn new(raw: RawNodeDetails, megapool: Option<MegapoolDetails>, balance: Uint256) -> Self {
        let effective_stake = if raw.effective_stake < raw.minimum_stake {
            Uint256::ZERO
        } else {
            raw.effective_stake
        };

        Self {
            address: raw.address,
            registration_time: raw.registration_time,
            reward_network: raw.reward_network,
            smoothing_pool_opted_in: raw.smoothing_pool_opted_in,
            smoothing_pool_changed: raw.smoothing_pool_changed,
            legacy_staked: raw.legacy_staked,
            megapool_staked: raw.megapool_staked,
            minimum_stake: raw.minimum_stake,
            eth_borrowed: raw.eth_borrowed,
            eth_bonded: raw.eth_bonded,
            megapool_eth_bonded: raw.megapool_eth_bonded,
            minipool_count: raw.minipool_count,
            active_minipool_count: raw.active_minipool_count,
            megapool,
            balance,
            effective_stake,
        }
    }

    /// Effective stake, zero when below the node's minimum.
    pub fn effective_stake(&self) -> Uint256 {
        self.effective_stake
    }

    /// Legacy plus pooled-validator staked tokens.
    pub fn total_staked(&self) -> Uint256 {
        self.legacy_staked.saturating_add(self.megapool_staked)
    }

    /// Active legacy pools plus active pooled validators.
    pub fn active_sub_accounts(&self) -> u64 {
        let pooled = self.megapool.as_ref().map_or(0, |m| m.active_validators);
        self.active_minipool_count.saturating_add(pooled)
    }

    /// Whether the node was opted into the smoothing pool at `time`.
    pub fn was_opted_in_at(&self, time: Timestamp) -> bool {
        if self.smoothing_pool_opted_in {
            self.smoothing_pool_changed <= time
        } else {
            self.smoothing_pool_changed > time
        }
    }
}

//! Interval rewards assembly.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use rewardtree_core::{Address, NetworkId, Uint256};
use rewardtree_file::{NetworkReward, NodeReward, TotalRewards};
use rewardtree_state::NetworkState;

use crate::collateral::NodeWeights;
use crate::math::{add, mul_div, one, pro_rata, sub};
use crate::oracle::oracle_participation;
use crate::smoothing::SmoothingPoolSplit;
use crate::voting::NetworkVotingPower;
use crate::window::IntervalWindow;
use crate::{Result, RewardsError};

/// Calculator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatorConfig {
    /// Destination networks rewards may be routed to (default: `[0]`).
    /// Nodes asking for anything else are paid on network 0.
    pub valid_networks: BTreeSet<NetworkId>,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            valid_networks: BTreeSet::from([0]),
        }
    }
}

/// Everything the calculator produces for one interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardsResult {
    pub totals: TotalRewards,
    /// Ascending by network id.
    pub network_rewards: Vec<NetworkReward>,
    /// Ascending by address; nodes with nothing to claim are left out.
    pub node_rewards: Vec<NodeReward>,
    pub voting_power: NetworkVotingPower,
}

pub struct RewardsCalculator {
    config: CalculatorConfig,
}

impl RewardsCalculator {
    pub fn new(config: CalculatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    fn route(&self, network: NetworkId) -> NetworkId {
        if self.config.valid_networks.contains(&network) {
            network
        } else {
            0
        }
    }

    /// The reward record for `address`, created on first use. Oracle
    /// members that are not registered nodes are paid on network 0.
    fn entry<'a>(
        &self,
        nodes: &'a mut BTreeMap<Address, NodeReward>,
        state: &NetworkState,
        address: Address,
    ) -> &'a mut NodeReward {
        let network = state.node(&address).map_or(0, |n| self.route(n.reward_network));
        nodes
            .entry(address)
            .or_insert_with(|| NodeReward::new(address, network))
    }

    /// Compute every reward for `window` from `state`.
    ///
    /// The token pool is split by the configured percentages. Whatever the
    /// node operator and oracle committee parts do not hand out, including
    /// rounding dust and the whole node operator part when no node has any
    /// weight, goes to the protocol treasury.
    pub fn calculate(&self, state: &NetworkState, window: IntervalWindow) -> Result<RewardsResult> {
        let network = &state.network;
        let shares = [
            network.node_operator_share,
            network.oracle_dao_share,
            network.protocol_dao_share,
        ];
        let share_sum = shares
            .iter()
            .try_fold(Uint256::ZERO, |acc, s| acc.checked_add(*s));
        if share_sum != Some(one()) {
            return Err(RewardsError::InvalidShares {
                node_operator: network.node_operator_share,
                oracle_dao: network.oracle_dao_share,
                protocol_dao: network.protocol_dao_share,
            });
        }

        let pending = network.pending_rewards;
        let node_operator_pool = mul_div(pending, network.node_operator_share, one(), "node operator pool")?;
        let oracle_pool = mul_div(pending, network.oracle_dao_share, one(), "oracle pool")?;

        // Collateral
        let weights = NodeWeights::compute(state, &window)?;
        let collateral = pro_rata(node_operator_pool, &weights.weights, weights.total)?;

        // Oracle committee
        let participation = oracle_participation(&state.oracle_members, &window);
        let participation_total = participation
            .iter()
            .try_fold(Uint256::ZERO, |acc, (_, s)| add(acc, *s, "oracle participation"))?;
        let oracle = pro_rata(oracle_pool, &participation, participation_total)?;

        // Smoothing pool
        let smoothing = SmoothingPoolSplit::compute(state, &window)?;

        let mut nodes: BTreeMap<Address, NodeReward> = BTreeMap::new();
        for (address, amount) in &collateral {
            let reward = self.entry(&mut nodes, state, *address);
            reward.collateral = add(reward.collateral, *amount, "node collateral")?;
        }
        for (address, amount) in &oracle {
            let reward = self.entry(&mut nodes, state, *address);
            reward.oracle_dao = add(reward.oracle_dao, *amount, "node oracle reward")?;
        }
        for (address, amount) in &smoothing.per_node {
            let reward = self.entry(&mut nodes, state, *address);
            reward.smoothing_pool_eth = add(reward.smoothing_pool_eth, *amount, "node smoothing reward")?;
        }
        nodes.retain(|_, r| !(r.collateral.is_zero() && r.oracle_dao.is_zero() && r.smoothing_pool_eth.is_zero()));

        let mut networks: BTreeMap<NetworkId, NetworkReward> = BTreeMap::new();
        let mut total_collateral = Uint256::ZERO;
        let mut total_oracle = Uint256::ZERO;
        for reward in nodes.values() {
            let net = networks
                .entry(reward.network)
                .or_insert_with(|| NetworkReward::new(reward.network));
            net.collateral = add(net.collateral, reward.collateral, "network collateral")?;
            net.oracle_dao = add(net.oracle_dao, reward.oracle_dao, "network oracle reward")?;
            net.smoothing_pool_eth = add(net.smoothing_pool_eth, reward.smoothing_pool_eth, "network smoothing reward")?;
            total_collateral = add(total_collateral, reward.collateral, "total collateral")?;
            total_oracle = add(total_oracle, reward.oracle_dao, "total oracle reward")?;
        }

        let protocol_dao = sub(
            sub(pending, total_collateral, "protocol treasury share")?,
            total_oracle,
            "protocol treasury share",
        )?;

        let totals = TotalRewards {
            protocol_dao,
            total_collateral,
            total_oracle_dao: total_oracle,
            total_smoothing_pool_eth: network.smoothing_pool_balance,
            pool_staker_smoothing_pool_eth: smoothing.pool_staker,
            node_operator_smoothing_pool_eth: smoothing.node_operator_total,
            total_node_weight: weights.total,
        };
        let voting_power = NetworkVotingPower::compute(state)?;

        info!(
            block = state.block,
            nodes = nodes.len(),
            networks = networks.len(),
            protocol_dao = %totals.protocol_dao,
            total_collateral = %totals.total_collateral,
            total_oracle_dao = %totals.total_oracle_dao,
            node_operator_eth = %totals.node_operator_smoothing_pool_eth,
            "calculated interval rewards"
        );

        Ok(RewardsResult {
            totals,
            network_rewards: networks.into_values().collect(),
            node_rewards: nodes.into_values().collect(),
            voting_power,
        })
    }
}

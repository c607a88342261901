//! Smoothing-pool split.
//!
//! Every eligible validator of an opted-in node scores
//! `fee + bond / 32 * (1 - fee)`. Node operators as a whole receive the
//! balance scaled by the average score, and each node takes its share of
//! that by score. Pool stakers receive the rest. A node opted in for part of
//! the window has its validators counted for that part only.

use rewardtree_core::{Address, Uint256, ONE_ETH, VALIDATOR_DEPOSIT_ETH};
use rewardtree_state::{NetworkState, NodeDetails};
use tracing::debug;

use crate::math::{add, mul_div, one, sub};
use crate::window::IntervalWindow;
use crate::{Result, RewardsError};

/// Score of one validator: `fee + bond / 32 * (1 - fee)` at 18 decimals.
pub fn validator_score(fee: Uint256, bond: Uint256) -> Result<Uint256> {
    let deposit = Uint256::from(VALIDATOR_DEPOSIT_ETH as u128 * ONE_ETH);
    let remainder = sub(one(), fee, "validator fee")?;
    let bonded = mul_div(bond, remainder, deposit, "validator score")?;
    add(fee, bonded, "validator score")
}

/// Seconds of the window the node spent opted in.
fn opted_in_seconds(node: &NodeDetails, window: &IntervalWindow) -> u64 {
    if node.smoothing_pool_opted_in {
        window.seconds_after(node.smoothing_pool_changed)
    } else {
        window.seconds_before(node.smoothing_pool_changed)
    }
}

/// Summed score and count of the eligible validators a node runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct NodeScore {
    sum: Uint256,
    validators: u64,
}

fn node_score(state: &NetworkState, node: &NodeDetails) -> Result<NodeScore> {
    let mut total = NodeScore::default();
    for pool in state.minipools_for(&node.address).filter(|p| p.is_active()) {
        let score = validator_score(pool.node_fee, pool.node_deposit_balance)?;
        total.sum = add(total.sum, score, "node score")?;
        total.validators += 1;
    }
    if let Some(megapool) = node.megapool.as_ref().filter(|m| m.active_validators > 0) {
        let count = Uint256::from(megapool.active_validators);
        let bond = node
            .megapool_eth_bonded
            .checked_div(count)
            .unwrap_or_default();
        let score = validator_score(state.network.megapool_node_share, bond)?;
        let pooled = score
            .checked_mul(count)
            .ok_or(RewardsError::Overflow("megapool score"))?;
        total.sum = add(total.sum, pooled, "node score")?;
        total.validators = total
            .validators
            .checked_add(megapool.active_validators)
            .ok_or(RewardsError::Overflow("validator count"))?;
    }
    Ok(total)
}

/// Smoothing-pool balance split for one window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmoothingPoolSplit {
    /// Sum of every node's share.
    pub node_operator_total: Uint256,
    /// Balance minus the node operator total.
    pub pool_staker: Uint256,
    /// Nodes with a non-zero share, in snapshot order.
    pub per_node: Vec<(Address, Uint256)>,
}

impl SmoothingPoolSplit {
    pub fn compute(state: &NetworkState, window: &IntervalWindow) -> Result<Self> {
        let balance = state.network.smoothing_pool_balance;
        let duration = Uint256::from(window.duration());

        let mut node_scores_weighted = Vec::new();
        let mut total_score = Uint256::ZERO;
        let mut total_count = Uint256::ZERO;
        for node in &state.nodes {
            let seconds = opted_in_seconds(node, window);
            if seconds == 0 {
                continue;
            }
            let raw = node_score(state, node)?;
            if raw.validators == 0 {
                continue;
            }
            let fraction = mul_div(Uint256::from(seconds), one(), duration, "opt-in fraction")?;
            let score = mul_div(raw.sum, fraction, one(), "node score")?;
            let count = Uint256::from(raw.validators)
                .checked_mul(fraction)
                .ok_or(RewardsError::Overflow("validator count"))?;

            total_score = add(total_score, score, "total score")?;
            total_count = add(total_count, count, "total validator count")?;
            node_scores_weighted.push((node.address, score));
        }

        if total_score.is_zero() || balance.is_zero() {
            return Ok(Self {
                pool_staker: balance,
                ..Default::default()
            });
        }

        let node_operator_pool = mul_div(balance, total_score, total_count, "node operator share")?.min(balance);
        let mut split = Self::default();
        for (address, score) in node_scores_weighted {
            let share = mul_div(node_operator_pool, score, total_score, "node smoothing share")?;
            if share.is_zero() {
                continue;
            }
            split.node_operator_total = add(split.node_operator_total, share, "node operator total")?;
            split.per_node.push((address, share));
        }
        split.pool_staker = sub(balance, split.node_operator_total, "pool staker share")?;

        debug!(
            nodes = split.per_node.len(),
            node_operators = %split.node_operator_total,
            pool_stakers = %split.pool_staker,
            "split smoothing pool"
        );
        Ok(split)
    }
}

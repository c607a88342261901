//! Voting power.
//!
//! ```text
//! eth_provided = 32 * active_sub_accounts - borrowed + pooled_bonded   (floored at 0)
//! max_tokens   = eth_provided * 1.5 / token_price
//! power        = isqrt(min(max_tokens, stake) * 1e18)
//! ```
//!
//! Integer square root only, so the score is bit-exact everywhere.

use serde::{Deserialize, Serialize};
use tracing::info;

use rewardtree_core::{Address, BlockNumber, Uint256, ONE_ETH, ONE_TOKEN, VALIDATOR_DEPOSIT_ETH};
use rewardtree_state::{NetworkState, NodeDetails};

use crate::math::{add, mul_div, one};
use crate::{Result, RewardsError};

/// 1.5 at 18 decimals.
const MAX_VOTING_RATIO: u128 = 1_500_000_000_000_000_000;

/// Native currency the node itself has put up, floored at zero.
pub fn eth_provided(node: &NodeDetails) -> Result<Uint256> {
    let deposits = Uint256::from(VALIDATOR_DEPOSIT_ETH as u128 * ONE_ETH)
        .checked_mul(Uint256::from(node.active_sub_accounts()))
        .ok_or(RewardsError::Overflow("validator deposits"))?;
    let provided = add(deposits, node.megapool_eth_bonded, "eth provided")?;
    Ok(provided.saturating_sub(node.eth_borrowed))
}

/// Voting power of one node at `token_price`.
pub fn voting_power(node: &NodeDetails, token_price: Uint256) -> Result<Uint256> {
    let stake = node.total_staked();
    if stake.is_zero() {
        return Ok(Uint256::ZERO);
    }
    let provided = eth_provided(node)?;
    if provided.is_zero() {
        return Ok(Uint256::ZERO);
    }
    if token_price.is_zero() {
        return Err(RewardsError::ZeroTokenPrice);
    }

    let max_tokens = mul_div(provided, Uint256::from(MAX_VOTING_RATIO), token_price, "max voting tokens")?;
    let tokens = max_tokens.min(stake);
    let scaled = tokens
        .checked_mul(Uint256::from(ONE_TOKEN))
        .ok_or(RewardsError::Overflow("voting tokens"))?;
    Ok(scaled.isqrt())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeVotingPower {
    pub address: Address,
    pub voting_power: Uint256,
}

/// Voting power of every node at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkVotingPower {
    pub block: BlockNumber,
    pub total_voting_power: Uint256,
    pub nodes: Vec<NodeVotingPower>,
}

impl NetworkVotingPower {
    pub fn compute(state: &NetworkState) -> Result<Self> {
        let price = state.network.token_price;
        let mut total = Uint256::ZERO;
        let mut nodes = Vec::with_capacity(state.nodes.len());
        for node in &state.nodes {
            let power = voting_power(node, price)?;
            total = add(total, power, "total voting power")?;
            nodes.push(NodeVotingPower {
                address: node.address,
                voting_power: power,
            });
        }
        info!(
            block = state.block,
            nodes = nodes.len(),
            total = %total,
            "computed voting power"
        );
        Ok(Self {
            block: state.block,
            total_voting_power: total,
            nodes,
        })
    }

    pub fn node(&self, address: &Address) -> Uint256 {
        self.nodes
            .iter()
            .find(|n| n.address == *address)
            .map(|n| n.voting_power)
            .unwrap_or_default()
    }
}

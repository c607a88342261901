//! Collateral weight.
//!
//! A node's weight grows linearly with the value of its staked tokens up to
//! 15% of the native currency it borrows, and logarithmically beyond that:
//!
//! ```text
//! pct    = stake_value / borrowed * 100
//! weight = 100 * stake_value                          if pct <= 15
//!        = (13.6137 + 2 * ln(pct - 13)) * borrowed    otherwise
//! ```
//!
//! Both branches meet at 15%. Nodes below the minimum collateral, or with
//! nothing borrowed, weigh zero.

use rewardtree_core::{Address, Uint256};
use rewardtree_state::{NetworkDetails, NetworkState, NodeDetails};

use crate::math::{self, add, fixed, mul_div, one};
use crate::window::IntervalWindow;
use crate::{Result, RewardsError};

/// Percentage at which the weight curve turns logarithmic.
const LINEAR_LIMIT_PCT: u64 = 15;

/// Offset subtracted from the percentage inside the logarithm.
const LOG_OFFSET_PCT: u64 = 13;

/// 13.6137 at 18 decimals.
const LOG_BASE: u128 = 13_613_700_000_000_000_000;

/// Weight of one node for the window.
pub fn node_weight(node: &NodeDetails, network: &NetworkDetails, window: &IntervalWindow) -> Result<Uint256> {
    let stake = node.effective_stake();
    let borrowed = node.eth_borrowed;
    if stake.is_zero() || borrowed.is_zero() {
        return Ok(Uint256::ZERO);
    }
    let price = network.token_price;
    if price.is_zero() {
        return Err(RewardsError::ZeroTokenPrice);
    }

    let min_collateral = mul_div(borrowed, network.min_collateral_fraction, price, "minimum collateral")?;
    if stake < min_collateral {
        return Ok(Uint256::ZERO);
    }

    let stake_value = mul_div(stake, price, one(), "stake value")?;
    let pct = mul_div(stake_value, fixed(100), borrowed, "collateral percentage")?;

    let weight = if pct <= fixed(LINEAR_LIMIT_PCT) {
        stake_value
            .checked_mul(Uint256::from(100u64))
            .ok_or(RewardsError::Overflow("linear weight"))?
    } else {
        let log = math::ln(pct - fixed(LOG_OFFSET_PCT))?;
        let doubled = add(log, log, "weight logarithm")?;
        let factor = add(Uint256::from(LOG_BASE), doubled, "weight factor")?;
        mul_div(factor, borrowed, one(), "logarithmic weight")?
    };

    window.prorate(weight, window.seconds_after(node.registration_time))
}

/// Collateral weight of every node in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeWeights {
    /// Nodes with non-zero weight, in snapshot order.
    pub weights: Vec<(Address, Uint256)>,
    pub total: Uint256,
}

impl NodeWeights {
    pub fn compute(state: &NetworkState, window: &IntervalWindow) -> Result<Self> {
        let mut out = Self::default();
        for node in &state.nodes {
            let weight = node_weight(node, &state.network, window)?;
            if weight.is_zero() {
                continue;
            }
            out.total = add(out.total, weight, "total node weight")?;
            out.weights.push((node.address, weight));
        }
        Ok(out)
    }
}

//! Rewards Tree Calculator
//!
//! Pure functions over a [`NetworkState`](rewardtree_state::NetworkState):
//! the interval's token inflation is split between the protocol treasury,
//! the oracle committee and node operators, the smoothing-pool balance is
//! split between node operators and pool stakers, and every node gets a
//! voting-power score. All arithmetic is integer and checked, so results are
//! bit-exact and reproducible.

pub mod calculator;
pub mod collateral;
pub mod math;
pub mod oracle;
pub mod smoothing;
pub mod voting;
pub mod window;
#[cfg(test)]
mod tests;

pub use calculator::{CalculatorConfig, RewardsCalculator, RewardsResult};
pub use collateral::{node_weight, NodeWeights};
pub use oracle::oracle_participation;
pub use smoothing::{validator_score, SmoothingPoolSplit};
pub use voting::{eth_provided, voting_power, NetworkVotingPower, NodeVotingPower};
pub use window::IntervalWindow;

use rewardtree_core::{Timestamp, Uint256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewardsError {
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
    #[error("token price is zero")]
    ZeroTokenPrice,
    #[error("reward shares do not sum to 100%: node operators {node_operator}, oracle committee {oracle_dao}, protocol treasury {protocol_dao}")]
    InvalidShares {
        node_operator: Uint256,
        oracle_dao: Uint256,
        protocol_dao: Uint256,
    },
    #[error("interval end {end} is not after start {start}")]
    InvalidInterval { start: Timestamp, end: Timestamp },
}

pub type Result<T> = std::result::Result<T, RewardsError>;

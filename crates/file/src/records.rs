//! Record types carried inside a rewards file.

use serde::{Deserialize, Serialize};

use rewardtree_core::{Address, NetworkId, Uint256};

use crate::{FileError, Result};

/// Size of one Merkle leaf record: address, network, token sum, native sum.
pub const LEAF_SIZE: usize = 20 + 32 + 32 + 32;

/// Aggregate totals for the interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalRewards {
    /// Tokens sent to the protocol treasury.
    #[serde(rename = "protocolDaoRpl")]
    pub protocol_dao: Uint256,
    /// Tokens distributed to node operators for collateral.
    #[serde(rename = "totalCollateralRpl")]
    pub total_collateral: Uint256,
    /// Tokens distributed to the oracle committee.
    #[serde(rename = "totalOracleDaoRpl")]
    pub total_oracle_dao: Uint256,
    /// Smoothing pool balance at the end of the interval.
    #[serde(rename = "totalSmoothingPoolEth")]
    pub total_smoothing_pool_eth: Uint256,
    /// Smoothing pool share returned to pool stakers.
    #[serde(rename = "poolStakerSmoothingPoolEth")]
    pub pool_staker_smoothing_pool_eth: Uint256,
    /// Smoothing pool share paid to node operators.
    #[serde(rename = "nodeOperatorSmoothingPoolEth")]
    pub node_operator_smoothing_pool_eth: Uint256,
    /// Sum of every node's collateral weight.
    pub total_node_weight: Uint256,
}

/// Amounts routed to one destination network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkReward {
    pub network: NetworkId,
    pub collateral: Uint256,
    pub oracle_dao: Uint256,
    pub smoothing_pool_eth: Uint256,
}

impl NetworkReward {
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }
}

/// One node's entitlement for the interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeReward {
    pub address: Address,
    /// Destination network for this node's claim.
    pub network: NetworkId,
    pub collateral: Uint256,
    pub oracle_dao: Uint256,
    pub smoothing_pool_eth: Uint256,
}

impl NodeReward {
    pub fn new(address: Address, network: NetworkId) -> Self {
        Self {
            address,
            network,
            ..Default::default()
        }
    }

    /// Total token amount across the collateral and oracle pools.
    pub fn total_tokens(&self) -> Result<Uint256> {
        self.collateral
            .checked_add(self.oracle_dao)
            .ok_or(FileError::Overflow(self.address))
    }

    /// Merkle leaf: `address || network || collateral + oracle || eth`.
    pub fn leaf(&self) -> Result<[u8; LEAF_SIZE]> {
        let mut leaf = [0u8; LEAF_SIZE];
        leaf[..20].copy_from_slice(self.address.as_bytes());
        leaf[20..52].copy_from_slice(&Uint256::from(self.network).to_bytes32());
        leaf[52..84].copy_from_slice(&self.total_tokens()?.to_bytes32());
        leaf[84..].copy_from_slice(&self.smoothing_pool_eth.to_bytes32());
        Ok(leaf)
    }
}

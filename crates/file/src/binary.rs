//! Binary form of the rewards file.
//!
//! Layout, in order: 4-byte magic, then the header integers, the 32-byte
//! Merkle root, seven 32-byte totals, the length-prefixed network reward
//! list and the length-prefixed node reward list. Integers and length
//! prefixes are variable width and big-endian; amounts are fixed 32-byte
//! big-endian. Merkle proofs are never part of this form.

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rewardtree_core::{Address, Hash, Uint256};

use crate::file::{Header, RewardsFile};
use crate::records::{NetworkReward, NodeReward, TotalRewards};
use crate::{FileError, InvariantViolation, Result};

/// Format tag at the start of every binary rewards file ("RPRT").
pub const MAGIC_HEADER: [u8; 4] = [0x52, 0x50, 0x52, 0x54];

/// Format version written by this crate.
pub const REWARDS_FILE_VERSION: u64 = 4;

/// Upper bound on a decoded file, guards against hostile length prefixes.
const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
struct WireTotals {
    protocol_dao: [u8; 32],
    total_collateral: [u8; 32],
    total_oracle_dao: [u8; 32],
    total_smoothing_pool_eth: [u8; 32],
    pool_staker_smoothing_pool_eth: [u8; 32],
    node_operator_smoothing_pool_eth: [u8; 32],
    total_node_weight: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct WireNetworkReward {
    network: u64,
    collateral: [u8; 32],
    oracle_dao: [u8; 32],
    smoothing_pool_eth: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct WireNodeReward {
    address: [u8; 20],
    network: u64,
    collateral: [u8; 32],
    oracle_dao: [u8; 32],
    smoothing_pool_eth: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct WireFile {
    magic: [u8; 4],
    header: Header,
    merkle_root: [u8; 32],
    total_rewards: WireTotals,
    network_rewards: Vec<WireNetworkReward>,
    node_rewards: Vec<WireNodeReward>,
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_varint_encoding()
        .with_limit(MAX_FILE_SIZE)
        .reject_trailing_bytes()
}

fn amount(bytes: &[u8; 32]) -> Result<Uint256> {
    Uint256::from_bytes32(bytes).map_err(|e| FileError::Malformed(e.to_string()))
}

impl WireTotals {
    fn from_totals(t: &TotalRewards) -> Self {
        Self {
            protocol_dao: t.protocol_dao.to_bytes32(),
            total_collateral: t.total_collateral.to_bytes32(),
            total_oracle_dao: t.total_oracle_dao.to_bytes32(),
            total_smoothing_pool_eth: t.total_smoothing_pool_eth.to_bytes32(),
            pool_staker_smoothing_pool_eth: t.pool_staker_smoothing_pool_eth.to_bytes32(),
            node_operator_smoothing_pool_eth: t.node_operator_smoothing_pool_eth.to_bytes32(),
            total_node_weight: t.total_node_weight.to_bytes32(),
        }
    }

    fn into_totals(self) -> Result<TotalRewards> {
        Ok(TotalRewards {
            protocol_dao: amount(&self.protocol_dao)?,
            total_collateral: amount(&self.total_collateral)?,
            total_oracle_dao: amount(&self.total_oracle_dao)?,
            total_smoothing_pool_eth: amount(&self.total_smoothing_pool_eth)?,
            pool_staker_smoothing_pool_eth: amount(&self.pool_staker_smoothing_pool_eth)?,
            node_operator_smoothing_pool_eth: amount(&self.node_operator_smoothing_pool_eth)?,
            total_node_weight: amount(&self.total_node_weight)?,
        })
    }
}

impl RewardsFile {
    /// Re-stamp the format version, verify, fill an unset root and encode.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        self.rewards_file_version = REWARDS_FILE_VERSION;
        self.verify()?;
        self.fill_root()?;

        let totals = self
            .total_rewards
            .as_ref()
            .ok_or(InvariantViolation::MissingTotals)?;

        let wire = WireFile {
            magic: MAGIC_HEADER,
            header: self.header(),
            merkle_root: self.declared_root().0,
            total_rewards: WireTotals::from_totals(totals),
            network_rewards: self
                .network_rewards()
                .iter()
                .map(|n| WireNetworkReward {
                    network: n.network,
                    collateral: n.collateral.to_bytes32(),
                    oracle_dao: n.oracle_dao.to_bytes32(),
                    smoothing_pool_eth: n.smoothing_pool_eth.to_bytes32(),
                })
                .collect(),
            node_rewards: self
                .node_rewards()
                .iter()
                .map(|n| WireNodeReward {
                    address: n.address.0,
                    network: n.network,
                    collateral: n.collateral.to_bytes32(),
                    oracle_dao: n.oracle_dao.to_bytes32(),
                    smoothing_pool_eth: n.smoothing_pool_eth.to_bytes32(),
                })
                .collect(),
        };

        let bytes = options()
            .serialize(&wire)
            .map_err(|e| FileError::Malformed(e.to_string()))?;
        debug!(
            index = self.index,
            nodes = wire.node_rewards.len(),
            bytes = bytes.len(),
            "finalized rewards file"
        );
        Ok(bytes)
    }

    /// Decode and verify a binary rewards file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MAGIC_HEADER.len() || bytes[..MAGIC_HEADER.len()] != MAGIC_HEADER {
            return Err(FileError::BadMagicHeader);
        }

        let wire: WireFile = options()
            .deserialize(bytes)
            .map_err(|e| FileError::Malformed(e.to_string()))?;

        let network_rewards = wire
            .network_rewards
            .into_iter()
            .map(|n| {
                Ok(NetworkReward {
                    network: n.network,
                    collateral: amount(&n.collateral)?,
                    oracle_dao: amount(&n.oracle_dao)?,
                    smoothing_pool_eth: amount(&n.smoothing_pool_eth)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let node_rewards = wire
            .node_rewards
            .into_iter()
            .map(|n| {
                Ok(NodeReward {
                    address: Address(n.address),
                    network: n.network,
                    collateral: amount(&n.collateral)?,
                    oracle_dao: amount(&n.oracle_dao)?,
                    smoothing_pool_eth: amount(&n.smoothing_pool_eth)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut file = RewardsFile::from_parts(
            wire.header,
            Hash(wire.merkle_root),
            Some(wire.total_rewards.into_totals()?),
            network_rewards,
            node_rewards,
        );
        file.verify()?;
        file.fill_root()?;
        Ok(file)
    }
}

//! Generator configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rewardtree_core::NetworkId;
use rewardtree_rewards::CalculatorConfig;
use rewardtree_state::SnapshotConfig;

/// Configuration for the tree generator, persisted through `Settings<T>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Chain id stamped into every rewards file (default: 1).
    pub chain_id: u64,
    /// Ruleset version stamped into every rewards file (default: 10).
    pub ruleset_version: u64,
    /// Directory artifacts are written to (default: `rewards-trees`).
    pub output_dir: PathBuf,
    /// Nodes per multi-field batch (default: 100).
    pub node_batch_size: usize,
    /// Items per single-call batch (default: 1000).
    pub address_batch_size: usize,
    /// Maximum batches in flight (default: 6).
    pub concurrency: usize,
    /// Deadline for one batch in seconds (default: 30).
    pub batch_timeout_secs: u64,
    /// Destination networks rewards may be routed to (default: `[0]`).
    pub valid_networks: Vec<NetworkId>,
    /// Write the JSON form next to the binary one (default: true).
    pub write_json: bool,
    /// Write the voting power file (default: true).
    pub write_voting_power: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            ruleset_version: 10,
            output_dir: PathBuf::from("rewards-trees"),
            node_batch_size: 100,
            address_batch_size: 1000,
            concurrency: 6,
            batch_timeout_secs: 30,
            valid_networks: vec![0],
            write_json: true,
            write_voting_power: true,
        }
    }
}

impl GeneratorConfig {
    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            address_batch_size: self.address_batch_size,
            node_batch_size: self.node_batch_size,
            concurrency: self.concurrency,
            batch_timeout: Duration::from_secs(self.batch_timeout_secs),
        }
    }

    pub fn calculator_config(&self) -> CalculatorConfig {
        CalculatorConfig {
            valid_networks: self.valid_networks.iter().copied().collect(),
        }
    }
}

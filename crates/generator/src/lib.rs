//! Rewards Tree Generator
//!
//! Composes the pipeline for one interval: resolve the interval's consensus
//! and execution bounds, snapshot the network at the end block, calculate
//! rewards, assemble and finalise a [`RewardsFile`](rewardtree_file::RewardsFile),
//! and hand the serialized artifacts to an [`ArtifactSink`]. Nothing reaches
//! the sink unless every step before it succeeded.

pub mod beacon;
pub mod config;
pub mod generator;
pub mod interval;
pub mod sink;
#[cfg(test)]
mod tests;

pub use beacon::{BeaconBlock, BeaconConfig, BeaconError, BeaconReader};
pub use config::GeneratorConfig;
pub use generator::{compare_with_committed_root, GenerationResult, TreeGenerator};
pub use interval::{IntervalBounds, IntervalTarget};
pub use sink::{rewards_file_name, voting_power_file_name, Artifact, ArtifactSink, FileSink, MemorySink};

use std::path::PathBuf;

use rewardtree_core::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("snapshot failed: {0}")]
    State(#[from] rewardtree_state::StateError),
    #[error("calculation failed: {0}")]
    Rewards(#[from] rewardtree_rewards::RewardsError),
    #[error("rewards file error: {0}")]
    File(#[from] rewardtree_file::FileError),
    #[error("beacon read failed: {0}")]
    Beacon(#[from] BeaconError),
    #[error("epoch {epoch} is not finalized (finalized epoch is {finalized})")]
    EpochNotFinalized { epoch: u64, finalized: u64 },
    #[error("no block was proposed in epoch {0}")]
    NoBlockInEpoch(u64),
    #[error("no block found in slots {from}..={to}")]
    NoBlockInRange { from: u64, to: u64 },
    #[error("slot {0} has no execution block")]
    PreMerge(u64),
    #[error("invalid beacon config: {0}")]
    InvalidBeaconConfig(BeaconError),
    #[error("slot arithmetic overflows at {0}")]
    SlotOverflow(u64),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("no root committed for interval {0}")]
    RootNotCommitted(u64),
    #[error("interval {index} committed root {committed} does not match generated root {generated}")]
    CommittedRootMismatch {
        index: u64,
        committed: Hash,
        generated: Hash,
    },
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

//! The interval pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use rewardtree_core::{BlockNumber, Hash};
use rewardtree_file::RewardsFile;
use rewardtree_rewards::{IntervalWindow, NetworkVotingPower, RewardsCalculator};
use rewardtree_state::{committed_root, ChainReader, ContractRegistry, Snapshotter};

use crate::beacon::BeaconReader;
use crate::config::GeneratorConfig;
use crate::interval::{self, IntervalBounds, IntervalTarget};
use crate::sink::{rewards_file_name, voting_power_file_name, Artifact, ArtifactSink};
use crate::{GeneratorError, Result};

/// Outcome of one successful generation run.
#[derive(Debug)]
pub struct GenerationResult {
    pub file: RewardsFile,
    pub voting_power: NetworkVotingPower,
    pub bounds: IntervalBounds,
    /// Where the sink put each artifact.
    pub artifacts: Vec<PathBuf>,
}

/// Produces the rewards artifacts for one interval.
pub struct TreeGenerator {
    reader: Arc<dyn ChainReader>,
    beacon: Arc<dyn BeaconReader>,
    registry: Arc<ContractRegistry>,
    sink: Arc<dyn ArtifactSink>,
    config: GeneratorConfig,
}

impl TreeGenerator {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        beacon: Arc<dyn BeaconReader>,
        sink: Arc<dyn ArtifactSink>,
        config: GeneratorConfig,
    ) -> Self {
        let registry = Arc::new(ContractRegistry::new(reader.clone()));
        Self {
            reader,
            beacon,
            registry,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    /// Run the whole pipeline for `target`.
    ///
    /// The sink is only called after the file is finalised and every
    /// artifact is encoded, so a failure anywhere leaves nothing behind.
    pub async fn generate(&self, target: IntervalTarget) -> Result<GenerationResult> {
        let started = Instant::now();
        let beacon_config = self.beacon.config().await?;
        beacon_config
            .validate()
            .map_err(GeneratorError::InvalidBeaconConfig)?;

        let end = interval::resolve_end(self.beacon.as_ref(), &beacon_config, &target).await?;
        info!(
            epoch = target.end_epoch,
            slot = end.slot,
            block = end.execution_block,
            "resolved interval end"
        );

        let snapshotter = Snapshotter::new(
            self.reader.clone(),
            self.registry.clone(),
            self.config.snapshot_config(),
        );
        let state = snapshotter.snapshot(end.execution_block).await?;

        let start = interval::resolve_start(self.beacon.as_ref(), &beacon_config, &target, &end).await?;
        let bounds = interval::bounds(&beacon_config, &state.network, &start, &end)?;

        let window = IntervalWindow::new(state.network.interval_start, bounds.end_time)?;
        let calculator = RewardsCalculator::new(self.config.calculator_config());
        let result = calculator.calculate(&state, window)?;

        let mut file = RewardsFile::new();
        file.ruleset_version = self.config.ruleset_version;
        file.network = self.config.chain_id;
        file.index = bounds.index;
        file.start_time = bounds.start_time;
        file.end_time = bounds.end_time;
        file.consensus_start_block = bounds.consensus_start_block;
        file.consensus_end_block = bounds.consensus_end_block;
        file.execution_start_block = bounds.execution_start_block;
        file.execution_end_block = bounds.execution_end_block;
        file.intervals_passed = bounds.intervals_passed;
        file.total_rewards = Some(result.totals.clone());
        *file.network_rewards_mut() = result.network_rewards;
        *file.node_rewards_mut() = result.node_rewards;
        file.sort();

        let binary = file.finalize()?;
        let root = file.merkle_root()?;

        let chain_id = self.config.chain_id;
        let mut artifacts = vec![Artifact::new(rewards_file_name(chain_id, bounds.index, "bin"), binary)];
        if self.config.write_json {
            artifacts.push(Artifact::new(
                rewards_file_name(chain_id, bounds.index, "json"),
                file.to_json_pretty()?,
            ));
        }
        if self.config.write_voting_power {
            let bytes = serde_json::to_vec_pretty(&result.voting_power)
                .map_err(|e| GeneratorError::Serialization(e.to_string()))?;
            artifacts.push(Artifact::new(voting_power_file_name(chain_id, bounds.index), bytes));
        }

        let paths = self.sink.write(&artifacts).await?;
        info!(
            index = bounds.index,
            root = %root,
            nodes = file.node_rewards().len(),
            networks = file.network_rewards().len(),
            artifacts = paths.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated rewards tree"
        );

        Ok(GenerationResult {
            file,
            voting_power: result.voting_power,
            bounds,
            artifacts: paths,
        })
    }

    /// Check a generated root against the one committed on chain.
    pub async fn verify_committed(&self, block: BlockNumber, index: u64, root: Hash) -> Result<()> {
        compare_with_committed_root(self.reader.as_ref(), &self.registry, block, index, root).await
    }
}

/// Compare `generated` with the root committed for interval `index`.
pub async fn compare_with_committed_root(
    reader: &dyn ChainReader,
    registry: &ContractRegistry,
    block: BlockNumber,
    index: u64,
    generated: Hash,
) -> Result<()> {
    let committed = committed_root(reader, registry, block, index).await?;
    if committed.is_zero() {
        return Err(GeneratorError::RootNotCommitted(index));
    }
    if committed != generated {
        warn!(index, committed = %committed, generated = %generated, "committed root mismatch");
        return Err(GeneratorError::CommittedRootMismatch {
            index,
            committed,
            generated,
        });
    }
    info!(index, root = %generated, "generated root matches committed root");
    Ok(())
}

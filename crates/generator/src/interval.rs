//! Interval bounds.
//!
//! The interval ends at the last proposed block of a finalized target epoch.
//! It starts at the first proposed block of the epoch after the one that
//! ended the previous interval, or at slot 0 for the first interval.

use tracing::{debug, info};

use rewardtree_core::{BlockNumber, Timestamp};
use rewardtree_state::NetworkDetails;

use crate::beacon::{BeaconBlock, BeaconConfig, BeaconReader};
use crate::{GeneratorError, Result};

/// What to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTarget {
    /// Epoch whose last block ends the interval.
    pub end_epoch: u64,
    /// Consensus slot that ended the previous interval, if there was one.
    pub previous_consensus_slot: Option<u64>,
}

/// Resolved bounds stamped into the rewards file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBounds {
    pub index: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub consensus_start_block: u64,
    pub consensus_end_block: u64,
    pub execution_start_block: BlockNumber,
    pub execution_end_block: BlockNumber,
    pub intervals_passed: u64,
}

/// First and last slot of `epoch`.
fn epoch_slots(config: &BeaconConfig, epoch: u64) -> Result<(u64, u64)> {
    let first = config.first_slot(epoch);
    let last = config.last_slot(epoch);
    first.zip(last).ok_or(GeneratorError::SlotOverflow(epoch))
}

/// Last proposed block in `epoch`, scanning backwards over missed slots.
pub async fn last_block_in_epoch(
    beacon: &dyn BeaconReader,
    config: &BeaconConfig,
    epoch: u64,
) -> Result<Option<BeaconBlock>> {
    let (first, last) = epoch_slots(config, epoch)?;
    for slot in (first..=last).rev() {
        if let Some(block) = beacon.block(slot).await? {
            return Ok(Some(block));
        }
    }
    Ok(None)
}

/// First proposed block at or after `from`, up to and including `to`.
pub async fn first_block_in_range(beacon: &dyn BeaconReader, from: u64, to: u64) -> Result<BeaconBlock> {
    for slot in from..=to {
        if let Some(block) = beacon.block(slot).await? {
            return Ok(block);
        }
        debug!(slot, "slot missed, moving forward");
    }
    Err(GeneratorError::NoBlockInRange { from, to })
}

/// The block that ends the interval.
pub async fn resolve_end(
    beacon: &dyn BeaconReader,
    config: &BeaconConfig,
    target: &IntervalTarget,
) -> Result<BeaconBlock> {
    let finalized = beacon.finalized_epoch().await?;
    if target.end_epoch > finalized {
        return Err(GeneratorError::EpochNotFinalized {
            epoch: target.end_epoch,
            finalized,
        });
    }
    let block = last_block_in_epoch(beacon, config, target.end_epoch)
        .await?
        .ok_or(GeneratorError::NoBlockInEpoch(target.end_epoch))?;
    if block.execution_block == 0 {
        return Err(GeneratorError::PreMerge(block.slot));
    }
    Ok(block)
}

/// The block that starts the interval.
pub async fn resolve_start(
    beacon: &dyn BeaconReader,
    config: &BeaconConfig,
    target: &IntervalTarget,
    end: &BeaconBlock,
) -> Result<BeaconBlock> {
    match target.previous_consensus_slot {
        None => Ok(BeaconBlock {
            slot: 0,
            execution_block: 0,
        }),
        Some(previous) => {
            let from = config
                .epoch_of(previous)
                .and_then(|epoch| epoch.checked_add(1))
                .and_then(|epoch| config.first_slot(epoch))
                .ok_or(GeneratorError::SlotOverflow(previous))?;
            first_block_in_range(beacon, from, end.slot).await
        }
    }
}

/// Combine the resolved blocks with the on-chain interval parameters.
pub fn bounds(
    config: &BeaconConfig,
    network: &NetworkDetails,
    start: &BeaconBlock,
    end: &BeaconBlock,
) -> Result<IntervalBounds> {
    let end_time = config
        .slot_time(end.slot)
        .ok_or(GeneratorError::SlotOverflow(end.slot))?;
    let intervals_passed = end_time
        .saturating_sub(network.interval_start)
        .checked_div(network.interval_duration)
        .unwrap_or(0);
    let bounds = IntervalBounds {
        index: network.reward_index,
        start_time: network.interval_start,
        end_time,
        consensus_start_block: start.slot,
        consensus_end_block: end.slot,
        execution_start_block: start.execution_block,
        execution_end_block: end.execution_block,
        intervals_passed,
    };
    info!(
        index = bounds.index,
        start_slot = bounds.consensus_start_block,
        end_slot = bounds.consensus_end_block,
        start_block = bounds.execution_start_block,
        end_block = bounds.execution_end_block,
        intervals_passed,
        "resolved interval bounds"
    );
    Ok(bounds)
}

//! Boundary to the consensus-layer reader.
//!
//! Only slot timing, block existence and the execution block a slot maps to
//! are needed here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rewardtree_core::{BlockNumber, Timestamp};

/// Failure reported by a beacon reader implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BeaconError(pub String);

/// Chain timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub genesis_time: Timestamp,
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
}

impl BeaconConfig {
    /// Reject timing parameters that would make slot arithmetic meaningless.
    pub fn validate(&self) -> Result<(), BeaconError> {
        if self.seconds_per_slot == 0 {
            return Err(BeaconError("seconds per slot is zero".to_string()));
        }
        if self.slots_per_epoch == 0 {
            return Err(BeaconError("slots per epoch is zero".to_string()));
        }
        Ok(())
    }

    pub fn slot_time(&self, slot: u64) -> Option<Timestamp> {
        slot.checked_mul(self.seconds_per_slot)?
            .checked_add(self.genesis_time)
    }

    pub fn epoch_of(&self, slot: u64) -> Option<u64> {
        slot.checked_div(self.slots_per_epoch)
    }

    pub fn first_slot(&self, epoch: u64) -> Option<u64> {
        epoch.checked_mul(self.slots_per_epoch)
    }

    pub fn last_slot(&self, epoch: u64) -> Option<u64> {
        self.first_slot(epoch)?
            .checked_add(self.slots_per_epoch)?
            .checked_sub(1)
    }
}

/// A proposed consensus block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconBlock {
    pub slot: u64,
    /// Execution block carried by this slot, zero before the merge.
    pub execution_block: BlockNumber,
}

#[async_trait]
pub trait BeaconReader: Send + Sync {
    async fn config(&self) -> Result<BeaconConfig, BeaconError>;

    async fn finalized_epoch(&self) -> Result<u64, BeaconError>;

    /// The block at `slot`, or `None` when the slot was missed.
    async fn block(&self, slot: u64) -> Result<Option<BeaconBlock>, BeaconError>;
}

//! Interval time window.

use rewardtree_core::{Timestamp, Uint256};

use crate::math::mul_div;
use crate::{Result, RewardsError};

/// Half-open `[start, end)` span the rewards cover, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl IntervalWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if end <= start {
            return Err(RewardsError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// Seconds of the window at or after `since`.
    pub fn seconds_after(&self, since: Timestamp) -> u64 {
        self.end.saturating_sub(since.max(self.start))
    }

    /// Seconds of the window before `until`.
    pub fn seconds_before(&self, until: Timestamp) -> u64 {
        until.min(self.end).saturating_sub(self.start)
    }

    /// `amount` scaled by the share of the window in `seconds`.
    pub fn prorate(&self, amount: Uint256, seconds: u64) -> Result<Uint256> {
        if seconds >= self.duration() {
            return Ok(amount);
        }
        mul_div(
            amount,
            Uint256::from(seconds),
            Uint256::from(self.duration()),
            "pro-rated amount",
        )
    }
}

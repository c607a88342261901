//! Legacy single-validator pools.

use rewardtree_core::{Address, Uint256};

use crate::batch::{BatchRunner, Values};
use crate::participant::RawNodeDetails;
use crate::reader::Call;
use crate::registry::{Contract, Contracts};
use crate::Result;

/// Lifecycle state of a legacy pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MinipoolStatus {
    Initialised = 0,
    Prelaunch = 1,
    Staking = 2,
    Withdrawable = 3,
    Dissolved = 4,
}

impl MinipoolStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Initialised),
            1 => Some(Self::Prelaunch),
            2 => Some(Self::Staking),
            3 => Some(Self::Withdrawable),
            4 => Some(Self::Dissolved),
            _ => None,
        }
    }
}

/// One legacy pool owned by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinipoolDetails {
    pub address: Address,
    pub node: Address,
    pub status: MinipoolStatus,
    /// Commission as a fraction of 1e18.
    pub node_fee: Uint256,
    /// Bonded by the node operator.
    pub node_deposit_balance: Uint256,
    /// Borrowed from the deposit pool.
    pub user_deposit_balance: Uint256,
    pub finalised: bool,
}

impl MinipoolDetails {
    /// Staking and not yet finalised.
    pub fn is_active(&self) -> bool {
        self.status == MinipoolStatus::Staking && !self.finalised
    }
}

/// A per-pool field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinipoolField {
    Status,
    NodeFee,
    NodeDepositBalance,
    UserDepositBalance,
    Finalised,
}

impl MinipoolField {
    pub const ALL: [MinipoolField; 5] = [
        Self::Status,
        Self::NodeFee,
        Self::NodeDepositBalance,
        Self::UserDepositBalance,
        Self::Finalised,
    ];

    pub fn call(self, minipool: Address) -> Call {
        let method = match self {
            Self::Status => "getStatus",
            Self::NodeFee => "getNodeFee",
            Self::NodeDepositBalance => "getNodeDepositBalance",
            Self::UserDepositBalance => "getUserDepositBalance",
            Self::Finalised => "getFinalised",
        };
        Call::new(minipool, method)
    }
}

pub fn minipool_at_call(contracts: &Contracts, node: Address, index: u64) -> Call {
    Call::new(contracts.address(Contract::MinipoolManager), "getNodeMinipoolAt")
        .with_address(node)
        .with_uint(index)
}

/// Addresses of every pool of every node, paired with the owner.
pub async fn minipool_addresses(
    runner: &BatchRunner<'_>,
    contracts: &Contracts,
    nodes: &[RawNodeDetails],
    batch_size: usize,
) -> Result<Vec<(Address, Address)>> {
    let slots: Vec<(Address, u64)> = nodes
        .iter()
        .flat_map(|n| (0..n.minipool_count).map(move |i| (n.address, i)))
        .collect();

    runner
        .round(
            "minipool addresses",
            &slots,
            batch_size,
            |(node, i)| vec![minipool_at_call(contracts, *node, *i)],
            |(node, _), v| Ok((*node, v.address()?)),
        )
        .await
}

fn decode(node: Address, address: Address, v: &mut Values<'_>) -> Result<MinipoolDetails> {
    let raw_status = v.u64()?;
    // Unknown future states are treated as dissolved so they never earn
    let status = u8::try_from(raw_status)
        .ok()
        .and_then(MinipoolStatus::from_u8)
        .unwrap_or(MinipoolStatus::Dissolved);
    Ok(MinipoolDetails {
        address,
        node,
        status,
        node_fee: v.uint()?,
        node_deposit_balance: v.uint()?,
        user_deposit_balance: v.uint()?,
        finalised: v.bool()?,
    })
}

/// Details of every pool.
pub async fn minipool_details(
    runner: &BatchRunner<'_>,
    pools: &[(Address, Address)],
    batch_size: usize,
) -> Result<Vec<MinipoolDetails>> {
    runner
        .round(
            "minipool details",
            pools,
            batch_size,
            |(_, pool)| MinipoolField::ALL.iter().map(|f| f.call(*pool)).collect(),
            |(node, pool), v| decode(*node, *pool, v),
        )
        .await
}

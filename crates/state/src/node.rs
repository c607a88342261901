//! Node enumeration and per-node rounds.
//!
//! Round 1 reads every node's own fields. Round 2 reads validator counts
//! from each deployed megapool, whose address is only known after round 1.
//! Round 3 reads the bond requirement for each megapool's active count,
//! which is only known after round 2.

use rewardtree_core::{Address, Uint256};

use crate::batch::{BatchRunner, Values};
use crate::network::SchemaVersion;
use crate::participant::{MegapoolDetails, RawNodeDetails};
use crate::reader::Call;
use crate::registry::{Contract, Contracts};
use crate::Result;

/// A per-node field read in round 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
    RegistrationTime,
    RewardNetwork,
    SmoothingPoolState,
    SmoothingPoolChanged,
    LegacyStaked,
    EffectiveStake,
    MinimumStake,
    EthBorrowed,
    EthBonded,
    MinipoolCount,
    ActiveMinipoolCount,
    MegapoolStaked,
    MegapoolEthBonded,
    MegapoolDeployed,
    MegapoolAddress,
}

impl NodeField {
    const LEGACY: [NodeField; 11] = [
        Self::RegistrationTime,
        Self::RewardNetwork,
        Self::SmoothingPoolState,
        Self::SmoothingPoolChanged,
        Self::LegacyStaked,
        Self::EffectiveStake,
        Self::MinimumStake,
        Self::EthBorrowed,
        Self::EthBonded,
        Self::MinipoolCount,
        Self::ActiveMinipoolCount,
    ];

    const POOLED: [NodeField; 15] = [
        Self::RegistrationTime,
        Self::RewardNetwork,
        Self::SmoothingPoolState,
        Self::SmoothingPoolChanged,
        Self::LegacyStaked,
        Self::EffectiveStake,
        Self::MinimumStake,
        Self::EthBorrowed,
        Self::EthBonded,
        Self::MinipoolCount,
        Self::ActiveMinipoolCount,
        Self::MegapoolStaked,
        Self::MegapoolEthBonded,
        Self::MegapoolDeployed,
        Self::MegapoolAddress,
    ];

    /// Fields that exist at `schema`. Anything else stays zero.
    pub fn for_schema(schema: SchemaVersion) -> &'static [NodeField] {
        match schema {
            SchemaVersion::Legacy => &Self::LEGACY,
            SchemaVersion::Pooled => &Self::POOLED,
        }
    }

    /// The view call that reads this field for `node`.
    pub fn call(self, contracts: &Contracts, node: Address, schema: SchemaVersion) -> Call {
        let legacy = schema == SchemaVersion::Legacy;
        let (contract, method) = match self {
            Self::RegistrationTime => (Contract::NodeManager, "getNodeRegistrationTime"),
            Self::RewardNetwork => (Contract::NodeManager, "getRewardNetwork"),
            Self::SmoothingPoolState => (Contract::NodeManager, "getSmoothingPoolRegistrationState"),
            Self::SmoothingPoolChanged => (Contract::NodeManager, "getSmoothingPoolRegistrationChanged"),
            Self::LegacyStaked if legacy => (Contract::NodeStaking, "getNodeStake"),
            Self::LegacyStaked => (Contract::NodeStaking, "getNodeLegacyStake"),
            Self::EffectiveStake => (Contract::NodeStaking, "getNodeEffectiveStake"),
            Self::MinimumStake => (Contract::NodeStaking, "getNodeMinimumStake"),
            Self::EthBorrowed if legacy => (Contract::NodeStaking, "getNodeETHMatched"),
            Self::EthBorrowed => (Contract::NodeStaking, "getNodeETHBorrowed"),
            Self::EthBonded if legacy => (Contract::NodeStaking, "getNodeETHProvided"),
            Self::EthBonded => (Contract::NodeStaking, "getNodeETHBonded"),
            Self::MinipoolCount => (Contract::MinipoolManager, "getNodeMinipoolCount"),
            Self::ActiveMinipoolCount => (Contract::MinipoolManager, "getNodeActiveMinipoolCount"),
            Self::MegapoolStaked => (Contract::NodeStaking, "getNodeMegapoolStake"),
            Self::MegapoolEthBonded => (Contract::NodeStaking, "getNodeMegapoolETHBonded"),
            Self::MegapoolDeployed => (Contract::MegapoolFactory, "getMegapoolDeployed"),
            Self::MegapoolAddress => (Contract::MegapoolFactory, "getExpectedAddress"),
        };
        Call::new(contracts.address(contract), method).with_address(node)
    }

    fn apply(self, raw: &mut RawNodeDetails, values: &mut Values<'_>) -> Result<()> {
        match self {
            Self::RegistrationTime => raw.registration_time = values.u64()?,
            Self::RewardNetwork => raw.reward_network = values.u64()?,
            Self::SmoothingPoolState => raw.smoothing_pool_opted_in = values.bool()?,
            Self::SmoothingPoolChanged => raw.smoothing_pool_changed = values.u64()?,
            Self::LegacyStaked => raw.legacy_staked = values.uint()?,
            Self::EffectiveStake => raw.effective_stake = values.uint()?,
            Self::MinimumStake => raw.minimum_stake = values.uint()?,
            Self::EthBorrowed => raw.eth_borrowed = values.uint()?,
            Self::EthBonded => raw.eth_bonded = values.uint()?,
            Self::MinipoolCount => raw.minipool_count = values.u64()?,
            Self::ActiveMinipoolCount => raw.active_minipool_count = values.u64()?,
            Self::MegapoolStaked => raw.megapool_staked = values.uint()?,
            Self::MegapoolEthBonded => raw.megapool_eth_bonded = values.uint()?,
            Self::MegapoolDeployed => raw.megapool_deployed = values.bool()?,
            Self::MegapoolAddress => raw.megapool_address = values.address()?,
        }
        Ok(())
    }
}

/// A per-megapool field read in round 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MegapoolField {
    ActiveValidators,
    LockedValidators,
    ExitedValidators,
}

impl MegapoolField {
    pub const ALL: [MegapoolField; 3] = [
        Self::ActiveValidators,
        Self::LockedValidators,
        Self::ExitedValidators,
    ];

    pub fn call(self, megapool: Address) -> Call {
        let method = match self {
            Self::ActiveValidators => "getActiveValidatorCount",
            Self::LockedValidators => "getLockedValidatorCount",
            Self::ExitedValidators => "getExitedValidatorCount",
        };
        Call::new(megapool, method)
    }
}

pub fn node_count_call(contracts: &Contracts) -> Call {
    Call::new(contracts.address(Contract::NodeManager), "getNodeCount")
}

pub fn node_at_call(contracts: &Contracts, index: u64) -> Call {
    Call::new(contracts.address(Contract::NodeManager), "getNodeAt").with_uint(index)
}

pub fn bond_requirement_call(contracts: &Contracts, active_validators: u64) -> Call {
    Call::new(contracts.address(Contract::NodeDeposit), "getBondRequirement").with_uint(active_validators)
}

/// Every registered node address, in registration order.
pub async fn node_addresses(
    runner: &BatchRunner<'_>,
    contracts: &Contracts,
    count: u64,
    batch_size: usize,
) -> Result<Vec<Address>> {
    let indices: Vec<u64> = (0..count).collect();
    runner
        .round(
            "node addresses",
            &indices,
            batch_size,
            |i| vec![node_at_call(contracts, *i)],
            |_, v| v.address(),
        )
        .await
}

/// Round 1: each node's own fields.
pub async fn node_details(
    runner: &BatchRunner<'_>,
    contracts: &Contracts,
    schema: SchemaVersion,
    addresses: &[Address],
    batch_size: usize,
) -> Result<Vec<RawNodeDetails>> {
    let fields = NodeField::for_schema(schema);
    runner
        .round(
            "node details",
            addresses,
            batch_size,
            |a| fields.iter().map(|f| f.call(contracts, *a, schema)).collect(),
            |a, v| {
                let mut raw = RawNodeDetails {
                    address: *a,
                    ..Default::default()
                };
                for field in fields {
                    field.apply(&mut raw, v)?;
                }
                Ok(raw)
            },
        )
        .await
}

/// Intermediate result of round 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MegapoolCounts {
    /// Index of the owning node in the round 1 output.
    pub node_index: usize,
    pub address: Address,
    pub active: u64,
    pub locked: u64,
    pub exited: u64,
}

/// Round 2: validator counts of every deployed megapool.
pub async fn megapool_counts(
    runner: &BatchRunner<'_>,
    nodes: &[RawNodeDetails],
    batch_size: usize,
) -> Result<Vec<MegapoolCounts>> {
    let deployed: Vec<(usize, Address)> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.megapool_deployed)
        .map(|(i, n)| (i, n.megapool_address))
        .collect();

    runner
        .round(
            "megapool details r1",
            &deployed,
            batch_size,
            |(_, megapool)| MegapoolField::ALL.iter().map(|f| f.call(*megapool)).collect(),
            |(node_index, megapool), v| {
                Ok(MegapoolCounts {
                    node_index: *node_index,
                    address: *megapool,
                    active: v.u64()?,
                    locked: v.u64()?,
                    exited: v.u64()?,
                })
            },
        )
        .await
}

/// Round 3: bond requirement keyed by each megapool's active count.
pub async fn megapool_bonds(
    runner: &BatchRunner<'_>,
    contracts: &Contracts,
    counts: &[MegapoolCounts],
    batch_size: usize,
) -> Result<Vec<(usize, MegapoolDetails)>> {
    runner
        .round(
            "megapool details r2",
            counts,
            batch_size,
            |c| vec![bond_requirement_call(contracts, c.active)],
            |c, v| {
                let bond_requirement: Uint256 = v.uint()?;
                Ok((
                    c.node_index,
                    MegapoolDetails {
                        address: c.address,
                        active_validators: c.active,
                        locked_validators: c.locked,
                        exited_validators: c.exited,
                        bond_requirement,
                    },
                ))
            },
        )
        .await
}

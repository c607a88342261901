//! Network-wide parameters and the oracle committee.

use futures::future::try_join_all;
use tracing::debug;

use rewardtree_core::{Address, BlockNumber, Hash, Timestamp, Uint256};

use crate::batch::{expect_uint, BatchRunner};
use crate::reader::{Call, ChainReader, Value};
use crate::registry::{Contract, ContractRegistry, Contracts};
use crate::{Result, StateError};

/// Protocol schema active at a block. Decides which fields exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaVersion {
    /// Single-validator pools only.
    Legacy,
    /// Adds pooled-validator contracts.
    Pooled,
}

impl SchemaVersion {
    pub const LATEST: u64 = 2;

    pub fn from_u64(version: u64) -> Result<Self> {
        match version {
            1 => Ok(Self::Legacy),
            2 => Ok(Self::Pooled),
            other => Err(StateError::SchemaVersionUnsupported(other)),
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            Self::Legacy => 1,
            Self::Pooled => 2,
        }
    }
}

pub fn schema_version_call(contracts: &Contracts) -> Call {
    Call::new(contracts.address(Contract::ProtocolSettings), "getProtocolVersion")
}

/// A network-wide parameter read with a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkParam {
    TokenPrice,
    MinCollateralFraction,
    PendingRewards,
    NodeOperatorShare,
    OracleDaoShare,
    ProtocolDaoShare,
    RewardIndex,
    IntervalStart,
    IntervalDuration,
    MegapoolNodeShare,
}

impl NetworkParam {
    const LEGACY: [NetworkParam; 9] = [
        Self::TokenPrice,
        Self::MinCollateralFraction,
        Self::PendingRewards,
        Self::NodeOperatorShare,
        Self::OracleDaoShare,
        Self::ProtocolDaoShare,
        Self::RewardIndex,
        Self::IntervalStart,
        Self::IntervalDuration,
    ];

    const POOLED: [NetworkParam; 10] = [
        Self::TokenPrice,
        Self::MinCollateralFraction,
        Self::PendingRewards,
        Self::NodeOperatorShare,
        Self::OracleDaoShare,
        Self::ProtocolDaoShare,
        Self::RewardIndex,
        Self::IntervalStart,
        Self::IntervalDuration,
        Self::MegapoolNodeShare,
    ];

    pub fn for_schema(schema: SchemaVersion) -> &'static [NetworkParam] {
        match schema {
            SchemaVersion::Legacy => &Self::LEGACY,
            SchemaVersion::Pooled => &Self::POOLED,
        }
    }

    pub fn call(self, contracts: &Contracts) -> Call {
        let (contract, method) = match self {
            Self::TokenPrice => (Contract::NetworkPrices, "getTokenPrice"),
            Self::MinCollateralFraction => (Contract::ProtocolSettings, "getMinimumPerMinipoolStake"),
            Self::PendingRewards => (Contract::RewardsPool, "getPendingRewards"),
            Self::NodeOperatorShare => (Contract::RewardsSettings, "getRewardsClaimersNodePerc"),
            Self::OracleDaoShare => (Contract::RewardsSettings, "getRewardsClaimersTrustedNodePerc"),
            Self::ProtocolDaoShare => (Contract::RewardsSettings, "getRewardsClaimersProtocolPerc"),
            Self::RewardIndex => (Contract::RewardsPool, "getRewardIndex"),
            Self::IntervalStart => (Contract::RewardsPool, "getClaimIntervalTimeStart"),
            Self::IntervalDuration => (Contract::RewardsPool, "getClaimIntervalTime"),
            Self::MegapoolNodeShare => (Contract::ProtocolSettings, "getNodeShare"),
        };
        Call::new(contracts.address(contract), method)
    }

    fn apply(self, details: &mut NetworkDetails, value: Uint256, call: &Call) -> Result<()> {
        let small = || {
            if value > Uint256::from(u64::MAX) {
                return Err(StateError::UnexpectedValue {
                    query: call.to_string(),
                    expected: "uint64",
                    got: value.to_string(),
                });
            }
            Ok(value.low_u64())
        };
        match self {
            Self::TokenPrice => details.token_price = value,
            Self::MinCollateralFraction => details.min_collateral_fraction = value,
            Self::PendingRewards => details.pending_rewards = value,
            Self::NodeOperatorShare => details.node_operator_share = value,
            Self::OracleDaoShare => details.oracle_dao_share = value,
            Self::ProtocolDaoShare => details.protocol_dao_share = value,
            Self::RewardIndex => details.reward_index = small()?,
            Self::IntervalStart => details.interval_start = small()?,
            Self::IntervalDuration => details.interval_duration = small()?,
            Self::MegapoolNodeShare => details.megapool_node_share = value,
        }
        Ok(())
    }
}

/// Network-wide parameters at the snapshot block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDetails {
    pub schema: SchemaVersion,
    /// Native currency per whole token, scaled by 1e18.
    pub token_price: Uint256,
    /// Minimum stake as a fraction of borrowed native currency, 1e18 = 100%.
    pub min_collateral_fraction: Uint256,
    /// Token inflation pending for the interval.
    pub pending_rewards: Uint256,
    pub node_operator_share: Uint256,
    pub oracle_dao_share: Uint256,
    pub protocol_dao_share: Uint256,
    pub reward_index: u64,
    pub interval_start: Timestamp,
    /// Interval length in seconds.
    pub interval_duration: u64,
    /// Commission on pooled validators, 1e18 = 100%. Zero before pooling.
    pub megapool_node_share: Uint256,
    pub smoothing_pool_address: Address,
    pub smoothing_pool_balance: Uint256,
}

impl NetworkDetails {
    fn empty(schema: SchemaVersion, smoothing_pool_address: Address) -> Self {
        Self {
            schema,
            token_price: Uint256::ZERO,
            min_collateral_fraction: Uint256::ZERO,
            pending_rewards: Uint256::ZERO,
            node_operator_share: Uint256::ZERO,
            oracle_dao_share: Uint256::ZERO,
            protocol_dao_share: Uint256::ZERO,
            reward_index: 0,
            interval_start: 0,
            interval_duration: 0,
            megapool_node_share: Uint256::ZERO,
            smoothing_pool_address,
            smoothing_pool_balance: Uint256::ZERO,
        }
    }
}

/// The schema version active at the runner's block.
pub async fn schema_version(runner: &BatchRunner<'_>, contracts: &Contracts) -> Result<SchemaVersion> {
    let call = schema_version_call(contracts);
    let version = expect_uint(&call, runner.single(call.clone()).await?)?;
    if version > Uint256::from(SchemaVersion::LATEST) {
        return Err(StateError::SchemaVersionUnsupported(version.low_u64()));
    }
    SchemaVersion::from_u64(version.low_u64())
}

/// Every parameter that exists at `schema`, read concurrently.
pub async fn network_details(
    runner: &BatchRunner<'_>,
    contracts: &Contracts,
    schema: SchemaVersion,
) -> Result<NetworkDetails> {
    let params = NetworkParam::for_schema(schema);
    let calls: Vec<Call> = params.iter().map(|p| p.call(contracts)).collect();
    let values = try_join_all(calls.iter().map(|c| runner.single(c.clone()))).await?;

    let smoothing_pool = contracts.address(Contract::SmoothingPool);
    let mut details = NetworkDetails::empty(schema, smoothing_pool);
    for ((param, call), value) in params.iter().zip(&calls).zip(values) {
        param.apply(&mut details, expect_uint(call, value)?, call)?;
    }

    let balances = runner.balances(&[smoothing_pool], 1).await?;
    details.smoothing_pool_balance = balances.first().copied().unwrap_or_default();

    debug!(
        schema = schema.as_u64(),
        reward_index = details.reward_index,
        smoothing_pool_balance = %details.smoothing_pool_balance,
        "read network details"
    );
    Ok(details)
}

/// An oracle committee member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleMember {
    pub address: Address,
    pub joined_time: Timestamp,
}

pub fn oracle_member_count_call(contracts: &Contracts) -> Call {
    Call::new(contracts.address(Contract::OracleDao), "getMemberCount")
}

pub fn oracle_member_at_call(contracts: &Contracts, index: u64) -> Call {
    Call::new(contracts.address(Contract::OracleDao), "getMemberAt").with_uint(index)
}

pub fn oracle_member_joined_call(contracts: &Contracts, member: Address) -> Call {
    Call::new(contracts.address(Contract::OracleDao), "getMemberJoinedTime").with_address(member)
}

/// Committee members and their join times, in two dependent rounds.
pub async fn oracle_members(
    runner: &BatchRunner<'_>,
    contracts: &Contracts,
    batch_size: usize,
) -> Result<Vec<OracleMember>> {
    let call = oracle_member_count_call(contracts);
    let count = expect_uint(&call, runner.single(call.clone()).await?)?.low_u64();

    let indices: Vec<u64> = (0..count).collect();
    let addresses = runner
        .round(
            "oracle members",
            &indices,
            batch_size,
            |i| vec![oracle_member_at_call(contracts, *i)],
            |_, v| v.address(),
        )
        .await?;

    runner
        .round(
            "oracle member join times",
            &addresses,
            batch_size,
            |a| vec![oracle_member_joined_call(contracts, *a)],
            |a, v| {
                Ok(OracleMember {
                    address: *a,
                    joined_time: v.u64()?,
                })
            },
        )
        .await
}

pub fn committed_root_call(contracts: &Contracts, index: u64) -> Call {
    Call::new(contracts.address(Contract::RewardsPool), "getMerkleRoot").with_uint(index)
}

/// The Merkle root committed on chain for interval `index`.
pub async fn committed_root(
    reader: &dyn ChainReader,
    registry: &ContractRegistry,
    block: BlockNumber,
    index: u64,
) -> Result<Hash> {
    let contracts = registry.contracts(block).await?;
    let call = committed_root_call(contracts, index);
    match reader.call(block, &call).await {
        Ok(Value::Bytes32(root)) => Ok(root),
        Ok(other) => Err(StateError::UnexpectedValue {
            query: call.to_string(),
            expected: "bytes32",
            got: other.kind().to_string(),
        }),
        Err(source) => Err(StateError::RemoteRead {
            query: call.to_string(),
            source,
        }),
    }
}

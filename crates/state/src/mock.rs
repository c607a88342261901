//! In-memory chain reader.
//!
//! Answers the exact calls the snapshotter issues from fixture data, and can
//! be told to fail or stall every read that touches a given address.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use rewardtree_core::{Address, BlockNumber, Hash, Timestamp, Uint256};

use crate::minipool::{minipool_at_call, MinipoolField, MinipoolStatus};
use crate::network::{
    committed_root_call, oracle_member_at_call, oracle_member_count_call, oracle_member_joined_call,
    schema_version_call, NetworkParam, SchemaVersion,
};
use crate::node::{bond_requirement_call, node_at_call, node_count_call, MegapoolField, NodeField};
use crate::reader::{Call, ChainReader, ReadError, Value};
use crate::registry::{Contract, Contracts};

/// Network-wide fixture values.
#[derive(Debug, Clone)]
pub struct MockParams {
    pub token_price: Uint256,
    pub min_collateral_fraction: Uint256,
    pub pending_rewards: Uint256,
    pub node_operator_share: Uint256,
    pub oracle_dao_share: Uint256,
    pub protocol_dao_share: Uint256,
    pub reward_index: u64,
    pub interval_start: Timestamp,
    pub interval_duration: u64,
    pub megapool_node_share: Uint256,
    pub smoothing_pool_balance: Uint256,
}

impl Default for MockParams {
    fn default() -> Self {
        let pct = |p: u128| Uint256::from(p * 10u128.pow(16));
        Self {
            // 0.01 native per token
            token_price: Uint256::exp10(16),
            min_collateral_fraction: pct(10),
            pending_rewards: Uint256::exp10(22),
            node_operator_share: pct(70),
            oracle_dao_share: pct(5),
            protocol_dao_share: pct(25),
            reward_index: 0,
            interval_start: 1_700_000_000,
            interval_duration: 28 * 24 * 3600,
            megapool_node_share: pct(5),
            smoothing_pool_balance: Uint256::exp10(20),
        }
    }
}

/// A node fixture.
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    pub address: Address,
    pub registration_time: Timestamp,
    pub reward_network: u64,
    pub smoothing_pool_opted_in: bool,
    pub smoothing_pool_changed: Timestamp,
    pub legacy_staked: Uint256,
    pub megapool_staked: Uint256,
    pub effective_stake: Uint256,
    pub minimum_stake: Uint256,
    pub eth_borrowed: Uint256,
    pub eth_bonded: Uint256,
    pub megapool_eth_bonded: Uint256,
    pub megapool: Option<MockMegapool>,
    pub balance: Uint256,
}

impl MockNode {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }
}

/// A pooled-validator fixture.
#[derive(Debug, Clone, Default)]
pub struct MockMegapool {
    pub address: Address,
    pub active: u64,
    pub locked: u64,
    pub exited: u64,
    pub bond_requirement: Uint256,
}

/// A legacy pool fixture.
#[derive(Debug, Clone)]
pub struct MockMinipool {
    pub address: Address,
    pub status: MinipoolStatus,
    pub node_fee: Uint256,
    pub node_deposit_balance: Uint256,
    pub user_deposit_balance: Uint256,
    pub finalised: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct PoolCounts {
    total: u64,
    active: u64,
}

/// Fixture-backed [`ChainReader`].
pub struct MockChain {
    contracts: Contracts,
    values: HashMap<Call, Value>,
    balances: HashMap<Address, Uint256>,
    node_count: u64,
    oracle_count: u64,
    pools: HashMap<Address, PoolCounts>,
    failing: BTreeSet<Address>,
    stalling: BTreeSet<Address>,
    blocks: Mutex<BTreeSet<BlockNumber>>,
    multicalls: AtomicUsize,
    contract_lookups: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockChain {
    /// Empty network at `schema` with default parameters.
    pub fn new(schema: SchemaVersion) -> Self {
        let mut addresses = [Address::ZERO; Contract::COUNT];
        for (i, slot) in addresses.iter_mut().enumerate() {
            *slot = Address::from_low_u64(0xC0DE_0000 + i as u64);
        }
        let mut chain = Self {
            contracts: Contracts::new(addresses),
            values: HashMap::new(),
            balances: HashMap::new(),
            node_count: 0,
            oracle_count: 0,
            pools: HashMap::new(),
            failing: BTreeSet::new(),
            stalling: BTreeSet::new(),
            blocks: Mutex::new(BTreeSet::new()),
            multicalls: AtomicUsize::new(0),
            contract_lookups: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        chain.set_schema_version(schema.as_u64());
        chain.values.insert(node_count_call(&chain.contracts), 0u64.into());
        chain.values.insert(oracle_member_count_call(&chain.contracts), 0u64.into());
        chain.set_params(&MockParams::default());
        chain
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    /// Report an arbitrary protocol version, including unsupported ones.
    pub fn set_schema_version(&mut self, version: u64) {
        self.values
            .insert(schema_version_call(&self.contracts), version.into());
    }

    pub fn set_params(&mut self, params: &MockParams) {
        for param in NetworkParam::for_schema(SchemaVersion::Pooled) {
            let value = match param {
                NetworkParam::TokenPrice => params.token_price,
                NetworkParam::MinCollateralFraction => params.min_collateral_fraction,
                NetworkParam::PendingRewards => params.pending_rewards,
                NetworkParam::NodeOperatorShare => params.node_operator_share,
                NetworkParam::OracleDaoShare => params.oracle_dao_share,
                NetworkParam::ProtocolDaoShare => params.protocol_dao_share,
                NetworkParam::RewardIndex => Uint256::from(params.reward_index),
                NetworkParam::IntervalStart => Uint256::from(params.interval_start),
                NetworkParam::IntervalDuration => Uint256::from(params.interval_duration),
                NetworkParam::MegapoolNodeShare => params.megapool_node_share,
            };
            self.values.insert(param.call(&self.contracts), value.into());
        }
        self.balances.insert(
            self.contracts.address(Contract::SmoothingPool),
            params.smoothing_pool_balance,
        );
    }

    pub fn add_node(&mut self, node: MockNode) {
        let index = self.node_count;
        self.node_count += 1;
        let c = &self.contracts;
        self.values.insert(node_at_call(c, index), node.address.into());
        self.values.insert(node_count_call(c), self.node_count.into());

        let megapool = node.megapool.clone().unwrap_or_default();
        for schema in [SchemaVersion::Legacy, SchemaVersion::Pooled] {
            for field in NodeField::for_schema(schema) {
                let value: Value = match field {
                    NodeField::RegistrationTime => node.registration_time.into(),
                    NodeField::RewardNetwork => node.reward_network.into(),
                    NodeField::SmoothingPoolState => node.smoothing_pool_opted_in.into(),
                    NodeField::SmoothingPoolChanged => node.smoothing_pool_changed.into(),
                    NodeField::LegacyStaked => node.legacy_staked.into(),
                    NodeField::EffectiveStake => node.effective_stake.into(),
                    NodeField::MinimumStake => node.minimum_stake.into(),
                    NodeField::EthBorrowed => node.eth_borrowed.into(),
                    NodeField::EthBonded => node.eth_bonded.into(),
                    NodeField::MinipoolCount => 0u64.into(),
                    NodeField::ActiveMinipoolCount => 0u64.into(),
                    NodeField::MegapoolStaked => node.megapool_staked.into(),
                    NodeField::MegapoolEthBonded => node.megapool_eth_bonded.into(),
                    NodeField::MegapoolDeployed => node.megapool.is_some().into(),
                    NodeField::MegapoolAddress => megapool.address.into(),
                };
                self.values.insert(field.call(c, node.address, schema), value);
            }
        }

        if node.megapool.is_some() {
            for field in MegapoolField::ALL {
                let value = match field {
                    MegapoolField::ActiveValidators => megapool.active,
                    MegapoolField::LockedValidators => megapool.locked,
                    MegapoolField::ExitedValidators => megapool.exited,
                };
                self.values.insert(field.call(megapool.address), value.into());
            }
            self.values.insert(
                bond_requirement_call(c, megapool.active),
                megapool.bond_requirement.into(),
            );
        }

        self.balances.insert(node.address, node.balance);
    }

    pub fn add_minipool(&mut self, node: Address, pool: MockMinipool) {
        let counts = self.pools.entry(node).or_default();
        let index = counts.total;
        counts.total += 1;
        if pool.status == MinipoolStatus::Staking && !pool.finalised {
            counts.active += 1;
        }
        let counts = *counts;

        let c = &self.contracts;
        self.values
            .insert(minipool_at_call(c, node, index), pool.address.into());
        for field in MinipoolField::ALL {
            let value: Value = match field {
                MinipoolField::Status => (pool.status as u64).into(),
                MinipoolField::NodeFee => pool.node_fee.into(),
                MinipoolField::NodeDepositBalance => pool.node_deposit_balance.into(),
                MinipoolField::UserDepositBalance => pool.user_deposit_balance.into(),
                MinipoolField::Finalised => pool.finalised.into(),
            };
            self.values.insert(field.call(pool.address), value);
        }
        for schema in [SchemaVersion::Legacy, SchemaVersion::Pooled] {
            self.values.insert(
                NodeField::MinipoolCount.call(c, node, schema),
                counts.total.into(),
            );
            self.values.insert(
                NodeField::ActiveMinipoolCount.call(c, node, schema),
                counts.active.into(),
            );
        }
    }

    pub fn add_oracle_member(&mut self, member: Address, joined_time: Timestamp) {
        let c = &self.contracts;
        self.values
            .insert(oracle_member_at_call(c, self.oracle_count), member.into());
        self.values
            .insert(oracle_member_joined_call(c, member), joined_time.into());
        self.oracle_count += 1;
        self.values
            .insert(oracle_member_count_call(c), self.oracle_count.into());
    }

    pub fn set_committed_root(&mut self, index: u64, root: Hash) {
        self.values
            .insert(committed_root_call(&self.contracts, index), Value::Bytes32(root));
    }

    /// Fail every read that touches `address`.
    pub fn fail_reads_for(&mut self, address: Address) {
        self.failing.insert(address);
    }

    /// Never answer any read that touches `address`.
    pub fn stall_reads_for(&mut self, address: Address) {
        self.stalling.insert(address);
    }

    /// Blocks that reads have been pinned to.
    pub fn blocks_seen(&self) -> BTreeSet<BlockNumber> {
        self.blocks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn multicall_count(&self) -> usize {
        self.multicalls.load(Ordering::SeqCst)
    }

    pub fn contract_lookups(&self) -> usize {
        self.contract_lookups.load(Ordering::SeqCst)
    }

    /// Highest number of multicalls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_block(&self, block: BlockNumber) {
        self.blocks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(block);
    }

    /// Fail or stall a read according to the injected faults.
    async fn gate<F: Fn(&Address) -> bool>(&self, touches: F) -> Result<(), ReadError> {
        if let Some(address) = self.failing.iter().find(|a| touches(a)) {
            return Err(ReadError(format!("execution reverted for {address}")));
        }
        if self.stalling.iter().any(|a| touches(a)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    fn lookup(&self, call: &Call) -> Result<Value, ReadError> {
        self.values
            .get(call)
            .cloned()
            .ok_or_else(|| ReadError(format!("execution reverted: {call}")))
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn multicall(&self, block: BlockNumber, calls: &[Call]) -> Result<Vec<Value>, ReadError> {
        self.record_block(block);
        self.multicalls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Let other batches start so concurrency is observable
        tokio::task::yield_now().await;
        let result = match self.gate(|a| calls.iter().any(|c| c.mentions(a))).await {
            Ok(()) => calls.iter().map(|c| self.lookup(c)).collect(),
            Err(e) => Err(e),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn call(&self, block: BlockNumber, call: &Call) -> Result<Value, ReadError> {
        self.record_block(block);
        self.gate(|a| call.mentions(a)).await?;
        self.lookup(call)
    }

    async fn balances(
        &self,
        block: BlockNumber,
        addresses: &[Address],
    ) -> Result<Vec<Uint256>, ReadError> {
        self.record_block(block);
        self.gate(|a| addresses.contains(a)).await?;
        Ok(addresses
            .iter()
            .map(|a| self.balances.get(a).copied().unwrap_or_default())
            .collect())
    }

    async fn contract_address(&self, block: BlockNumber, name: &str) -> Result<Address, ReadError> {
        self.record_block(block);
        self.contract_lookups.fetch_add(1, Ordering::SeqCst);
        Contract::ALL
            .iter()
            .find(|c| c.name() == name)
            .map(|c| self.contracts.address(*c))
            .ok_or_else(|| ReadError(format!("unknown contract {name}")))
    }
}

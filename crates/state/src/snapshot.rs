//! Snapshot assembly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use rewardtree_core::{Address, BlockNumber};

use crate::batch::{expect_uint, BatchRunner};
use crate::minipool::{self, MinipoolDetails};
use crate::network::{self, NetworkDetails, OracleMember, SchemaVersion};
use crate::node;
use crate::participant::{MegapoolDetails, NodeDetails};
use crate::reader::ChainReader;
use crate::registry::ContractRegistry;
use crate::Result;

/// Batching and concurrency limits for a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Items per batch for single-call-per-item rounds (default: 1000).
    pub address_batch_size: usize,
    /// Items per batch for multi-field rounds (default: 100).
    pub node_batch_size: usize,
    /// Maximum batches in flight (default: 6).
    pub concurrency: usize,
    /// Deadline for one batch (default: 30s).
    pub batch_timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            address_batch_size: 1000,
            node_batch_size: 100,
            concurrency: 6,
            batch_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything needed to compute one interval's rewards, read at one block.
///
/// Never mutated once built.
#[derive(Debug, Clone)]
pub struct NetworkState {
    pub block: BlockNumber,
    pub network: NetworkDetails,
    pub nodes: Vec<NodeDetails>,
    pub minipools: Vec<MinipoolDetails>,
    pub oracle_members: Vec<OracleMember>,
    nodes_by_address: BTreeMap<Address, usize>,
    minipools_by_node: BTreeMap<Address, Vec<usize>>,
}

impl NetworkState {
    pub fn new(
        block: BlockNumber,
        network: NetworkDetails,
        nodes: Vec<NodeDetails>,
        minipools: Vec<MinipoolDetails>,
        oracle_members: Vec<OracleMember>,
    ) -> Self {
        let nodes_by_address: BTreeMap<Address, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.address, i))
            .collect();
        let mut minipools_by_node: BTreeMap<Address, Vec<usize>> = BTreeMap::new();
        for (i, mp) in minipools.iter().enumerate() {
            minipools_by_node.entry(mp.node).or_default().push(i);
        }
        Self {
            block,
            network,
            nodes,
            minipools,
            oracle_members,
            nodes_by_address,
            minipools_by_node,
        }
    }

    pub fn node(&self, address: &Address) -> Option<&NodeDetails> {
        self.nodes_by_address
            .get(address)
            .and_then(|&i| self.nodes.get(i))
    }

    /// Legacy pools owned by `node`.
    pub fn minipools_for<'a>(&'a self, node: &Address) -> impl Iterator<Item = &'a MinipoolDetails> + 'a {
        self.minipools_by_node
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.minipools.get(i))
    }
}

/// Reads a [`NetworkState`] at a pinned block.
pub struct Snapshotter {
    reader: Arc<dyn ChainReader>,
    registry: Arc<ContractRegistry>,
    config: SnapshotConfig,
}

impl Snapshotter {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        registry: Arc<ContractRegistry>,
        config: SnapshotConfig,
    ) -> Self {
        Self {
            reader,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Take a snapshot at `block`. Any failed read fails the whole snapshot.
    pub async fn snapshot(&self, block: BlockNumber) -> Result<NetworkState> {
        let started = Instant::now();
        let contracts = self.registry.contracts(block).await?;
        let runner = BatchRunner::new(
            self.reader.as_ref(),
            block,
            self.config.concurrency,
            self.config.batch_timeout,
        );
        let address_batch = self.config.address_batch_size;
        let node_batch = self.config.node_batch_size;

        // 1. Protocol schema and network parameters
        let schema = network::schema_version(&runner, contracts).await?;
        let network = network::network_details(&runner, contracts, schema).await?;

        // 2. Node addresses
        let count_call = node::node_count_call(contracts);
        let node_count = expect_uint(&count_call, runner.single(count_call.clone()).await?)?.low_u64();
        let addresses = node::node_addresses(&runner, contracts, node_count, address_batch).await?;

        // 3. Per-node rounds
        let raw = node::node_details(&runner, contracts, schema, &addresses, node_batch).await?;
        let mut megapools: Vec<Option<MegapoolDetails>> = vec![None; raw.len()];
        if schema >= SchemaVersion::Pooled {
            let counts = node::megapool_counts(&runner, &raw, node_batch).await?;
            for (i, details) in node::megapool_bonds(&runner, contracts, &counts, node_batch).await? {
                if let Some(slot) = megapools.get_mut(i) {
                    *slot = Some(details);
                }
            }
        }
        let balances = runner.balances(&addresses, address_batch).await?;

        // 4. Legacy pools
        let pools = minipool::minipool_addresses(&runner, contracts, &raw, address_batch).await?;
        let minipools = minipool::minipool_details(&runner, &pools, node_batch).await?;

        // 5. Oracle committee
        let oracle_members = network::oracle_members(&runner, contracts, address_batch).await?;

        let nodes: Vec<NodeDetails> = raw
            .into_iter()
            .zip(megapools)
            .zip(balances)
            .map(|((raw, megapool), balance)| NodeDetails::new(raw, megapool, balance))
            .collect();

        info!(
            block,
            schema = schema.as_u64(),
            nodes = nodes.len(),
            minipools = minipools.len(),
            oracle_members = oracle_members.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "network state snapshot complete"
        );

        Ok(NetworkState::new(block, network, nodes, minipools, oracle_members))
    }
}

use super::*;
use async_trait::async_trait;
use rewardtree_core::{Address, Hash, Uint256, ONE_ETH};
use rewardtree_file::RewardsFile;
use rewardtree_state::mock::{MockChain, MockMinipool, MockNode, MockParams};
use rewardtree_state::{ChainReader, ContractRegistry, MinipoolStatus, SchemaVersion};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

const GENESIS: u64 = 1_700_000_000;
const END_EPOCH: u64 = 6300;
const EXECUTION_OFFSET: u64 = 1_000_000;

/// Consensus reader backed by slot arithmetic.
struct MockBeacon {
    finalized: u64,
    missed: BTreeSet<u64>,
    merge_slot: u64,
    slots_per_epoch: u64,
}

impl MockBeacon {
    fn new() -> Self {
        Self {
            finalized: END_EPOCH + 2,
            missed: BTreeSet::new(),
            merge_slot: 0,
            slots_per_epoch: 32,
        }
    }
}

#[async_trait]
impl BeaconReader for MockBeacon {
    async fn config(&self) -> std::result::Result<BeaconConfig, BeaconError> {
        Ok(BeaconConfig {
            genesis_time: GENESIS,
            seconds_per_slot: 12,
            slots_per_epoch: self.slots_per_epoch,
        })
    }

    async fn finalized_epoch(&self) -> std::result::Result<u64, BeaconError> {
        Ok(self.finalized)
    }

    async fn block(&self, slot: u64) -> std::result::Result<Option<BeaconBlock>, BeaconError> {
        if self.missed.contains(&slot) {
            return Ok(None);
        }
        let execution_block = if slot < self.merge_slot { 0 } else { EXECUTION_OFFSET + slot };
        Ok(Some(BeaconBlock { slot, execution_block }))
    }
}

fn eth(n: u64) -> Uint256 {
    Uint256::from(n as u128 * ONE_ETH)
}

fn node_address(n: u64) -> Address {
    Address::from_low_u64(0x1000 + n)
}

fn chain(nodes: u64) -> MockChain {
    let mut chain = MockChain::new(SchemaVersion::Pooled);
    chain.set_params(&MockParams {
        reward_index: 7,
        interval_start: GENESIS,
        ..Default::default()
    });
    for n in 0..nodes {
        chain.add_node(MockNode {
            registration_time: GENESIS - 1_000_000,
            smoothing_pool_opted_in: n % 2 == 0,
            smoothing_pool_changed: GENESIS - 1_000_000,
            legacy_staked: eth(1_000 + n),
            effective_stake: eth(1_000 + n),
            minimum_stake: eth(100),
            eth_borrowed: eth(24),
            eth_bonded: eth(8),
            balance: eth(1),
            ..MockNode::new(node_address(n))
        });
        chain.add_minipool(
            node_address(n),
            MockMinipool {
                address: Address::from_low_u64(0x9000 + n),
                status: MinipoolStatus::Staking,
                node_fee: Uint256::exp10(17),
                node_deposit_balance: eth(8),
                user_deposit_balance: eth(24),
                finalised: false,
            },
        );
    }
    chain.add_oracle_member(Address::from_low_u64(0xAAAA), GENESIS - 10);
    chain
}

fn target() -> IntervalTarget {
    IntervalTarget {
        end_epoch: END_EPOCH,
        previous_consensus_slot: None,
    }
}

fn generator(chain: MockChain, beacon: MockBeacon, sink: Arc<dyn ArtifactSink>) -> TreeGenerator {
    let reader: Arc<dyn ChainReader> = Arc::new(chain);
    TreeGenerator::new(reader, Arc::new(beacon), sink, GeneratorConfig::default())
}

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rewardtree-{label}-{}", std::process::id()))
}

// ─── Full runs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_generate_full_interval() {
    let sink = Arc::new(MemorySink::new());
    let gen = generator(chain(8), MockBeacon::new(), sink.clone());
    let result = gen.generate(target()).await.unwrap();

    let last_slot = END_EPOCH * 32 + 31;
    assert_eq!(result.bounds.index, 7);
    assert_eq!(result.bounds.consensus_start_block, 0);
    assert_eq!(result.bounds.execution_start_block, 0);
    assert_eq!(result.bounds.consensus_end_block, last_slot);
    assert_eq!(result.bounds.execution_end_block, EXECUTION_OFFSET + last_slot);
    assert_eq!(result.bounds.end_time, GENESIS + last_slot * 12);
    assert_eq!(result.bounds.intervals_passed, 1);

    assert_eq!(
        sink.names(),
        vec![
            "rewards-1-7.bin".to_string(),
            "rewards-1-7.json".to_string(),
            "voting-power-1-7.json".to_string(),
        ]
    );

    let file = &result.file;
    assert_eq!(file.network, 1);
    assert_eq!(file.index, 7);
    assert_eq!(file.ruleset_version, 10);
    // eight nodes plus the oracle committee member
    assert_eq!(file.node_rewards().len(), 9);
    let root = file.merkle_root().unwrap();
    assert!(!root.is_zero());

    let parsed = RewardsFile::parse(&sink.get("rewards-1-7.bin").unwrap()).unwrap();
    assert_eq!(parsed.merkle_root().unwrap(), root);
    assert_eq!(parsed.execution_end_block, EXECUTION_OFFSET + last_slot);

    let from_json = RewardsFile::from_json(&sink.get("rewards-1-7.json").unwrap()).unwrap();
    assert_eq!(from_json.merkle_root().unwrap(), root);

    let voting: serde_json::Value =
        serde_json::from_slice(&sink.get("voting-power-1-7.json").unwrap()).unwrap();
    assert_eq!(voting["nodes"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_generate_is_deterministic() {
    let a = generator(chain(5), MockBeacon::new(), Arc::new(MemorySink::new()));
    let b = generator(chain(5), MockBeacon::new(), Arc::new(MemorySink::new()));
    let ra = a.generate(target()).await.unwrap();
    let rb = b.generate(target()).await.unwrap();
    assert_eq!(ra.file.merkle_root().unwrap(), rb.file.merkle_root().unwrap());
    assert_eq!(ra.voting_power, rb.voting_power);
}

#[tokio::test]
async fn test_optional_artifacts_skipped() {
    let sink = Arc::new(MemorySink::new());
    let reader: Arc<dyn ChainReader> = Arc::new(chain(2));
    let config = GeneratorConfig {
        write_json: false,
        write_voting_power: false,
        ..Default::default()
    };
    let gen = TreeGenerator::new(reader, Arc::new(MockBeacon::new()), sink.clone(), config);
    gen.generate(target()).await.unwrap();
    assert_eq!(sink.names(), vec!["rewards-1-7.bin".to_string()]);
}

#[tokio::test]
async fn test_file_sink_output() {
    let dir = temp_dir("generate");
    let sink = Arc::new(FileSink::new(&dir));
    let gen = generator(chain(3), MockBeacon::new(), sink);
    let result = gen.generate(target()).await.unwrap();

    assert_eq!(result.artifacts.len(), 3);
    let bytes = std::fs::read(dir.join("rewards-1-7.bin")).unwrap();
    let parsed = RewardsFile::parse(&bytes).unwrap();
    assert_eq!(parsed.merkle_root().unwrap(), result.file.merkle_root().unwrap());

    let temps = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(temps, 0);
    std::fs::remove_dir_all(&dir).unwrap();
}

// ─── Failure leaves nothing behind ──────────────────────────────────────────

#[tokio::test]
async fn test_failed_snapshot_writes_nothing() {
    let mut chain = chain(50);
    chain.fail_reads_for(node_address(5));
    let sink = Arc::new(MemorySink::new());
    let gen = generator(chain, MockBeacon::new(), sink.clone());

    let err = gen.generate(target()).await.unwrap_err();
    assert!(matches!(err, GeneratorError::State(_)));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_failed_snapshot_creates_no_files() {
    let mut chain = chain(20);
    chain.fail_reads_for(node_address(5));
    let dir = temp_dir("failed");
    let gen = generator(chain, MockBeacon::new(), Arc::new(FileSink::new(&dir)));

    assert!(gen.generate(target()).await.is_err());
    assert!(!dir.exists());
}

// ─── Interval bounds ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unfinalized_epoch_rejected() {
    let beacon = MockBeacon {
        finalized: END_EPOCH - 1,
        ..MockBeacon::new()
    };
    let sink = Arc::new(MemorySink::new());
    let gen = generator(chain(1), beacon, sink.clone());
    let err = gen.generate(target()).await.unwrap_err();
    assert!(matches!(
        err,
        GeneratorError::EpochNotFinalized { epoch: END_EPOCH, finalized } if finalized == END_EPOCH - 1
    ));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_missed_slots_at_end_walk_backwards() {
    let last = END_EPOCH * 32 + 31;
    let mut beacon = MockBeacon::new();
    beacon.missed.extend([last, last - 1]);
    let gen = generator(chain(1), beacon, Arc::new(MemorySink::new()));
    let result = gen.generate(target()).await.unwrap();
    assert_eq!(result.bounds.consensus_end_block, last - 2);
    assert_eq!(result.bounds.execution_end_block, EXECUTION_OFFSET + last - 2);
}

#[tokio::test]
async fn test_empty_end_epoch_rejected() {
    let first = END_EPOCH * 32;
    let mut beacon = MockBeacon::new();
    beacon.missed.extend(first..first + 32);
    let gen = generator(chain(1), beacon, Arc::new(MemorySink::new()));
    let err = gen.generate(target()).await.unwrap_err();
    assert!(matches!(err, GeneratorError::NoBlockInEpoch(END_EPOCH)));
}

#[tokio::test]
async fn test_missed_slots_at_start_walk_forwards() {
    let previous_slot = 5000 * 32 + 31;
    let next_epoch_start = 5001 * 32;
    let mut beacon = MockBeacon::new();
    beacon.missed.insert(next_epoch_start);
    let gen = generator(chain(1), beacon, Arc::new(MemorySink::new()));
    let result = gen
        .generate(IntervalTarget {
            end_epoch: END_EPOCH,
            previous_consensus_slot: Some(previous_slot),
        })
        .await
        .unwrap();
    assert_eq!(result.bounds.consensus_start_block, next_epoch_start + 1);
    assert_eq!(result.bounds.execution_start_block, EXECUTION_OFFSET + next_epoch_start + 1);
}

#[tokio::test]
async fn test_pre_merge_end_rejected() {
    let beacon = MockBeacon {
        merge_slot: u64::MAX,
        ..MockBeacon::new()
    };
    let gen = generator(chain(1), beacon, Arc::new(MemorySink::new()));
    let err = gen.generate(target()).await.unwrap_err();
    assert!(matches!(err, GeneratorError::PreMerge(_)));
}

#[tokio::test]
async fn test_zero_slots_per_epoch_rejected() {
    let beacon = MockBeacon {
        slots_per_epoch: 0,
        ..MockBeacon::new()
    };
    let reader = Arc::new(chain(1));
    let sink = Arc::new(MemorySink::new());
    let gen = TreeGenerator::new(reader.clone(), Arc::new(beacon), sink.clone(), GeneratorConfig::default());
    let err = gen.generate(target()).await.unwrap_err();
    assert!(matches!(err, GeneratorError::InvalidBeaconConfig(_)));
    // rejected before any chain read
    assert_eq!(reader.multicall_count(), 0);
    assert!(sink.is_empty());
}

// ─── Committed roots ────────────────────────────────────────────────────────

async fn generated_root() -> (Hash, u64) {
    let gen = generator(chain(4), MockBeacon::new(), Arc::new(MemorySink::new()));
    let result = gen.generate(target()).await.unwrap();
    (result.file.merkle_root().unwrap(), result.bounds.execution_end_block)
}

#[tokio::test]
async fn test_committed_root_matches() {
    let (root, block) = generated_root().await;
    let mut committed = chain(4);
    committed.set_committed_root(7, root);
    let reader: Arc<dyn ChainReader> = Arc::new(committed);
    let registry = ContractRegistry::new(reader.clone());
    compare_with_committed_root(reader.as_ref(), &registry, block, 7, root)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_committed_root_mismatch() {
    let (root, block) = generated_root().await;
    let mut committed = chain(4);
    committed.set_committed_root(7, Hash([0x11; 32]));
    let reader: Arc<dyn ChainReader> = Arc::new(committed);
    let registry = ContractRegistry::new(reader.clone());
    let err = compare_with_committed_root(reader.as_ref(), &registry, block, 7, root)
        .await
        .unwrap_err();
    assert!(matches!(err, GeneratorError::CommittedRootMismatch { index: 7, .. }));
}

#[tokio::test]
async fn test_root_not_committed() {
    let mut committed = chain(1);
    committed.set_committed_root(7, Hash::ZERO);
    let reader: Arc<dyn ChainReader> = Arc::new(committed);
    let registry = ContractRegistry::new(reader.clone());
    let err = compare_with_committed_root(reader.as_ref(), &registry, 1, 7, Hash([1; 32]))
        .await
        .unwrap_err();
    assert!(matches!(err, GeneratorError::RootNotCommitted(7)));
}

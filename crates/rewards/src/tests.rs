use super::*;
use crate::math::{fixed, one};
use rewardtree_core::{Address, Uint256};
use rewardtree_file::RewardsFile;
use rewardtree_state::{
    MegapoolDetails, MinipoolDetails, MinipoolStatus, NetworkDetails, NetworkState, NodeDetails, OracleMember,
    RawNodeDetails, SchemaVersion,
};

const START: u64 = 1_700_000_000;
const END: u64 = START + 1_000_000;

fn pct(p: u64) -> Uint256 {
    Uint256::exp10(16).checked_mul(Uint256::from(p)).unwrap()
}

fn window() -> IntervalWindow {
    IntervalWindow::new(START, END).unwrap()
}

fn network() -> NetworkDetails {
    NetworkDetails {
        schema: SchemaVersion::Pooled,
        token_price: Uint256::exp10(16),
        min_collateral_fraction: pct(10),
        pending_rewards: fixed(10_000),
        node_operator_share: pct(70),
        oracle_dao_share: pct(5),
        protocol_dao_share: pct(25),
        reward_index: 3,
        interval_start: START,
        interval_duration: END - START,
        megapool_node_share: pct(5),
        smoothing_pool_address: Address::from_low_u64(0x5A),
        smoothing_pool_balance: fixed(100),
    }
}

fn raw(n: u64, stake: u64) -> RawNodeDetails {
    RawNodeDetails {
        address: Address::from_low_u64(n),
        registration_time: START - 1,
        legacy_staked: fixed(stake),
        effective_stake: fixed(stake),
        eth_borrowed: fixed(24),
        eth_bonded: fixed(8),
        minipool_count: 1,
        active_minipool_count: 1,
        ..Default::default()
    }
}

fn node(n: u64, stake: u64) -> NodeDetails {
    NodeDetails::new(raw(n, stake), None, Uint256::ZERO)
}

fn opted_in(mut raw: RawNodeDetails, since: u64) -> NodeDetails {
    raw.smoothing_pool_opted_in = true;
    raw.smoothing_pool_changed = since;
    NodeDetails::new(raw, None, Uint256::ZERO)
}

fn minipool(owner: u64, n: u64) -> MinipoolDetails {
    MinipoolDetails {
        address: Address::from_low_u64(0x9000 + n),
        node: Address::from_low_u64(owner),
        status: MinipoolStatus::Staking,
        node_fee: Uint256::exp10(17),
        node_deposit_balance: fixed(8),
        user_deposit_balance: fixed(24),
        finalised: false,
    }
}

fn state(nodes: Vec<NodeDetails>, minipools: Vec<MinipoolDetails>, oracle: Vec<OracleMember>) -> NetworkState {
    NetworkState::new(19_000_000, network(), nodes, minipools, oracle)
}

fn calculate(state: &NetworkState) -> RewardsResult {
    RewardsCalculator::new(CalculatorConfig::default())
        .calculate(state, window())
        .unwrap()
}

fn reward_of(result: &RewardsResult, n: u64) -> &rewardtree_file::NodeReward {
    let address = Address::from_low_u64(n);
    result.node_rewards.iter().find(|r| r.address == address).unwrap()
}

// ─── Collateral weight ──────────────────────────────────────────────────────

#[test]
fn test_linear_weight_below_limit() {
    // 300 tokens at 0.01 is 3 ETH of 24 borrowed, 12.5%
    let weight = node_weight(&node(1, 300), &network(), &window()).unwrap();
    assert_eq!(weight, fixed(300));
}

#[test]
fn test_weight_at_limit() {
    // 360 tokens is exactly 15%: 100 * 3.6
    let weight = node_weight(&node(1, 360), &network(), &window()).unwrap();
    assert_eq!(weight, fixed(360));
}

#[test]
fn test_logarithmic_weight_above_limit() {
    let linear = fixed(361);
    let weight = node_weight(&node(1, 361), &network(), &window()).unwrap();
    assert!(weight < linear);
    // continuous at the boundary: within 0.1%
    assert!(weight > linear - fixed(361).mul_div(Uint256::from(1u64), Uint256::from(1000u64)).unwrap());

    // diminishing returns: doubling stake far less than doubles weight
    let big = node_weight(&node(1, 2000), &network(), &window()).unwrap();
    let bigger = node_weight(&node(1, 4000), &network(), &window()).unwrap();
    assert!(bigger > big);
    assert!(bigger < big.checked_mul(Uint256::from(2u64)).unwrap());
}

#[test]
fn test_below_minimum_collateral_weighs_zero() {
    // minimum is 24 * 10% / 0.01 = 240 tokens
    assert_eq!(node_weight(&node(1, 239), &network(), &window()).unwrap(), Uint256::ZERO);
    assert_eq!(node_weight(&node(1, 240), &network(), &window()).unwrap(), fixed(240));
}

#[test]
fn test_nothing_borrowed_weighs_zero() {
    let mut r = raw(1, 1000);
    r.eth_borrowed = Uint256::ZERO;
    let node = NodeDetails::new(r, None, Uint256::ZERO);
    assert_eq!(node_weight(&node, &network(), &window()).unwrap(), Uint256::ZERO);
}

#[test]
fn test_floored_effective_stake_weighs_zero() {
    let mut r = raw(1, 1000);
    r.minimum_stake = fixed(2000);
    let node = NodeDetails::new(r, None, Uint256::ZERO);
    assert_eq!(node_weight(&node, &network(), &window()).unwrap(), Uint256::ZERO);
}

#[test]
fn test_weight_prorated_by_registration() {
    let mut r = raw(1, 300);
    r.registration_time = START + (END - START) / 2;
    let node = NodeDetails::new(r, None, Uint256::ZERO);
    assert_eq!(node_weight(&node, &network(), &window()).unwrap(), fixed(150));
}

#[test]
fn test_zero_price_is_error() {
    let mut net = network();
    net.token_price = Uint256::ZERO;
    assert_eq!(
        node_weight(&node(1, 300), &net, &window()),
        Err(RewardsError::ZeroTokenPrice)
    );
}

// ─── Token split ────────────────────────────────────────────────────────────

#[test]
fn test_totals_reconcile() {
    let s = state(
        vec![node(1, 300), node(2, 1000), node(3, 700)],
        vec![],
        vec![OracleMember {
            address: Address::from_low_u64(1),
            joined_time: 0,
        }],
    );
    let result = calculate(&s);
    let t = &result.totals;
    assert_eq!(t.protocol_dao + t.total_collateral + t.total_oracle_dao, fixed(10_000));
    assert_eq!(t.pool_staker_smoothing_pool_eth + t.node_operator_smoothing_pool_eth, fixed(100));

    let node_sum: Uint256 = result.node_rewards.iter().map(|r| r.collateral).sum();
    assert_eq!(node_sum, t.total_collateral);
    let network_sum: Uint256 = result.network_rewards.iter().map(|r| r.collateral).sum();
    assert_eq!(network_sum, t.total_collateral);
    // 70% to node operators, at most a few wei of dust
    assert!(t.total_collateral <= fixed(7_000));
    assert!(t.total_collateral > fixed(7_000) - Uint256::from(10u64));
}

#[test]
fn test_collateral_split_by_weight() {
    let s = state(vec![node(1, 300), node(2, 240)], vec![], vec![]);
    let result = calculate(&s);
    // weights 300 and 240 of 540, pool 7000
    assert_eq!(
        reward_of(&result, 1).collateral,
        fixed(7_000).mul_div(fixed(300), fixed(540)).unwrap()
    );
    assert_eq!(
        reward_of(&result, 2).collateral,
        fixed(7_000).mul_div(fixed(240), fixed(540)).unwrap()
    );
    assert_eq!(result.totals.total_node_weight, fixed(540));
}

#[test]
fn test_no_weight_sends_node_share_to_treasury() {
    let s = state(vec![node(1, 10)], vec![], vec![]);
    let result = calculate(&s);
    assert!(result.node_rewards.is_empty());
    assert!(result.network_rewards.is_empty());
    assert_eq!(result.totals.total_collateral, Uint256::ZERO);
    // no oracle members either, so everything goes to the treasury
    assert_eq!(result.totals.protocol_dao, fixed(10_000));
}

#[test]
fn test_unknown_network_routes_to_zero() {
    let mut r = raw(1, 300);
    r.reward_network = 7;
    let s = state(vec![NodeDetails::new(r, None, Uint256::ZERO), node(2, 300)], vec![], vec![]);

    let result = calculate(&s);
    assert_eq!(reward_of(&result, 1).network, 0);
    assert_eq!(result.network_rewards.len(), 1);

    let config = CalculatorConfig {
        valid_networks: [0, 7].into_iter().collect(),
    };
    let result = RewardsCalculator::new(config).calculate(&s, window()).unwrap();
    assert_eq!(reward_of(&result, 1).network, 7);
    let networks: Vec<u64> = result.network_rewards.iter().map(|r| r.network).collect();
    assert_eq!(networks, vec![0, 7]);
}

#[test]
fn test_oracle_split_by_membership_time() {
    let oracle = vec![
        OracleMember {
            address: Address::from_low_u64(0xA1),
            joined_time: 0,
        },
        OracleMember {
            address: Address::from_low_u64(0xA2),
            joined_time: START + (END - START) / 2,
        },
    ];
    let result = calculate(&state(vec![], vec![], oracle));
    // pool 500, shares 2:1
    let first = reward_of(&result, 0xA1);
    let second = reward_of(&result, 0xA2);
    assert_eq!(first.oracle_dao, fixed(500).mul_div(Uint256::from(2u64), Uint256::from(3u64)).unwrap());
    assert_eq!(second.oracle_dao, fixed(500).mul_div(Uint256::from(1u64), Uint256::from(3u64)).unwrap());
    // non-node members are paid on network 0
    assert_eq!(first.network, 0);
    assert_eq!(
        result.totals.protocol_dao,
        fixed(10_000) - first.oracle_dao - second.oracle_dao
    );
}

#[test]
fn test_invalid_shares_rejected() {
    let mut s = state(vec![], vec![], vec![]);
    s.network.protocol_dao_share = pct(30);
    let err = RewardsCalculator::new(CalculatorConfig::default())
        .calculate(&s, window())
        .unwrap_err();
    assert!(matches!(err, RewardsError::InvalidShares { .. }));
}

// ─── Smoothing pool ─────────────────────────────────────────────────────────

#[test]
fn test_smoothing_single_validator() {
    let s = state(vec![opted_in(raw(1, 300), 0)], vec![minipool(1, 0)], vec![]);
    let result = calculate(&s);
    // score 0.325 for the only validator
    let expected = fixed(100).mul_div(Uint256::from(325u64), Uint256::from(1000u64)).unwrap();
    assert_eq!(reward_of(&result, 1).smoothing_pool_eth, expected);
    assert_eq!(result.totals.node_operator_smoothing_pool_eth, expected);
    assert_eq!(result.totals.pool_staker_smoothing_pool_eth, fixed(100) - expected);
}

#[test]
fn test_smoothing_nobody_opted_in() {
    let s = state(vec![node(1, 300)], vec![minipool(1, 0)], vec![]);
    let result = calculate(&s);
    assert_eq!(result.totals.pool_staker_smoothing_pool_eth, fixed(100));
    assert_eq!(result.totals.node_operator_smoothing_pool_eth, Uint256::ZERO);
    assert_eq!(reward_of(&result, 1).smoothing_pool_eth, Uint256::ZERO);
}

#[test]
fn test_smoothing_partial_opt_in() {
    let half = START + (END - START) / 2;
    let s = state(
        vec![opted_in(raw(1, 0), 0), opted_in(raw(2, 0), half)],
        vec![minipool(1, 0), minipool(2, 1)],
        vec![],
    );
    let result = calculate(&s);
    let first = reward_of(&result, 1).smoothing_pool_eth;
    let second = reward_of(&result, 2).smoothing_pool_eth;
    assert_eq!(first, second.checked_mul(Uint256::from(2u64)).unwrap());
}

#[test]
fn test_smoothing_ignores_inactive_pools() {
    let mut exited = minipool(1, 1);
    exited.status = MinipoolStatus::Withdrawable;
    let s = state(vec![opted_in(raw(1, 0), 0)], vec![exited], vec![]);
    let result = calculate(&s);
    assert_eq!(result.totals.pool_staker_smoothing_pool_eth, fixed(100));
}

#[test]
fn test_smoothing_counts_pooled_validators() {
    let mut r = raw(1, 0);
    r.smoothing_pool_opted_in = true;
    r.active_minipool_count = 0;
    r.eth_borrowed = fixed(56);
    r.megapool_eth_bonded = fixed(8);
    let megapool = MegapoolDetails {
        address: Address::from_low_u64(0x7000),
        active_validators: 2,
        ..Default::default()
    };
    let s = state(vec![NodeDetails::new(r, Some(megapool), Uint256::ZERO)], vec![], vec![]);
    let result = calculate(&s);
    // 5% share, 4 of 32 bonded each: 0.05 + 0.125 * 0.95 = 0.16875
    let expected = fixed(100).mul_div(Uint256::from(16_875u64), Uint256::from(100_000u64)).unwrap();
    assert_eq!(reward_of(&result, 1).smoothing_pool_eth, expected);
}

#[test]
fn test_smoothing_large_validator_count() {
    let mut r = raw(1, 0);
    r.smoothing_pool_opted_in = true;
    r.active_minipool_count = 0;
    r.megapool_eth_bonded = fixed(8);
    let megapool = MegapoolDetails {
        address: Address::from_low_u64(0x7000),
        active_validators: 1_000_000_000_000,
        ..Default::default()
    };
    let s = state(vec![NodeDetails::new(r, Some(megapool), Uint256::ZERO)], vec![], vec![]);
    let split = SmoothingPoolSplit::compute(&s, &window()).unwrap();
    assert_eq!(split.per_node.len(), 1);
    assert!(split.node_operator_total > fixed(5) - Uint256::from(1u64));
    assert_eq!(split.node_operator_total + split.pool_staker, fixed(100));
}

// ─── Assembly ───────────────────────────────────────────────────────────────

#[test]
fn test_result_forms_valid_rewards_file() {
    let nodes: Vec<NodeDetails> = (1..=20).rev().map(|n| opted_in(raw(n, 250 + n * 37), 0)).collect();
    let minipools: Vec<MinipoolDetails> = (1..=20).map(|n| minipool(n, n)).collect();
    let oracle = vec![OracleMember {
        address: Address::from_low_u64(3),
        joined_time: 0,
    }];
    let result = calculate(&state(nodes, minipools, oracle));

    let addresses: Vec<Address> = result.node_rewards.iter().map(|r| r.address).collect();
    let mut sorted = addresses.clone();
    sorted.sort();
    assert_eq!(addresses, sorted);

    let mut file = RewardsFile::new();
    file.total_rewards = Some(result.totals.clone());
    *file.node_rewards_mut() = result.node_rewards.clone();
    *file.network_rewards_mut() = result.network_rewards.clone();
    file.verify().unwrap();
    assert!(!file.merkle_root().unwrap().is_zero());
}

#[test]
fn test_calculation_deterministic() {
    let build = || {
        state(
            vec![opted_in(raw(1, 300), 0), node(2, 1000)],
            vec![minipool(1, 0)],
            vec![],
        )
    };
    assert_eq!(calculate(&build()), calculate(&build()));
}

#[test]
fn test_voting_power_in_result() {
    let result = calculate(&state(vec![node(1, 100), node(2, 0)], vec![], vec![]));
    assert_eq!(result.voting_power.node(&Address::from_low_u64(1)), Uint256::exp10(19));
    assert_eq!(result.voting_power.node(&Address::from_low_u64(2)), Uint256::ZERO);
    assert_eq!(result.voting_power.total_voting_power, Uint256::exp10(19));

    let json = serde_json::to_value(&result.voting_power).unwrap();
    assert_eq!(json["totalVotingPower"], "10000000000000000000");
    assert_eq!(json["nodes"][0]["votingPower"], "10000000000000000000");
}

#[test]
fn test_one_is_scale() {
    assert_eq!(one(), Uint256::exp10(18));
}

//! JSON form of the rewards file.
//!
//! Network and node rewards are objects keyed by decimal network id and hex
//! address. Every node entry carries its Merkle proof. Decoding always
//! verifies; there is no way to obtain an unverified file from JSON.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use rewardtree_core::{Address, Hash, NetworkId, Uint256};

use crate::binary::REWARDS_FILE_VERSION;
use crate::file::{Header, ProofSet, RewardsFile};
use crate::records::{NetworkReward, NodeReward, TotalRewards};
use crate::{FileError, InvariantViolation, Result};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonNetworkReward {
    #[serde(rename = "collateralRpl")]
    collateral: Uint256,
    #[serde(rename = "oracleDaoRpl")]
    oracle_dao: Uint256,
    smoothing_pool_eth: Uint256,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonNodeRewardOut<'a> {
    reward_network: NetworkId,
    #[serde(rename = "collateralRpl")]
    collateral: Uint256,
    #[serde(rename = "oracleDaoRpl")]
    oracle_dao: Uint256,
    smoothing_pool_eth: Uint256,
    merkle_proof: &'a [Hash],
}

/// Incoming node entry. The proof is derived data and is recomputed, so it
/// is not read.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonNodeRewardIn {
    reward_network: NetworkId,
    #[serde(rename = "collateralRpl")]
    collateral: Uint256,
    #[serde(rename = "oracleDaoRpl")]
    oracle_dao: Uint256,
    smoothing_pool_eth: Uint256,
}

struct NetworkMap<'a>(&'a [NetworkReward]);

impl Serialize for NetworkMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for n in self.0 {
            map.serialize_entry(
                &n.network.to_string(),
                &JsonNetworkReward {
                    collateral: n.collateral,
                    oracle_dao: n.oracle_dao,
                    smoothing_pool_eth: n.smoothing_pool_eth,
                },
            )?;
        }
        map.end()
    }
}

struct NodeMap<'a> {
    nodes: &'a [NodeReward],
    proofs: &'a ProofSet,
}

impl Serialize for NodeMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for (i, n) in self.nodes.iter().enumerate() {
            let siblings = self
                .proofs
                .proofs
                .get(i)
                .map(|p| p.siblings.as_slice())
                .unwrap_or(&[]);
            map.serialize_entry(
                &n.address,
                &JsonNodeRewardOut {
                    reward_network: n.network,
                    collateral: n.collateral,
                    oracle_dao: n.oracle_dao,
                    smoothing_pool_eth: n.smoothing_pool_eth,
                    merkle_proof: siblings,
                },
            )?;
        }
        map.end()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonFileOut<'a> {
    #[serde(flatten)]
    header: Header,
    merkle_root: Hash,
    total_rewards: &'a TotalRewards,
    network_rewards: NetworkMap<'a>,
    node_rewards: NodeMap<'a>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonFileIn {
    #[serde(flatten)]
    header: Header,
    #[serde(default)]
    merkle_root: Hash,
    #[serde(default)]
    total_rewards: Option<TotalRewards>,
    #[serde(default)]
    network_rewards: Entries<JsonNetworkReward>,
    #[serde(default)]
    node_rewards: Entries<JsonNodeRewardIn>,
}

/// JSON object entries in document order, duplicates preserved so they can
/// be reported instead of silently overwritten.
struct Entries<V>(Vec<(String, V)>);

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rewards")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry()? {
                    entries.push((k, v));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

impl RewardsFile {
    /// Encode as JSON, embedding each node's Merkle proof.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.encode_json(false)
    }

    /// Encode as indented JSON, embedding each node's Merkle proof.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        self.encode_json(true)
    }

    fn encode_json(&self, pretty: bool) -> Result<Vec<u8>> {
        self.verify()?;
        let proofs = self.proofs()?;
        let totals = self
            .total_rewards
            .as_ref()
            .ok_or(InvariantViolation::MissingTotals)?;

        let mut header = self.header();
        header.rewards_file_version = REWARDS_FILE_VERSION;

        let out = JsonFileOut {
            header,
            merkle_root: proofs.root,
            total_rewards: totals,
            network_rewards: NetworkMap(self.network_rewards()),
            node_rewards: NodeMap {
                nodes: self.node_rewards(),
                proofs: &proofs,
            },
        };

        let encoded = if pretty {
            serde_json::to_vec_pretty(&out)
        } else {
            serde_json::to_vec(&out)
        };
        encoded.map_err(|e| FileError::Malformed(e.to_string()))
    }

    /// Decode a JSON rewards file and verify it.
    ///
    /// Objects carry no order, so entries are placed in canonical order;
    /// a key that appears twice is a duplicate-entry violation.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: JsonFileIn =
            serde_json::from_slice(bytes).map_err(|e| FileError::Malformed(e.to_string()))?;

        let mut seen = BTreeSet::new();
        let mut network_rewards = Vec::with_capacity(raw.network_rewards.0.len());
        for (key, n) in raw.network_rewards.0 {
            let network: NetworkId = key
                .parse()
                .map_err(|_| FileError::Malformed(format!("invalid network id key {key:?}")))?;
            if !seen.insert(network) {
                return Err(InvariantViolation::DuplicateNetworkReward(network).into());
            }
            network_rewards.push(NetworkReward {
                network,
                collateral: n.collateral,
                oracle_dao: n.oracle_dao,
                smoothing_pool_eth: n.smoothing_pool_eth,
            });
        }
        network_rewards.sort_by_key(|n| n.network);

        let mut seen = BTreeSet::new();
        let mut node_rewards = Vec::with_capacity(raw.node_rewards.0.len());
        for (key, n) in raw.node_rewards.0 {
            let address: Address = key
                .parse()
                .map_err(|e: rewardtree_core::CoreError| FileError::Malformed(e.to_string()))?;
            if !seen.insert(address) {
                return Err(InvariantViolation::DuplicateNodeReward(address).into());
            }
            node_rewards.push(NodeReward {
                address,
                network: n.reward_network,
                collateral: n.collateral,
                oracle_dao: n.oracle_dao,
                smoothing_pool_eth: n.smoothing_pool_eth,
            });
        }
        node_rewards.sort_by_key(|n| n.address);

        let mut file = RewardsFile::from_parts(
            raw.header,
            raw.merkle_root,
            raw.total_rewards,
            network_rewards,
            node_rewards,
        );
        file.rewards_file_version = REWARDS_FILE_VERSION;
        file.verify()?;
        file.fill_root()?;
        Ok(file)
    }
}

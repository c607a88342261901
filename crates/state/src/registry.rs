//! Protocol contract registry.
//!
//! Addresses are resolved once per registry, on first use, and shared by
//! every snapshot that borrows the registry. There is no process-wide state;
//! each registry owns its own one-time initialisation.

use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use rewardtree_core::{Address, BlockNumber};

use crate::reader::ChainReader;
use crate::{Result, StateError};

/// Protocol contracts read by the snapshotter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Contract {
    NodeManager = 0,
    NodeStaking = 1,
    NodeDeposit = 2,
    MinipoolManager = 3,
    MegapoolFactory = 4,
    NetworkPrices = 5,
    ProtocolSettings = 6,
    RewardsSettings = 7,
    RewardsPool = 8,
    OracleDao = 9,
    SmoothingPool = 10,
}

impl Contract {
    pub const COUNT: usize = 11;

    pub const ALL: [Contract; Self::COUNT] = [
        Self::NodeManager,
        Self::NodeStaking,
        Self::NodeDeposit,
        Self::MinipoolManager,
        Self::MegapoolFactory,
        Self::NetworkPrices,
        Self::ProtocolSettings,
        Self::RewardsSettings,
        Self::RewardsPool,
        Self::OracleDao,
        Self::SmoothingPool,
    ];

    /// Name under which the contract is registered on chain.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NodeManager => "nodeManager",
            Self::NodeStaking => "nodeStaking",
            Self::NodeDeposit => "nodeDeposit",
            Self::MinipoolManager => "minipoolManager",
            Self::MegapoolFactory => "megapoolFactory",
            Self::NetworkPrices => "networkPrices",
            Self::ProtocolSettings => "protocolSettings",
            Self::RewardsSettings => "rewardsSettings",
            Self::RewardsPool => "rewardsPool",
            Self::OracleDao => "oracleDao",
            Self::SmoothingPool => "smoothingPool",
        }
    }
}

/// Resolved contract addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contracts {
    addresses: [Address; Contract::COUNT],
}

impl Contracts {
    pub fn new(addresses: [Address; Contract::COUNT]) -> Self {
        Self { addresses }
    }

    pub fn address(&self, contract: Contract) -> Address {
        self.addresses[contract as usize]
    }
}

/// Lazily resolved, shared contract handles.
pub struct ContractRegistry {
    reader: Arc<dyn ChainReader>,
    contracts: OnceCell<Contracts>,
}

impl ContractRegistry {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self {
            reader,
            contracts: OnceCell::new(),
        }
    }

    /// Contract addresses, resolving them at `block` on first call.
    ///
    /// Concurrent first callers wait on a single resolution. A failed
    /// resolution leaves the registry empty so a later call can retry.
    pub async fn contracts(&self, block: BlockNumber) -> Result<&Contracts> {
        self.contracts
            .get_or_try_init(|| self.resolve(block))
            .await
    }

    async fn resolve(&self, block: BlockNumber) -> Result<Contracts> {
        let lookups = Contract::ALL.iter().map(|c| async move {
            let address = self
                .reader
                .contract_address(block, c.name())
                .await
                .map_err(|source| StateError::RemoteRead {
                    query: format!("contract address of {}", c.name()),
                    source,
                })?;
            debug!(contract = c.name(), address = %address, "resolved contract");
            Ok::<_, StateError>(address)
        });
        let resolved = try_join_all(lookups).await?;

        let mut addresses = [Address::ZERO; Contract::COUNT];
        addresses.copy_from_slice(&resolved);
        info!(block, contracts = addresses.len(), "contract registry initialised");
        Ok(Contracts::new(addresses))
    }

    pub fn is_initialised(&self) -> bool {
        self.contracts.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_indices_match_all() {
        for (i, c) in Contract::ALL.iter().enumerate() {
            assert_eq!(*c as usize, i);
        }
    }

    #[test]
    fn test_contract_names_unique() {
        let mut names: Vec<_> = Contract::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Contract::ALL.len());
    }
}

//! Rewards Tree State Snapshotter
//!
//! Builds a [`NetworkState`] in which every value is read at one pinned
//! block. Nodes, their sub-accounts and network-wide parameters are read in
//! fixed-size batches by a bounded pool of concurrent tasks. Rounds that
//! depend on earlier results run strictly after them, and the first failed
//! or timed-out batch aborts the whole snapshot.

pub mod batch;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod minipool;
pub mod network;
pub mod node;
pub mod participant;
pub mod reader;
pub mod registry;
pub mod snapshot;

pub use minipool::{MinipoolDetails, MinipoolStatus};
pub use network::{committed_root, NetworkDetails, OracleMember, SchemaVersion};
pub use participant::{MegapoolDetails, NodeDetails, RawNodeDetails};
pub use reader::{Arg, Call, ChainReader, ReadError, Value};
pub use registry::{Contract, ContractRegistry, Contracts};
pub use snapshot::{NetworkState, SnapshotConfig, Snapshotter};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("remote read failed for {query}: {source}")]
    RemoteRead {
        query: String,
        #[source]
        source: ReadError,
    },
    #[error("remote read for {query} exceeded the {secs}s deadline")]
    Timeout { query: String, secs: u64 },
    #[error("unexpected value for {query}: expected {expected}, got {got}")]
    UnexpectedValue {
        query: String,
        expected: &'static str,
        got: String,
    },
    #[error("response for {query} had {got} values, expected {expected}")]
    ResponseLength {
        query: String,
        expected: usize,
        got: usize,
    },
    #[error("protocol schema version {0} is not supported")]
    SchemaVersionUnsupported(u64),
}

pub type Result<T> = std::result::Result<T, StateError>;

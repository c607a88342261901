//! Boundary to the remote chain-data reader.
//!
//! The reader owns transport, ABI encoding and retries. This crate only
//! describes what to read and at which block.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use rewardtree_core::{Address, BlockNumber, Hash, Uint256};

/// Failure reported by a chain reader implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ReadError(pub String);

/// Argument to a contract view call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arg {
    Uint(u64),
    Address(Address),
}

/// One contract view call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub contract: Address,
    pub method: &'static str,
    pub args: Vec<Arg>,
}

impl Call {
    pub fn new(contract: Address, method: &'static str) -> Self {
        Self {
            contract,
            method,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_address(self, address: Address) -> Self {
        self.arg(Arg::Address(address))
    }

    pub fn with_uint(self, value: u64) -> Self {
        self.arg(Arg::Uint(value))
    }

    /// Whether any argument or the target is `address`.
    pub fn mentions(&self, address: &Address) -> bool {
        self.contract == *address
            || self
                .args
                .iter()
                .any(|a| matches!(a, Arg::Address(x) if x == address))
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.method, self.contract)?;
        for arg in &self.args {
            match arg {
                Arg::Uint(v) => write!(f, ", {v}")?,
                Arg::Address(a) => write!(f, ", {a}")?,
            }
        }
        write!(f, ")")
    }
}

/// Decoded return value of a view call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uint(Uint256),
    Bool(bool),
    Address(Address),
    Bytes32(Hash),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
            Self::Bytes32(_) => "bytes32",
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(Uint256::from(v))
    }
}

impl From<Uint256> for Value {
    fn from(v: Uint256) -> Self {
        Self::Uint(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Self::Address(v)
    }
}

/// Remote chain-data reader pinned to explicit block heights.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute a batch of view calls against `block`, returning one value
    /// per call in order.
    async fn multicall(&self, block: BlockNumber, calls: &[Call]) -> Result<Vec<Value>, ReadError>;

    /// Execute one view call against `block`.
    async fn call(&self, block: BlockNumber, call: &Call) -> Result<Value, ReadError>;

    /// Native-currency balances of `addresses` at `block`, in order.
    async fn balances(
        &self,
        block: BlockNumber,
        addresses: &[Address],
    ) -> Result<Vec<Uint256>, ReadError>;

    /// Resolve a named protocol contract through the on-chain directory.
    async fn contract_address(&self, block: BlockNumber, name: &str) -> Result<Address, ReadError>;
}

//! Bounded-concurrency batch rounds.
//!
//! A round splits its items into fixed-size batches, sends each batch as one
//! multicall and decodes the results per item. At most `concurrency`
//! batches are in flight. Results come back in item order, and the first
//! failed or timed-out batch fails the round with every partial result
//! discarded.

use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use rewardtree_core::{Address, BlockNumber, Hash, Uint256};

use crate::reader::{Call, ChainReader, Value};
use crate::{Result, StateError};

/// Typed cursor over the values returned for one item's calls.
pub struct Values<'a> {
    calls: &'a [Call],
    values: &'a [Value],
    pos: usize,
}

impl<'a> Values<'a> {
    pub fn new(calls: &'a [Call], values: &'a [Value]) -> Self {
        Self {
            calls,
            values,
            pos: 0,
        }
    }

    fn next(&mut self) -> Result<(&'a Call, &'a Value)> {
        let i = self.pos;
        match (self.calls.get(i), self.values.get(i)) {
            (Some(call), Some(value)) => {
                self.pos += 1;
                Ok((call, value))
            }
            _ => Err(StateError::ResponseLength {
                query: self
                    .calls
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                expected: i + 1,
                got: self.values.len(),
            }),
        }
    }

    fn mismatch(call: &Call, expected: &'static str, got: &Value) -> StateError {
        StateError::UnexpectedValue {
            query: call.to_string(),
            expected,
            got: got.kind().to_string(),
        }
    }

    pub fn uint(&mut self) -> Result<Uint256> {
        match self.next()? {
            (_, Value::Uint(v)) => Ok(*v),
            (call, other) => Err(Self::mismatch(call, "uint", other)),
        }
    }

    /// A uint that must fit in 64 bits (counts, timestamps, ids).
    pub fn u64(&mut self) -> Result<u64> {
        match self.next()? {
            (call, Value::Uint(v)) => {
                if *v > Uint256::from(u64::MAX) {
                    return Err(Self::mismatch(call, "uint64", &Value::Uint(*v)));
                }
                Ok(v.low_u64())
            }
            (call, other) => Err(Self::mismatch(call, "uint64", other)),
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.next()? {
            (_, Value::Bool(v)) => Ok(*v),
            (call, other) => Err(Self::mismatch(call, "bool", other)),
        }
    }

    pub fn address(&mut self) -> Result<Address> {
        match self.next()? {
            (_, Value::Address(v)) => Ok(*v),
            (call, other) => Err(Self::mismatch(call, "address", other)),
        }
    }

    pub fn bytes32(&mut self) -> Result<Hash> {
        match self.next()? {
            (_, Value::Bytes32(v)) => Ok(*v),
            (call, other) => Err(Self::mismatch(call, "bytes32", other)),
        }
    }
}

/// Runs rounds of batched reads against one pinned block.
pub struct BatchRunner<'a> {
    reader: &'a dyn ChainReader,
    block: BlockNumber,
    concurrency: usize,
    deadline: Duration,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        reader: &'a dyn ChainReader,
        block: BlockNumber,
        concurrency: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            reader,
            block,
            concurrency: concurrency.max(1),
            deadline,
        }
    }

    pub fn block(&self) -> BlockNumber {
        self.block
    }

    /// Run one round over `items`.
    ///
    /// `build` produces the calls for one item; `decode` reads exactly those
    /// calls' values back into a typed result.
    pub async fn round<I, T, B, D>(
        &self,
        label: &'static str,
        items: &[I],
        batch_size: usize,
        build: B,
        decode: D,
    ) -> Result<Vec<T>>
    where
        I: Sync,
        T: Send,
        B: Fn(&I) -> Vec<Call> + Sync,
        D: Fn(&I, &mut Values<'_>) -> Result<T> + Sync,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = batch_size.max(1);
        let batches = items.len().div_ceil(batch_size);
        debug!(label, items = items.len(), batches, "starting round");

        let build = &build;
        let decode = &decode;
        let results: Vec<Vec<T>> = stream::iter(items.chunks(batch_size).enumerate())
            .map(|(i, chunk)| self.run_batch(label, i, chunk, build, decode))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn run_batch<I, T, B, D>(
        &self,
        label: &'static str,
        batch: usize,
        chunk: &[I],
        build: &B,
        decode: &D,
    ) -> Result<Vec<T>>
    where
        B: Fn(&I) -> Vec<Call>,
        D: Fn(&I, &mut Values<'_>) -> Result<T>,
    {
        let mut calls = Vec::new();
        let mut spans = Vec::with_capacity(chunk.len());
        for item in chunk {
            let item_calls = build(item);
            spans.push((calls.len(), item_calls.len()));
            calls.extend(item_calls);
        }

        let query = || format!("{label} batch {batch} (first call {})", describe(&calls));
        let values = self.execute(&calls, query).await?;
        if values.len() != calls.len() {
            return Err(StateError::ResponseLength {
                query: query(),
                expected: calls.len(),
                got: values.len(),
            });
        }

        chunk
            .iter()
            .zip(spans)
            .map(|(item, (start, len))| {
                let mut cursor = Values::new(&calls[start..start + len], &values[start..start + len]);
                decode(item, &mut cursor)
            })
            .collect()
    }

    async fn execute<Q: Fn() -> String>(&self, calls: &[Call], query: Q) -> Result<Vec<Value>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        match timeout(self.deadline, self.reader.multicall(self.block, calls)).await {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(source)) => {
                warn!(query = %query(), error = %source, "batch read failed");
                Err(StateError::RemoteRead {
                    query: query(),
                    source,
                })
            }
            Err(_) => {
                warn!(query = %query(), secs = self.deadline.as_secs(), "batch read timed out");
                Err(StateError::Timeout {
                    query: query(),
                    secs: self.deadline.as_secs(),
                })
            }
        }
    }

    /// One single-value read with the same deadline as a batch.
    pub async fn single(&self, call: Call) -> Result<Value> {
        match timeout(self.deadline, self.reader.call(self.block, &call)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StateError::RemoteRead {
                query: call.to_string(),
                source,
            }),
            Err(_) => Err(StateError::Timeout {
                query: call.to_string(),
                secs: self.deadline.as_secs(),
            }),
        }
    }

    /// Native-currency balances in `batch_size` chunks.
    pub async fn balances(&self, addresses: &[Address], batch_size: usize) -> Result<Vec<Uint256>> {
        let batch_size = batch_size.max(1);
        let results: Vec<Vec<Uint256>> = stream::iter(addresses.chunks(batch_size).enumerate())
            .map(|(i, chunk)| async move {
                let query = format!("balances batch {i}");
                let balances = match timeout(self.deadline, self.reader.balances(self.block, chunk)).await {
                    Ok(Ok(b)) => b,
                    Ok(Err(source)) => return Err(StateError::RemoteRead { query, source }),
                    Err(_) => {
                        return Err(StateError::Timeout {
                            query,
                            secs: self.deadline.as_secs(),
                        })
                    }
                };
                if balances.len() != chunk.len() {
                    return Err(StateError::ResponseLength {
                        query,
                        expected: chunk.len(),
                        got: balances.len(),
                    });
                }
                Ok(balances)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(results.into_iter().flatten().collect())
    }
}

fn describe(calls: &[Call]) -> String {
    calls
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// Decode a single read as a uint.
pub fn expect_uint(call: &Call, value: Value) -> Result<Uint256> {
    match value {
        Value::Uint(v) => Ok(v),
        other => Err(StateError::UnexpectedValue {
            query: call.to_string(),
            expected: "uint",
            got: other.kind().to_string(),
        }),
    }
}

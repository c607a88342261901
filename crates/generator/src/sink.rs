//! Artifact persistence.
//!
//! A generation run produces up to three artifacts. They are handed to the
//! sink together, once, after everything else has succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{GeneratorError, Result};

/// One named output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// `rewards-<chain>-<index>.<ext>`
pub fn rewards_file_name(chain_id: u64, index: u64, ext: &str) -> String {
    format!("rewards-{chain_id}-{index}.{ext}")
}

/// `voting-power-<chain>-<index>.json`
pub fn voting_power_file_name(chain_id: u64, index: u64) -> String {
    format!("voting-power-{chain_id}-{index}.json")
}

/// Destination for generated artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist every artifact or none of them. Returns where they landed.
    async fn write(&self, artifacts: &[Artifact]) -> Result<Vec<PathBuf>>;
}

// ─── Filesystem ─────────────────────────────────────────────────────────────

/// Writes artifacts into a directory.
///
/// Every artifact is written to a temporary sibling first and only renamed
/// into place once all of them are on disk.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!(".{name}.tmp"))
    }

    async fn cleanup(paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "failed to remove file");
            }
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> GeneratorError {
    GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ArtifactSink for FileSink {
    async fn write(&self, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let mut temps = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let temp = self.temp_path(&artifact.name);
            if let Err(e) = tokio::fs::write(&temp, &artifact.bytes).await {
                temps.push(temp.clone());
                Self::cleanup(&temps).await;
                return Err(io_error(&temp, e));
            }
            temps.push(temp);
        }

        let mut written = Vec::with_capacity(artifacts.len());
        for (i, artifact) in artifacts.iter().enumerate() {
            let path = self.dir.join(&artifact.name);
            if let Err(e) = tokio::fs::rename(&temps[i], &path).await {
                // roll back what already landed so no partial set survives
                Self::cleanup(&written).await;
                Self::cleanup(&temps[i..]).await;
                return Err(io_error(&path, e));
            }
            written.push(path);
        }
        for (path, artifact) in written.iter().zip(artifacts) {
            info!(path = %path.display(), bytes = artifact.bytes.len(), "wrote artifact");
        }
        Ok(written)
    }
}

// ─── In memory ──────────────────────────────────────────────────────────────

/// Records artifacts instead of persisting them.
#[derive(Default)]
pub struct MemorySink {
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&self, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
        let mut stored = self.artifacts.lock().unwrap_or_else(|e| e.into_inner());
        for artifact in artifacts {
            info!(name = %artifact.name, bytes = artifact.bytes.len(), "recorded artifact");
            stored.insert(artifact.name.clone(), artifact.bytes.clone());
        }
        Ok(artifacts.iter().map(|a| PathBuf::from(&a.name)).collect())
    }
}

//! Rewards Tree Settings
//!
//! JSON config file management. A service defines its own config type and
//! uses `Settings<T>` to load and persist it under the platform config
//! directory.

pub mod dirs;

pub use dirs::{config_dir_for, default_settings_path, override_var};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("failed to encode settings: {0}")]
    Encode(String),
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// A config value together with the file it lives in.
///
/// ```ignore
/// let settings: Settings<GeneratorConfig> = Settings::load_or_default("rewardtree", None)?;
/// ```
#[derive(Debug)]
pub struct Settings<T> {
    pub config: T,
    path: PathBuf,
}

impl<T: Serialize + DeserializeOwned + Default> Settings<T> {
    /// Load settings for `service`, writing defaults when no file exists.
    ///
    /// Fields missing from an existing file take the type's serde defaults.
    pub fn load_or_default(service: &str, custom_path: Option<&Path>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => p.to_path_buf(),
            None => default_settings_path(service),
        };

        if path.exists() {
            Self::load(&path)
        } else {
            debug!(path = %path.display(), "creating default settings");
            let settings = Self {
                config: T::default(),
                path,
            };
            settings.save()?;
            Ok(settings)
        }
    }

    /// Load settings from an existing file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading settings");
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: T = serde_json::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            config,
            path: path.to_path_buf(),
        })
    }

    /// Write the current settings to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content =
            serde_json::to_string_pretty(&self.config).map_err(|e| SettingsError::Encode(e.to_string()))?;
        fs::write(&self.path, content).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

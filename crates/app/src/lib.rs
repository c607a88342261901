//! Rewards Tree App
//!
//! Unified start-up for services built on the generator: logging, settings
//! and a startup banner, then wiring of the generator from the loaded config.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::info;

use rewardtree_generator::{BeaconReader, FileSink, GeneratorConfig, TreeGenerator};
use rewardtree_logging::{LogLevel, LoggingError};
use rewardtree_settings::{Settings, SettingsError};
use rewardtree_state::ChainReader;

/// Default service name, used for the config directory.
pub const SERVICE: &str = "rewardtree";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// Initialised application context.
#[derive(Debug)]
pub struct App<T> {
    pub service: String,
    pub settings: Settings<T>,
}

impl<T> App<T> {
    pub fn config(&self) -> &T {
        &self.settings.config
    }
}

impl App<GeneratorConfig> {
    /// A generator writing into the configured output directory.
    pub fn tree_generator(
        &self,
        reader: Arc<dyn ChainReader>,
        beacon: Arc<dyn BeaconReader>,
    ) -> TreeGenerator {
        let config = self.settings.config.clone();
        let sink = Arc::new(FileSink::new(config.output_dir.clone()));
        TreeGenerator::new(reader, beacon, sink, config)
    }
}

/// Builder for an [`App`].
pub struct AppBuilder<T> {
    service: String,
    log_level: LogLevel,
    skip_logging: bool,
    skip_banner: bool,
    config_path: Option<PathBuf>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned + Default> AppBuilder<T> {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            log_level: LogLevel::Info,
            skip_logging: false,
            skip_banner: false,
            config_path: None,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.log_level = LogLevel::from_verbose(verbose);
        self
    }

    pub fn skip_logging(mut self) -> Self {
        self.skip_logging = true;
        self
    }

    pub fn skip_banner(mut self) -> Self {
        self.skip_banner = true;
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<App<T>, AppError> {
        if !self.skip_logging {
            match rewardtree_logging::try_init(self.log_level) {
                // Embedding hosts may already own the subscriber.
                Ok(()) | Err(LoggingError::AlreadyInitialized) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let settings = Settings::load_or_default(&self.service, self.config_path.as_deref())?;

        if !self.skip_banner {
            info!(
                service = %self.service,
                version = env!("CARGO_PKG_VERSION"),
                settings = %settings.path().display(),
                level = %self.log_level,
                "starting"
            );
        }

        Ok(App {
            service: self.service,
            settings,
        })
    }
}

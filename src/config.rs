//! Configuration module.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Collection engine settings (interval, fallback storage range, filters)
//! - Chest linking and upgrade limits
//! - Database backend selection (SQLite file or MySQL server)
//! - Player-facing messages
//!
//! The live configuration is published through a [`ConfigHandle`]; the
//! registry and engine hold receivers and read the current value on every
//! operation, so a reload takes effect without restarting anything.

mod app;
mod messages;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

pub use app::{
    AppConfig, ChestLinkingConfig, CollectionConfig, CostType, DEFAULT_INTERVAL_TICKS,
    DEFAULT_POOL_SIZE, DEFAULT_STORAGE_RANGE, DEFAULT_TICK_INTERVAL, DatabaseConfig,
    DatabaseDriver, MysqlConfig, SqliteConfig, UpgradeConfig, UpgradesConfig,
};
pub use messages::{MessageKey, MessagesConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration, validate_table_prefix};

/// Owner of the live configuration.
#[derive(Debug)]
pub struct ConfigHandle {
    path: Option<PathBuf>,
    tx: watch::Sender<Arc<AppConfig>>,
}

impl ConfigHandle {
    /// Publish `config`; `path` is re-read by [`reload`](Self::reload).
    pub fn new(config: AppConfig, path: Option<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self { path, tx }
    }

    /// Load from a file and remember the path for reloads.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = AppConfig::load(&path)?;
        Ok(Self::new(config, Some(path)))
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppConfig>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Arc<AppConfig> {
        self.tx.borrow().clone()
    }

    /// Validate and publish a new configuration.
    pub fn replace(&self, config: AppConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.tx.send_replace(Arc::new(config));
        Ok(())
    }

    /// Re-read the configuration file and publish it.
    ///
    /// On failure the previous configuration stays in effect.
    pub fn reload(&self) -> Result<Arc<AppConfig>, ConfigError> {
        let path = self.path.as_ref().ok_or_else(|| {
            ConfigError::ValidationError("no configuration file to reload".to_string())
        })?;
        let config = Arc::new(AppConfig::load(path)?);
        self.tx.send_replace(config.clone());
        tracing::info!(path = %path.display(), "Configuration reloaded");
        Ok(config)
    }
}

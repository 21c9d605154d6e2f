//! Storage builder.
//!
//! Selects and constructs the configured backend. Nothing connects here;
//! the registry calls [`CollectorStore::initialize`] when it opens.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};
use crate::storage::StorageError;
use crate::storage::collector_store::CollectorStore;
use crate::storage::db::{MysqlStore, SqliteStore};

/// Builder for constructing the persistence backend.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    config: DatabaseConfig,
    base_dir: Option<PathBuf>,
}

impl StorageBuilder {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            base_dir: None,
        }
    }

    /// Override the configured driver.
    pub fn driver(mut self, driver: DatabaseDriver) -> Self {
        self.config.driver = driver;
        self
    }

    /// Directory that a relative SQLite file path is resolved against.
    pub fn base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the connection pool size.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Resolved SQLite file path.
    pub fn sqlite_path(&self) -> PathBuf {
        let file = Path::new(&self.config.sqlite.file);
        match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }

    /// Build the backend selected by the configuration.
    pub fn build(self) -> Result<Arc<dyn CollectorStore>, StorageError> {
        let store: Arc<dyn CollectorStore> = match self.config.driver {
            DatabaseDriver::Sqlite => {
                let path = self.sqlite_path();
                tracing::debug!(path = %path.display(), "Using SQLite collector store");
                Arc::new(SqliteStore::new(path, self.config.pool_size))
            }
            DatabaseDriver::Mysql => {
                tracing::debug!(host = %self.config.mysql.host, "Using MySQL collector store");
                Arc::new(MysqlStore::new(
                    self.config.mysql.clone(),
                    self.config.pool_size,
                )?)
            }
        };
        Ok(store)
    }
}

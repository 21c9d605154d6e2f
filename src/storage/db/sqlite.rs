//! SQLite backend implementation using sqlx.
//!
//! Provides connection pooling and the file-embedded [`CollectorStore`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Sqlite;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool as SqlxPool, SqlitePoolOptions,
    SqliteSynchronous,
};
use tokio::sync::OnceCell;

use crate::config::DatabaseDriver;
use crate::model::{CollectorId, CollectorRecord};
use crate::storage::StorageError;
use crate::storage::collector_store::{
    CollectorRow, CollectorStore, FilterRow, LinkRow, assemble, child_deletes, record_writes,
};
use crate::storage::schema::Statements;
use crate::world::WorldLookup;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite connection pool wrapper.
///
/// Wraps sqlx's SqlitePool with sensible defaults for WAL mode and connection pooling.
#[derive(Clone)]
pub struct SqlitePool {
    inner: SqlxPool,
}

impl std::fmt::Debug for SqlitePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePool").finish_non_exhaustive()
    }
}

impl SqlitePool {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect_with(options, max_connections).await
    }

    /// # Configuration
    ///
    /// - WAL journal mode for better concurrency
    /// - Normal synchronous mode for performance with durability
    /// - Foreign keys enforced so child rows cascade
    async fn connect_with(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, StorageError> {
        let options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(DEFAULT_CONNECT_TIMEOUT)
            .connect_with(options)
            .await?;

        Ok(Self { inner: pool })
    }

    /// Get the underlying sqlx pool for direct query execution.
    #[inline]
    pub fn inner(&self) -> &SqlxPool {
        &self.inner
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.inner.close().await;
    }

    /// Check if the pool is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

// =============================================================================
// Store
// =============================================================================

/// File-embedded collector store.
pub struct SqliteStore {
    path: PathBuf,
    pool_size: u32,
    sql: Statements,
    pool: OnceCell<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("initialized", &self.pool.initialized())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, pool_size: u32) -> Self {
        Self {
            path: path.into(),
            pool_size,
            sql: Statements::new(DatabaseDriver::Sqlite, ""),
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pool(&self) -> Result<&SqlitePool, StorageError> {
        self.pool.get().ok_or(StorageError::NotInitialized)
    }
}

#[async_trait]
impl CollectorStore for SqliteStore {
    fn backend(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool = self
            .pool
            .get_or_try_init(|| SqlitePool::open(&self.path, self.pool_size))
            .await?;

        for ddl in &self.sql.create_tables {
            sqlx::query(ddl).execute(pool.inner()).await?;
        }

        tracing::info!(path = %self.path.display(), "SQLite collector store initialized");
        Ok(())
    }

    async fn load_all(
        &self,
        worlds: &dyn WorldLookup,
    ) -> Result<HashMap<CollectorId, CollectorRecord>, StorageError> {
        let pool = self.pool()?.inner();

        let collectors: Vec<CollectorRow> = sqlx::query_as(&self.sql.select_collectors)
            .fetch_all(pool)
            .await?;
        let filters: Vec<FilterRow> = sqlx::query_as(&self.sql.select_filters)
            .fetch_all(pool)
            .await?;
        let links: Vec<LinkRow> = sqlx::query_as(&self.sql.select_links)
            .fetch_all(pool)
            .await?;

        let records = assemble(collectors, filters, links, worlds);
        tracing::info!(count = records.len(), "Loaded collectors from SQLite");
        Ok(records)
    }

    async fn save_all(
        &self,
        records: &HashMap<CollectorId, CollectorRecord>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool()?.inner().begin().await?;

        sqlx::query(&self.sql.delete_all_links)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&self.sql.delete_all_filters)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&self.sql.delete_all_collectors)
            .execute(&mut *tx)
            .await?;

        for (id, record) in records {
            for query in record_writes::<Sqlite>(&self.sql, *id, record) {
                query.execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        tracing::debug!(count = records.len(), "Saved all collectors");
        Ok(())
    }

    async fn save_one(
        &self,
        id: CollectorId,
        record: &CollectorRecord,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool()?.inner().begin().await?;
        for query in child_deletes::<Sqlite>(&self.sql, id)
            .into_iter()
            .chain(record_writes::<Sqlite>(&self.sql, id, record))
        {
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::debug!(collector = %id, "Saved collector");
        Ok(())
    }

    async fn delete(&self, id: CollectorId) -> Result<(), StorageError> {
        let mut tx = self.pool()?.inner().begin().await?;
        for query in child_deletes::<Sqlite>(&self.sql, id) {
            query.execute(&mut *tx).await?;
        }
        sqlx::query(&self.sql.delete_collector)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!(collector = %id, "Deleted collector");
        Ok(())
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.get()
            && !pool.is_closed()
        {
            pool.close().await;
            tracing::info!("SQLite collector store closed");
        }
    }
}

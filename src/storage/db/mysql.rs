//! MySQL backend implementation using sqlx.
//!
//! Same logical schema as SQLite, with every table qualified by the
//! configured prefix so several deployments can share one database.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::MySql;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool as SqlxPool, MySqlPoolOptions};
use tokio::sync::OnceCell;

use crate::config::{DatabaseDriver, MysqlConfig, validate_table_prefix};
use crate::model::{CollectorId, CollectorRecord};
use crate::storage::StorageError;
use crate::storage::collector_store::{
    CollectorRow, CollectorStore, FilterRow, LinkRow, assemble, child_deletes, record_writes,
};
use crate::storage::schema::Statements;
use crate::world::WorldLookup;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-server collector store.
pub struct MysqlStore {
    config: MysqlConfig,
    pool_size: u32,
    sql: Statements,
    pool: OnceCell<SqlxPool>,
}

impl std::fmt::Debug for MysqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlStore")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("table_prefix", &self.config.table_prefix)
            .field("initialized", &self.pool.initialized())
            .finish_non_exhaustive()
    }
}

impl MysqlStore {
    /// Create an unconnected store. Fails if the table prefix is unsafe.
    pub fn new(config: MysqlConfig, pool_size: u32) -> Result<Self, StorageError> {
        validate_table_prefix(&config.table_prefix)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let sql = Statements::new(DatabaseDriver::Mysql, &config.table_prefix);
        Ok(Self {
            config,
            pool_size,
            sql,
            pool: OnceCell::new(),
        })
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.resolved_username())
            .password(&self.config.resolved_password())
    }

    async fn connect(&self) -> Result<SqlxPool, StorageError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.pool_size.max(1))
            .acquire_timeout(DEFAULT_CONNECT_TIMEOUT)
            .connect_with(self.connect_options())
            .await?;
        Ok(pool)
    }

    fn pool(&self) -> Result<&SqlxPool, StorageError> {
        self.pool.get().ok_or(StorageError::NotInitialized)
    }
}

#[async_trait]
impl CollectorStore for MysqlStore {
    fn backend(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        let pool = self.pool.get_or_try_init(|| self.connect()).await?;

        for ddl in &self.sql.create_tables {
            sqlx::query(ddl).execute(pool).await?;
        }

        tracing::info!(
            host = %self.config.host,
            database = %self.config.database,
            prefix = %self.config.table_prefix,
            "MySQL collector store initialized"
        );
        Ok(())
    }

    async fn load_all(
        &self,
        worlds: &dyn WorldLookup,
    ) -> Result<HashMap<CollectorId, CollectorRecord>, StorageError> {
        let pool = self.pool()?;

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
        tracing::info!(count = records.len(), "Loaded collectors from MySQL");
        Ok(records)
    }

    async fn save_all(
        &self,
        records: &HashMap<CollectorId, CollectorRecord>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool()?.begin().await?;

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
            for query in record_writes::<MySql>(&self.sql, *id, record) {
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
        let mut tx = self.pool()?.begin().await?;
        for query in child_deletes::<MySql>(&self.sql, id)
            .into_iter()
            .chain(record_writes::<MySql>(&self.sql, id, record))
        {
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        tracing::debug!(collector = %id, "Saved collector");
        Ok(())
    }

    async fn delete(&self, id: CollectorId) -> Result<(), StorageError> {
        let mut tx = self.pool()?.begin().await?;
        for query in child_deletes::<MySql>(&self.sql, id) {
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
            tracing::info!("MySQL collector store closed");
        }
    }
}

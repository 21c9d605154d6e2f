//! Database backends.
//!
//! - [`SqliteStore`]: file-embedded store on a WAL-mode `SqlitePool`
//! - [`MysqlStore`]: client-server store with prefixed table names
//!
//! Both implement [`CollectorStore`](crate::storage::CollectorStore) and
//! issue the statements rendered by the schema module for their dialect.

mod mysql;
mod sqlite;

pub use mysql::MysqlStore;
pub use sqlite::{SqlitePool, SqliteStore};

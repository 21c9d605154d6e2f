//! Storage Layer
//!
//! Durable store for collector records behind the [`CollectorStore`]
//! contract, with two interchangeable backends:
//!
//! - [`SqliteStore`]: embedded file database (WAL mode)
//! - [`MysqlStore`]: client-server database with prefixed tables
//!
//! # Components
//!
//! - [`CollectorStore`]: initialize / load / full save / single save / delete / close
//! - [`StorageBuilder`]: picks the backend from [`DatabaseConfig`](crate::config::DatabaseConfig)
//! - [`StorageError`]: error type for every storage operation

mod builder;
pub mod collector_store;
pub mod db;
mod error;
mod schema;

pub use builder::StorageBuilder;
pub use collector_store::CollectorStore;
pub use db::{MysqlStore, SqlitePool, SqliteStore};
pub use error::StorageError;
pub use schema::{Statements, TableNames};

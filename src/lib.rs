//! Harvest - Automated Resource Collection
//!
//! Placed collector blocks periodically sweep their surroundings for
//! free-floating resource objects, filter them and route them into linked
//! containers. State survives restarts through an SQLite or MySQL backend.
//!
//! # Architecture
//!
//! - **World**: host collaborator trait plus an in-memory host
//! - **Collector**: registry of collector records and the tick-driven engine
//! - **Storage**: persistence contract with SQLite and MySQL backends
//! - **Command / Listener**: boundary adapters for commands and block events
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use harvest::{CollectionEngine, CollectorRegistry, ConfigHandle, MemoryWorld, StorageBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigHandle::load("configs/config.yaml")?;
//!     let store = StorageBuilder::new(config.current().database.clone()).build()?;
//!     let world = Arc::new(MemoryWorld::new(["world"]));
//!     let registry = Arc::new(CollectorRegistry::open(store, world, config.subscribe()).await);
//!
//!     CollectionEngine::new(registry.clone())
//!         .run(None, async { tokio::signal::ctrl_c().await.ok(); })
//!         .await;
//!     registry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod collector;
pub mod command;
pub mod config;
pub mod listener;
pub mod model;
pub mod storage;
pub mod world;

pub use actor::{Actor, Permission};
pub use collector::{CollectionEngine, CollectorRegistry, EngineStats};
pub use command::{CommandHandler, CommandOutput};
pub use config::{AppConfig, ConfigError, ConfigHandle};
pub use listener::{BlockListener, EventOutcome};
pub use model::{BlockPos, CollectorId, CollectorRecord, ItemStack, ResourceType};
pub use storage::{CollectorStore, StorageBuilder, StorageError};
pub use world::{MemoryWorld, World, WorldError};

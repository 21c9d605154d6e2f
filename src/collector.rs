//! Collector Layer
//!
//! Authoritative collector state and the heartbeat that services it.
//!
//! # Architecture
//!
//! - [`CollectorRegistry`]: records, position indexes, link sessions,
//!   upgrades and filters, written through to a
//!   [`CollectorStore`](crate::storage::CollectorStore)
//! - [`CollectionEngine`]: per-tick scan, filter and deposit with a
//!   pending queue for stacks that did not fit
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use harvest::collector::{CollectionEngine, CollectorRegistry};
//! use harvest::config::ConfigHandle;
//! use harvest::storage::StorageBuilder;
//! use harvest::world::MemoryWorld;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigHandle::load("configs/config.yaml")?;
//! let store = StorageBuilder::new(config.current().database.clone()).build()?;
//! let world = Arc::new(MemoryWorld::new(config.current().worlds.clone()));
//! let registry = Arc::new(CollectorRegistry::open(store, world, config.subscribe()).await);
//!
//! let mut engine = CollectionEngine::new(registry.clone());
//! engine.run(Some(100), std::future::pending()).await;
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod engine;
mod registry;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CollectionEngine, EngineError, EngineStats, effective_interval};
pub use registry::{
    CollectorRegistry, CreateRejection, Created, LinkOutcome, UpgradeKind, UpgradeOutcome,
};

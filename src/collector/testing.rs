//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::actor::{Actor, Permission};
use crate::collector::CollectorRegistry;
use crate::config::{AppConfig, ConfigHandle, DatabaseDriver};
use crate::model::{CollectorId, CollectorRecord};
use crate::storage::{CollectorStore, StorageError};
use crate::world::{MemoryWorld, WorldLookup};

/// Store keeping records in memory, with switchable failures.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    records: Mutex<HashMap<CollectorId, CollectorRecord>>,
    save_all_calls: AtomicUsize,
    save_one_calls: AtomicUsize,
    fail_initialize: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn records(&self) -> HashMap<CollectorId, CollectorRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn save_all_calls(&self) -> usize {
        self.save_all_calls.load(Ordering::SeqCst)
    }

    pub fn save_one_calls(&self) -> usize {
        self.save_one_calls.load(Ordering::SeqCst)
    }

    pub fn fail_initialize(&self) {
        self.fail_initialize.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Internal("write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CollectorStore for MemoryStore {
    fn backend(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("unreachable backend".to_string()));
        }
        Ok(())
    }

    async fn load_all(
        &self,
        worlds: &dyn WorldLookup,
    ) -> Result<HashMap<CollectorId, CollectorRecord>, StorageError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|(_, r)| worlds.world_exists(&r.anchor().world))
            .collect())
    }

    async fn save_all(
        &self,
        records: &HashMap<CollectorId, CollectorRecord>,
    ) -> Result<(), StorageError> {
        self.save_all_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writes()?;
        *self.records.lock().unwrap() = records.clone();
        Ok(())
    }

    async fn save_one(
        &self,
        id: CollectorId,
        record: &CollectorRecord,
    ) -> Result<(), StorageError> {
        self.save_one_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writes()?;
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: CollectorId) -> Result<(), StorageError> {
        self.check_writes()?;
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn close(&self) {}
}

pub(crate) struct Fixture {
    pub world: Arc<MemoryWorld>,
    pub store: Arc<MemoryStore>,
    pub config: ConfigHandle,
    pub registry: Arc<CollectorRegistry>,
    pub owner: Actor,
}

/// Registry over a memory world and store, with one online player.
pub(crate) async fn fixture() -> Fixture {
    let world = Arc::new(MemoryWorld::new(["world"]));
    let store = Arc::new(MemoryStore::default());
    let config = ConfigHandle::new(AppConfig::default(), None);
    let registry = Arc::new(
        CollectorRegistry::open(store.clone(), world.clone(), config.subscribe()).await,
    );
    let id = world.add_player("Alex", "world");
    let owner = Actor::player(id, "Alex").with_permissions([Permission::Use]);
    Fixture {
        world,
        store,
        config,
        registry,
        owner,
    }
}

//! Collector registry: authoritative in-memory state for every collector.
//!
//! The registry owns the records, the anchor and container indexes that
//! bind physical positions to collector ids, and the per-actor link
//! sessions. Every mutation is written through to the [`CollectorStore`];
//! storage failures are logged and never undo in-memory changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::sync::{Mutex, RwLock, watch};

use crate::actor::{Actor, Permission};
use crate::config::{AppConfig, MessageKey};
use crate::model::{ActorId, BlockPos, CollectorId, CollectorRecord, ResourceType};
use crate::storage::{CollectorStore, StorageError};
use crate::world::World;

// =============================================================================
// Outcomes
// =============================================================================

/// Successful creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Created {
    pub id: CollectorId,
    /// Containers linked automatically during creation.
    pub auto_linked: usize,
}

/// Why a collector could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateRejection {
    /// The block cannot carry collector identity.
    NotATile,
    /// The block already anchors a collector.
    AlreadyCollector,
    /// The block is linked to another collector as a container.
    LinkedContainer,
    /// Another collector occupies the region and the actor cannot bypass it.
    RegionOccupied,
}

impl CreateRejection {
    /// Message shown to the actor. [`MessageKey::NotCollectorBlock`] takes a
    /// `%block%` placeholder.
    pub fn message_key(self) -> MessageKey {
        match self {
            Self::NotATile => MessageKey::NotCollectorBlock,
            Self::AlreadyCollector => MessageKey::AlreadyCollector,
            Self::LinkedContainer => MessageKey::ChestAlreadyLinked,
            Self::RegionOccupied => MessageKey::MaxCollectorsReached,
        }
    }
}

/// Result of linking a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    /// Linked to this or another collector already.
    AlreadyLinked,
    /// The collector is at its link capacity.
    Full,
    /// No inventory at the position, or it is a collector anchor.
    NotAContainer,
    UnknownCollector,
}

/// Upgrade tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UpgradeKind {
    Speed,
    Range,
}

/// Result of an upgrade attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// New level.
    Upgraded(u32),
    AtMaxLevel,
    UnknownCollector,
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    collectors: HashMap<CollectorId, CollectorRecord>,
    anchors: HashMap<BlockPos, CollectorId>,
    containers: HashMap<BlockPos, CollectorId>,
}

impl RegistryState {
    /// Build state and indexes from loaded records, dropping conflicts.
    /// Index loaded records. Levels above the configured maximum are clamped.
    fn from_records(records: HashMap<CollectorId, CollectorRecord>, config: &AppConfig) -> Self {
        let speed_max = config.upgrades.speed.max_level;
        let range_max = config.upgrades.range.max_level;
        let mut state = Self::default();
        for (id, mut record) in records {
            if let Some(other) = state.anchors.get(record.anchor()) {
                tracing::warn!(collector = %id, other = %other, anchor = %record.anchor(), "Skipping collector with duplicate anchor");
                continue;
            }
            if record.speed_level() > speed_max || record.range_level() > range_max {
                tracing::warn!(
                    collector = %id,
                    speed = record.speed_level(),
                    range = record.range_level(),
                    "Clamping collector levels to the configured maximum"
                );
                record.set_speed_level(record.speed_level().min(speed_max));
                record.set_range_level(record.range_level().min(range_max));
            }
            state.anchors.insert(record.anchor().clone(), id);
            state.collectors.insert(id, record);
        }

        let ids: Vec<CollectorId> = state.collectors.keys().copied().collect();
        for id in ids {
            let Some(record) = state.collectors.get_mut(&id) else {
                continue;
            };
            let links = record.linked_containers().to_vec();
            for pos in links {
                if state.containers.contains_key(&pos) || state.anchors.contains_key(&pos) {
                    tracing::warn!(collector = %id, container = %pos, "Dropping conflicting container link");
                    record.remove_link(&pos);
                } else {
                    state.containers.insert(pos, id);
                }
            }
        }
        state
    }

    fn region_occupied(&self, anchor: &BlockPos) -> bool {
        let region = anchor.region();
        self.collectors.values().any(|r| r.region() == &region)
    }

    fn link(&mut self, world: &dyn World, id: CollectorId, pos: BlockPos) -> LinkOutcome {
        if !world.block_kind(&pos).is_some_and(|k| k.is_container())
            || self.anchors.contains_key(&pos)
        {
            return LinkOutcome::NotAContainer;
        }
        if self.containers.contains_key(&pos) {
            return LinkOutcome::AlreadyLinked;
        }
        let Some(record) = self.collectors.get_mut(&id) else {
            return LinkOutcome::UnknownCollector;
        };
        if record.is_full() {
            return LinkOutcome::Full;
        }
        if !record.push_link(pos.clone()) {
            return LinkOutcome::AlreadyLinked;
        }
        self.containers.insert(pos, id);
        LinkOutcome::Linked
    }

    /// Link nearby chests to a collector that has no links yet.
    fn auto_link(&mut self, world: &dyn World, id: CollectorId, config: &AppConfig) -> usize {
        let Some(record) = self.collectors.get(&id) else {
            return 0;
        };
        if !record.linked_containers().is_empty() {
            return 0;
        }
        let cap = config
            .chest_linking
            .max_auto_linked
            .min(record.max_linked_containers()) as usize;
        let anchor = record.anchor().clone();

        let mut linked = 0;
        for pos in anchor.cube(config.collection.storage_range) {
            if linked >= cap {
                break;
            }
            if !world.block_kind(&pos).is_some_and(|k| k.is_storage_container()) {
                continue;
            }
            if self.link(world, id, pos) == LinkOutcome::Linked {
                linked += 1;
            }
        }
        linked
    }
}

/// Authoritative collector state with write-through persistence.
pub struct CollectorRegistry {
    state: RwLock<RegistryState>,
    sessions: RwLock<HashMap<ActorId, CollectorId>>,
    store: Arc<dyn CollectorStore>,
    persistent: AtomicBool,
    save_lock: Mutex<()>,
    world: Arc<dyn World>,
    config: watch::Receiver<Arc<AppConfig>>,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field(
                "collector_count",
                &self.state.try_read().map(|s| s.collectors.len()).unwrap_or(0),
            )
            .field("backend", &self.store.backend())
            .field("persistent", &self.is_persistent())
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    /// Create an empty registry. Persistence stays off until [`open`](Self::open).
    pub fn new(
        store: Arc<dyn CollectorStore>,
        world: Arc<dyn World>,
        config: watch::Receiver<Arc<AppConfig>>,
    ) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            sessions: RwLock::new(HashMap::new()),
            store,
            persistent: AtomicBool::new(false),
            save_lock: Mutex::new(()),
            world,
            config,
        }
    }

    /// Initialize the backend and load every stored collector.
    ///
    /// A backend that fails to initialize or load leaves the registry
    /// running in memory only.
    pub async fn open(
        store: Arc<dyn CollectorStore>,
        world: Arc<dyn World>,
        config: watch::Receiver<Arc<AppConfig>>,
    ) -> Self {
        let registry = Self::new(store, world, config);

        if let Err(e) = registry.store.initialize().await {
            tracing::error!(error = %e, backend = %registry.store.backend(), "Storage initialization failed, running without persistence");
            return registry;
        }

        match registry.store.load_all(&*registry.world).await {
            Ok(records) => {
                let state = RegistryState::from_records(records, &registry.config());
                tracing::info!(count = state.collectors.len(), "Collectors loaded");
                *registry.state.write().await = state;
                registry.persistent.store(true, Ordering::Release);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load collectors, running without persistence");
            }
        }
        registry
    }

    /// Whether writes reach the backend.
    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Acquire)
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.borrow().clone()
    }

    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    // --- Lifecycle ---

    /// Create a collector anchored at `anchor`, owned by `actor`.
    pub async fn create(&self, actor: &Actor, anchor: &BlockPos) -> Result<Created, CreateRejection> {
        if !self
            .world
            .block_kind(anchor)
            .is_some_and(|k| k.is_tile())
        {
            return Err(CreateRejection::NotATile);
        }

        let config = self.config();
        let created = {
            let mut state = self.state.write().await;
            if state.anchors.contains_key(anchor) {
                return Err(CreateRejection::AlreadyCollector);
            }
            if state.containers.contains_key(anchor) {
                return Err(CreateRejection::LinkedContainer);
            }
            if !actor.has(Permission::BypassLimit) && state.region_occupied(anchor) {
                return Err(CreateRejection::RegionOccupied);
            }

            let id = CollectorId::new();
            let record = CollectorRecord::new(
                actor.id,
                anchor.clone(),
                config.chest_linking.max_manual_linked,
            );
            state.collectors.insert(id, record);
            state.anchors.insert(anchor.clone(), id);

            let auto_linked = if config.chest_linking.auto_linking_enabled
                && config.chest_linking.auto_link_on_placement
            {
                state.auto_link(&*self.world, id, &config)
            } else {
                0
            };
            Created { id, auto_linked }
        };

        tracing::info!(
            collector = %created.id,
            owner = %actor.id,
            anchor = %anchor,
            auto_linked = created.auto_linked,
            "Collector created"
        );
        self.persist_all().await;
        Ok(created)
    }

    /// Remove the collector anchored at `anchor`.
    pub async fn remove(&self, anchor: &BlockPos) -> Option<CollectorId> {
        let id = {
            let mut state = self.state.write().await;
            let id = state.anchors.remove(anchor)?;
            if let Some(record) = state.collectors.remove(&id) {
                for pos in record.linked_containers() {
                    state.containers.remove(pos);
                }
            }
            id
        };
        self.sessions.write().await.retain(|_, target| *target != id);

        tracing::info!(collector = %id, anchor = %anchor, "Collector removed");
        self.persist_all().await;
        Some(id)
    }

    // --- Lookups ---

    pub async fn is_collector(&self, pos: &BlockPos) -> bool {
        self.state.read().await.anchors.contains_key(pos)
    }

    /// Id of the collector anchored at `pos`.
    pub async fn id_at(&self, pos: &BlockPos) -> Option<CollectorId> {
        self.state.read().await.anchors.get(pos).copied()
    }

    /// Record of the collector anchored at `pos`.
    pub async fn get(&self, pos: &BlockPos) -> Option<(CollectorId, CollectorRecord)> {
        let state = self.state.read().await;
        let id = *state.anchors.get(pos)?;
        state.collectors.get(&id).map(|r| (id, r.clone()))
    }

    pub async fn get_by_id(&self, id: CollectorId) -> Option<CollectorRecord> {
        self.state.read().await.collectors.get(&id).cloned()
    }

    /// Point-in-time copy of every record.
    pub async fn all(&self) -> HashMap<CollectorId, CollectorRecord> {
        self.state.read().await.collectors.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.collectors.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.collectors.is_empty()
    }

    // --- Container links ---

    /// Append `pos` to the collector's deposit targets.
    pub async fn link_container(&self, id: CollectorId, pos: &BlockPos) -> LinkOutcome {
        let outcome = self.state.write().await.link(&*self.world, id, pos.clone());
        if outcome == LinkOutcome::Linked {
            tracing::info!(collector = %id, container = %pos, "Container linked");
            self.persist_one(id).await;
        }
        outcome
    }

    /// Detach `pos` from whichever collector it is linked to.
    pub async fn unlink_container(&self, pos: &BlockPos) -> bool {
        let id = {
            let mut state = self.state.write().await;
            let Some(id) = state.containers.get(pos).copied() else {
                return false;
            };
            let removed = state
                .collectors
                .get_mut(&id)
                .is_some_and(|record| record.remove_link(pos));
            if !removed {
                return false;
            }
            state.containers.remove(pos);
            id
        };

        tracing::info!(collector = %id, container = %pos, "Container unlinked");
        self.persist_one(id).await;
        true
    }

    pub async fn is_container_linked(&self, pos: &BlockPos) -> bool {
        self.state.read().await.containers.contains_key(pos)
    }

    /// Id of the collector `pos` is linked to.
    pub async fn linked_owner_id(&self, pos: &BlockPos) -> Option<CollectorId> {
        self.state.read().await.containers.get(pos).copied()
    }

    // --- Link sessions ---

    pub async fn begin_linking(&self, actor: ActorId, id: CollectorId) {
        self.sessions.write().await.insert(actor, id);
    }

    /// Close the actor's session, returning its target.
    pub async fn end_linking(&self, actor: ActorId) -> Option<CollectorId> {
        self.sessions.write().await.remove(&actor)
    }

    pub async fn is_linking(&self, actor: ActorId) -> bool {
        self.sessions.read().await.contains_key(&actor)
    }

    pub async fn linking_target(&self, actor: ActorId) -> Option<CollectorId> {
        self.sessions.read().await.get(&actor).copied()
    }

    // --- Upgrades and filters ---

    /// Raise a level by one, up to the configured maximum.
    pub async fn upgrade(&self, id: CollectorId, kind: UpgradeKind) -> UpgradeOutcome {
        let config = self.config();
        let outcome = {
            let mut state = self.state.write().await;
            let Some(record) = state.collectors.get_mut(&id) else {
                return UpgradeOutcome::UnknownCollector;
            };
            let (current, max) = match kind {
                UpgradeKind::Speed => (record.speed_level(), config.upgrades.speed.max_level),
                UpgradeKind::Range => (record.range_level(), config.upgrades.range.max_level),
            };
            if current >= max {
                return UpgradeOutcome::AtMaxLevel;
            }
            let level = current + 1;
            match kind {
                UpgradeKind::Speed => record.set_speed_level(level),
                UpgradeKind::Range => record.set_range_level(level),
            }
            UpgradeOutcome::Upgraded(level)
        };

        tracing::info!(collector = %id, kind = %kind, outcome = ?outcome, "Collector upgraded");
        self.persist_one(id).await;
        outcome
    }

    /// Add a resource type to the filter set. False if unknown or present.
    pub async fn add_filter(&self, id: CollectorId, resource: ResourceType) -> bool {
        let added = self
            .state
            .write()
            .await
            .collectors
            .get_mut(&id)
            .is_some_and(|r| r.filters_mut().insert(resource));
        if added {
            self.persist_one(id).await;
        }
        added
    }

    pub async fn remove_filter(&self, id: CollectorId, resource: &ResourceType) -> bool {
        let removed = self
            .state
            .write()
            .await
            .collectors
            .get_mut(&id)
            .is_some_and(|r| r.filters_mut().remove(resource));
        if removed {
            self.persist_one(id).await;
        }
        removed
    }

    /// Empty the filter set. False if the collector is unknown.
    pub async fn clear_filters(&self, id: CollectorId) -> bool {
        let found = match self.state.write().await.collectors.get_mut(&id) {
            Some(record) => {
                record.filters_mut().clear();
                true
            }
            None => false,
        };
        if found {
            self.persist_one(id).await;
        }
        found
    }

    // --- Persistence ---

    /// Full save, returning the backend error.
    pub async fn save(&self) -> Result<(), StorageError> {
        if !self.is_persistent() {
            return Ok(());
        }
        let _guard = self.save_lock.lock().await;
        let snapshot = self.all().await;
        self.store.save_all(&snapshot).await
    }

    /// Final full save, then release the backend.
    pub async fn shutdown(&self) {
        if let Err(e) = self.save().await {
            tracing::error!(error = %e, "Final save failed");
        }
        self.store.close().await;
        tracing::info!("Collector registry shut down");
    }

    async fn persist_all(&self) {
        if let Err(e) = self.save().await {
            tracing::error!(error = %e, "Failed to save collectors");
        }
    }

    async fn persist_one(&self, id: CollectorId) {
        if !self.is_persistent() {
            return;
        }
        let _guard = self.save_lock.lock().await;
        let Some(record) = self.get_by_id(id).await else {
            return;
        };
        if let Err(e) = self.store.save_one(id, &record).await {
            tracing::error!(collector = %id, error = %e, "Failed to save collector");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::{Fixture, fixture};
    use crate::world::BlockKind;

    fn pos(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new("world", x, y, z)
    }

    async fn hopper_at(f: &Fixture, at: BlockPos) -> CollectorId {
        f.world.set_block(at.clone(), BlockKind::Hopper);
        f.registry.create(&f.owner, &at).await.unwrap().id
    }

    #[tokio::test]
    async fn test_create_requires_tile() {
        let f = fixture().await;
        assert_eq!(
            f.registry.create(&f.owner, &pos(0, 64, 0)).await,
            Err(CreateRejection::NotATile)
        );
        f.world.set_block(pos(0, 64, 0), BlockKind::Solid);
        assert_eq!(
            f.registry.create(&f.owner, &pos(0, 64, 0)).await,
            Err(CreateRejection::NotATile)
        );
        assert!(f.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_region_occupancy_and_bypass() {
        let f = fixture().await;
        hopper_at(&f, pos(1, 64, 1)).await;

        f.world.set_block(pos(5, 70, 5), BlockKind::Hopper);
        assert_eq!(
            f.registry.create(&f.owner, &pos(5, 70, 5)).await,
            Err(CreateRejection::RegionOccupied)
        );
        assert_eq!(f.registry.len().await, 1);

        let admin = f.owner.clone().with_permissions([Permission::BypassLimit]);
        assert!(f.registry.create(&admin, &pos(5, 70, 5)).await.is_ok());
        assert_eq!(f.registry.len().await, 2);

        // Neighbouring region is free.
        f.world.set_block(pos(16, 64, 0), BlockKind::Hopper);
        assert!(f.registry.create(&f.owner, &pos(16, 64, 0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_same_anchor_twice() {
        let f = fixture().await;
        let admin = f.owner.clone().with_permissions([Permission::BypassLimit]);
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        f.registry.create(&admin, &pos(0, 64, 0)).await.unwrap();
        assert_eq!(
            f.registry.create(&admin, &pos(0, 64, 0)).await,
            Err(CreateRejection::AlreadyCollector)
        );
    }

    #[tokio::test]
    async fn test_create_persists_full_snapshot() {
        let f = fixture().await;
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        assert_eq!(f.store.save_all_calls(), 1);
        assert!(f.store.records().contains_key(&id));
    }

    #[tokio::test]
    async fn test_auto_link_respects_caps() {
        let f = fixture().await;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        f.world.set_block(pos(2, 64, 0), BlockKind::TrappedChest);
        f.world.set_block(pos(0, 64, 1), BlockKind::Barrel);

        // Default cap is one.
        let created = {
            f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
            f.registry.create(&f.owner, &pos(0, 64, 0)).await.unwrap()
        };
        assert_eq!(created.auto_linked, 1);
        let record = f.registry.get_by_id(created.id).await.unwrap();
        // x is the outer loop: (1, 64, 0) comes before (2, 64, 0).
        assert_eq!(record.linked_containers(), &[pos(1, 64, 0)]);
        assert!(f.registry.is_container_linked(&pos(1, 64, 0)).await);
        assert_eq!(
            f.registry.linked_owner_id(&pos(1, 64, 0)).await,
            Some(created.id)
        );
    }

    #[tokio::test]
    async fn test_create_at_coordinate_edge() {
        let f = fixture().await;
        let anchor = pos(i32::MAX, 64, i32::MIN);
        f.world.set_block(pos(i32::MAX - 2, 64, i32::MIN), BlockKind::Chest);
        f.world.set_block(anchor.clone(), BlockKind::Hopper);

        let created = f.registry.create(&f.owner, &anchor).await.unwrap();
        assert_eq!(created.auto_linked, 1);
        assert!(f.registry.is_collector(&anchor).await);
        assert_eq!(
            f.registry.linked_owner_id(&pos(i32::MAX - 2, 64, i32::MIN)).await,
            Some(created.id)
        );
    }

    #[tokio::test]
    async fn test_auto_link_bounded_by_link_capacity() {
        let f = fixture().await;
        let mut config = (*f.config.current()).clone();
        config.chest_linking.max_auto_linked = 10;
        config.chest_linking.max_manual_linked = 2;
        f.config.replace(config).unwrap();

        for x in 1..=4 {
            f.world.set_block(pos(x, 64, 0), BlockKind::Chest);
        }
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        let record = f.registry.get_by_id(id).await.unwrap();
        assert_eq!(record.linked_containers().len(), 2);
        assert_eq!(record.max_linked_containers(), 2);
    }

    #[tokio::test]
    async fn test_auto_link_disabled() {
        let f = fixture().await;
        let mut config = (*f.config.current()).clone();
        config.chest_linking.auto_link_on_placement = false;
        f.config.replace(config).unwrap();

        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        let created = f.registry.create(&f.owner, &pos(0, 64, 0)).await.unwrap();
        assert_eq!(created.auto_linked, 0);
    }

    #[tokio::test]
    async fn test_auto_link_skips_already_linked_chest() {
        let f = fixture().await;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        hopper_at(&f, pos(0, 64, 0)).await;

        f.world.set_block(pos(2, 64, 0), BlockKind::Hopper);
        let admin = f.owner.clone().with_permissions([Permission::BypassLimit]);
        let second = f.registry.create(&admin, &pos(2, 64, 0)).await.unwrap();
        assert_eq!(second.auto_linked, 0);
    }

    #[tokio::test]
    async fn test_link_rules() {
        let f = fixture().await;
        let mut config = (*f.config.current()).clone();
        config.chest_linking.auto_linking_enabled = false;
        config.chest_linking.max_manual_linked = 2;
        f.config.replace(config).unwrap();

        let id = hopper_at(&f, pos(0, 64, 0)).await;
        for x in 1..=3 {
            f.world.set_block(pos(x, 64, 0), BlockKind::Chest);
        }
        f.world.set_block(pos(0, 65, 0), BlockKind::Solid);

        let r = &f.registry;
        assert_eq!(r.link_container(id, &pos(0, 65, 0)).await, LinkOutcome::NotAContainer);
        assert_eq!(r.link_container(id, &pos(0, 64, 0)).await, LinkOutcome::NotAContainer);
        assert_eq!(r.link_container(id, &pos(1, 64, 0)).await, LinkOutcome::Linked);
        assert_eq!(r.link_container(id, &pos(1, 64, 0)).await, LinkOutcome::AlreadyLinked);
        assert_eq!(r.link_container(id, &pos(2, 64, 0)).await, LinkOutcome::Linked);
        assert_eq!(r.link_container(id, &pos(3, 64, 0)).await, LinkOutcome::Full);
        assert_eq!(
            r.link_container(CollectorId::new(), &pos(3, 64, 0)).await,
            LinkOutcome::UnknownCollector
        );

        let record = r.get_by_id(id).await.unwrap();
        assert_eq!(record.linked_containers(), &[pos(1, 64, 0), pos(2, 64, 0)]);
        assert_eq!(f.store.save_one_calls(), 2);
    }

    #[tokio::test]
    async fn test_no_double_linking_across_collectors() {
        let f = fixture().await;
        let admin = f.owner.clone().with_permissions([Permission::BypassLimit]);
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        f.world.set_block(pos(4, 64, 0), BlockKind::Hopper);
        f.world.set_block(pos(2, 64, 0), BlockKind::Chest);

        let a = f.registry.create(&admin, &pos(0, 64, 0)).await.unwrap().id;
        let b = f.registry.create(&admin, &pos(4, 64, 0)).await.unwrap().id;

        assert_eq!(f.registry.linked_owner_id(&pos(2, 64, 0)).await, Some(a));
        assert_eq!(
            f.registry.link_container(b, &pos(2, 64, 0)).await,
            LinkOutcome::AlreadyLinked
        );
    }

    #[tokio::test]
    async fn test_unlink_is_idempotent() {
        let f = fixture().await;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        let id = hopper_at(&f, pos(0, 64, 0)).await;

        assert!(f.registry.unlink_container(&pos(1, 64, 0)).await);
        assert!(!f.registry.unlink_container(&pos(1, 64, 0)).await);
        assert!(!f.registry.is_container_linked(&pos(1, 64, 0)).await);
        assert!(f.registry.get_by_id(id).await.unwrap().linked_containers().is_empty());
    }

    #[tokio::test]
    async fn test_remove_clears_indexes_and_sessions() {
        let f = fixture().await;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        f.registry.begin_linking(f.owner.id, id).await;

        assert_eq!(f.registry.remove(&pos(0, 64, 0)).await, Some(id));
        assert_eq!(f.registry.remove(&pos(0, 64, 0)).await, None);
        assert!(!f.registry.is_collector(&pos(0, 64, 0)).await);
        assert!(!f.registry.is_container_linked(&pos(1, 64, 0)).await);
        assert!(!f.registry.is_linking(f.owner.id).await);
        assert!(f.store.records().is_empty());

        // The freed chest can be linked again.
        let again = hopper_at(&f, pos(0, 64, 0)).await;
        assert_eq!(f.registry.linked_owner_id(&pos(1, 64, 0)).await, Some(again));
    }

    #[tokio::test]
    async fn test_all_is_a_snapshot() {
        let f = fixture().await;
        hopper_at(&f, pos(0, 64, 0)).await;
        let snapshot = f.registry.all().await;
        f.registry.remove(&pos(0, 64, 0)).await;
        assert_eq!(snapshot.len(), 1);
        assert!(f.registry.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_lookups() {
        let f = fixture().await;
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        assert!(f.registry.is_collector(&pos(0, 64, 0)).await);
        assert_eq!(f.registry.id_at(&pos(0, 64, 0)).await, Some(id));
        let (found, record) = f.registry.get(&pos(0, 64, 0)).await.unwrap();
        assert_eq!(found, id);
        assert_eq!(record.owner(), f.owner.id);
        assert!(f.registry.get(&pos(9, 9, 9)).await.is_none());
    }

    #[tokio::test]
    async fn test_link_sessions() {
        let f = fixture().await;
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        assert!(!f.registry.is_linking(f.owner.id).await);
        f.registry.begin_linking(f.owner.id, id).await;
        assert!(f.registry.is_linking(f.owner.id).await);
        assert_eq!(f.registry.linking_target(f.owner.id).await, Some(id));
        assert_eq!(f.registry.end_linking(f.owner.id).await, Some(id));
        assert_eq!(f.registry.end_linking(f.owner.id).await, None);
    }

    #[tokio::test]
    async fn test_upgrade_until_max() {
        let f = fixture().await;
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        for level in 1..=3 {
            assert_eq!(
                f.registry.upgrade(id, UpgradeKind::Range).await,
                UpgradeOutcome::Upgraded(level)
            );
        }
        assert_eq!(
            f.registry.upgrade(id, UpgradeKind::Range).await,
            UpgradeOutcome::AtMaxLevel
        );
        assert_eq!(
            f.registry.upgrade(CollectorId::new(), UpgradeKind::Speed).await,
            UpgradeOutcome::UnknownCollector
        );
        let record = f.registry.get_by_id(id).await.unwrap();
        assert_eq!(record.range_level(), 3);
        assert_eq!(record.speed_level(), 0);
        assert_eq!(f.store.records()[&id].range_level(), 3);
    }

    #[tokio::test]
    async fn test_filters() {
        let f = fixture().await;
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        let stone: ResourceType = "STONE".parse().unwrap();

        assert!(f.registry.add_filter(id, stone.clone()).await);
        assert!(!f.registry.add_filter(id, stone.clone()).await);
        assert!(f.store.records()[&id].filters().contains(&stone));

        assert!(f.registry.remove_filter(id, &stone).await);
        assert!(!f.registry.remove_filter(id, &stone).await);

        f.registry.add_filter(id, stone).await;
        assert!(f.registry.clear_filters(id).await);
        assert!(f.registry.get_by_id(id).await.unwrap().filters().is_empty());
        assert!(!f.registry.clear_filters(CollectorId::new()).await);
    }

    #[tokio::test]
    async fn test_open_loads_and_rebuilds_indexes() {
        let f = fixture().await;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        let id = hopper_at(&f, pos(0, 64, 0)).await;

        let reopened =
            CollectorRegistry::open(f.store.clone(), f.world.clone(), f.config.subscribe()).await;
        assert!(reopened.is_persistent());
        assert_eq!(reopened.id_at(&pos(0, 64, 0)).await, Some(id));
        assert_eq!(reopened.linked_owner_id(&pos(1, 64, 0)).await, Some(id));
    }

    #[tokio::test]
    async fn test_open_clamps_levels_above_maximum() {
        let f = fixture().await;
        let id = CollectorId::new();
        let tampered = CollectorRecord::new(f.owner.id, pos(0, 64, 0), 3).with_levels(50, 2);
        f.store.save_one(id, &tampered).await.unwrap();

        let reopened =
            CollectorRegistry::open(f.store.clone(), f.world.clone(), f.config.subscribe()).await;
        let record = reopened.get_by_id(id).await.unwrap();
        let upgrades = &f.config.current().upgrades;
        assert_eq!(record.speed_level(), upgrades.speed.max_level);
        assert_eq!(record.range_level(), 2);
    }

    #[tokio::test]
    async fn test_failed_initialize_degrades_to_memory() {
        let f = fixture().await;
        f.store.fail_initialize();
        let registry =
            CollectorRegistry::open(f.store.clone(), f.world.clone(), f.config.subscribe()).await;
        assert!(!registry.is_persistent());

        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        assert!(registry.create(&f.owner, &pos(0, 64, 0)).await.is_ok());
        assert_eq!(registry.len().await, 1);
        assert_eq!(f.store.save_all_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_memory_state() {
        let f = fixture().await;
        f.store.fail_writes();
        let id = hopper_at(&f, pos(0, 64, 0)).await;
        assert!(f.registry.get_by_id(id).await.is_some());
        assert!(f.registry.save().await.is_err());
    }
}

//! Collection engine: the fixed-rate heartbeat that services collectors.
//!
//! Each tick the engine takes a snapshot of the registry and, for every
//! collector in an active region whose interval divides the tick number,
//! sweeps nearby resource objects into its containers. Stacks that do not
//! fit are kept in an engine-local pending queue and retried first on the
//! next service.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::collector::CollectorRegistry;
use crate::config::AppConfig;
use crate::model::{BlockPos, CollectorId, CollectorRecord, ItemStack};
use crate::world::{World, WorldError};

/// Service interval for a collector, in ticks. Never below one.
pub fn effective_interval(base_interval: u64, speed_level: u32) -> u64 {
    base_interval
        .saturating_sub(2 * u64::from(speed_level))
        .max(1)
}

/// Per-collector failures; each one skips that collector for the tick.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("world error: {0}")]
    World(#[from] WorldError),

    /// The anchor block no longer carries an inventory.
    #[error("anchor at {0} is gone")]
    AnchorMissing(BlockPos),
}

/// Counters for one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub tick: u64,
    /// Collectors that ran a collection pass.
    pub serviced: usize,
    /// Collectors skipped because their region is not active.
    pub inactive: usize,
    /// Resource objects taken from the world.
    pub collected: usize,
    /// Stacks fully placed into containers, backlog included.
    pub stored: usize,
    /// Stacks waiting in pending queues after the tick.
    pub pending: usize,
    pub failures: usize,
}

#[derive(Debug, Default)]
struct ServiceReport {
    collected: usize,
    stored: usize,
}

/// Heartbeat-driven collection engine.
#[derive(Debug)]
pub struct CollectionEngine {
    registry: Arc<CollectorRegistry>,
    pending: HashMap<CollectorId, Vec<ItemStack>>,
    ticks: u64,
}

impl CollectionEngine {
    pub fn new(registry: Arc<CollectorRegistry>) -> Self {
        Self {
            registry,
            pending: HashMap::new(),
            ticks: 0,
        }
    }

    /// Copy of a collector's pending queue.
    pub fn pending(&self, id: CollectorId) -> Vec<ItemStack> {
        self.pending.get(&id).cloned().unwrap_or_default()
    }

    /// Drop a collector's pending queue.
    pub fn forget(&mut self, id: CollectorId) -> Vec<ItemStack> {
        self.pending.remove(&id).unwrap_or_default()
    }

    /// Ticks run so far by [`run`](Self::run).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one heartbeat as tick number `current_tick`.
    pub async fn tick(&mut self, current_tick: u64) -> EngineStats {
        let snapshot = self.registry.all().await;
        self.pending.retain(|id, _| snapshot.contains_key(id));

        let config = self.registry.config();
        let world = Arc::clone(self.registry.world());
        let mut stats = EngineStats {
            tick: current_tick,
            ..Default::default()
        };

        for (id, record) in &snapshot {
            if !world.is_region_active(record.region()) {
                stats.inactive += 1;
                continue;
            }

            let interval = effective_interval(config.collection.interval_ticks, record.speed_level());
            if current_tick % interval != 0 {
                continue;
            }

            match self.service(&*world, &config, *id, record) {
                Ok(report) => {
                    stats.serviced += 1;
                    stats.collected += report.collected;
                    stats.stored += report.stored;
                }
                Err(e) => {
                    stats.failures += 1;
                    tracing::warn!(collector = %id, error = %e, "Skipping collector this tick");
                }
            }
        }

        stats.pending = self.pending.values().map(Vec::len).sum();
        if stats.collected > 0 || stats.failures > 0 {
            tracing::debug!(
                tick = current_tick,
                serviced = stats.serviced,
                collected = stats.collected,
                stored = stats.stored,
                pending = stats.pending,
                failures = stats.failures,
                "Tick complete"
            );
        }
        stats
    }

    /// Drive [`tick`](Self::tick) at the configured period until `shutdown`
    /// resolves or `max_ticks` heartbeats have run.
    pub async fn run(&mut self, max_ticks: Option<u64>, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut period = self.registry.config().collection.tick_interval;
        let mut heartbeat = tokio::time::interval(period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(period = ?period, "Collection engine started");

        loop {
            if max_ticks.is_some_and(|max| self.ticks >= max) {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Collection engine stopping");
                    break;
                }
                _ = heartbeat.tick() => {
                    self.ticks += 1;
                    let current = self.ticks;
                    self.tick(current).await;
                }
            }

            let configured = self.registry.config().collection.tick_interval;
            if configured != period {
                tracing::info!(old = ?period, new = ?configured, "Heartbeat period changed");
                period = configured;
                heartbeat = tokio::time::interval(period);
                heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }
        }

        tracing::info!(ticks = self.ticks, "Collection engine stopped");
    }

    fn service(
        &mut self,
        world: &dyn World,
        config: &AppConfig,
        id: CollectorId,
        record: &CollectorRecord,
    ) -> Result<ServiceReport, EngineError> {
        let anchor = record.anchor();
        if !world.block_kind(anchor).is_some_and(|k| k.is_tile()) {
            return Err(EngineError::AnchorMissing(anchor.clone()));
        }

        let items = if record.range_level() > 0 {
            world.items_near(anchor, record.range_level())?
        } else {
            world.items_in_region(record.region())?
        };
        let containers = resolve_containers(world, record, config.collection.storage_range);

        let mut report = ServiceReport::default();
        let queue = self.pending.entry(id).or_default();

        if !containers.is_empty() && !queue.is_empty() {
            let backlog = std::mem::take(queue);
            for stack in backlog {
                match deposit(world, &containers, stack) {
                    Some(rest) => queue.push(rest),
                    None => report.stored += 1,
                }
            }
        }

        let filters_enabled = config.collection.filters_enabled;
        for item in items {
            if !record.accepts(&item.stack.resource, filters_enabled) {
                continue;
            }
            if !world.remove_item(item.id) {
                continue;
            }
            report.collected += 1;

            let rest = if containers.is_empty() {
                Some(item.stack)
            } else {
                deposit(world, &containers, item.stack)
            };
            match rest {
                Some(rest) => queue.push(rest),
                None => report.stored += 1,
            }
        }

        if queue.is_empty() {
            self.pending.remove(&id);
        }
        Ok(report)
    }
}

/// Deposit targets in priority order.
///
/// Linked containers that still exist, in link order; when none remain, the
/// first container in the storage-range cube other than the anchor itself.
fn resolve_containers(world: &dyn World, record: &CollectorRecord, storage_range: u32) -> Vec<BlockPos> {
    let linked: Vec<BlockPos> = record
        .linked_containers()
        .iter()
        .filter(|pos| world.block_kind(pos).is_some_and(|k| k.is_container()))
        .cloned()
        .collect();
    if !linked.is_empty() {
        return linked;
    }

    let anchor = record.anchor();
    anchor
        .cube(storage_range)
        .filter(|pos| pos != anchor)
        .find(|pos| world.block_kind(pos).is_some_and(|k| k.is_container()))
        .into_iter()
        .collect()
}

/// Offer a stack to each container in turn, passing the remainder on.
fn deposit(world: &dyn World, containers: &[BlockPos], stack: ItemStack) -> Option<ItemStack> {
    let mut remaining = stack;
    for pos in containers {
        match world.insert_into_container(pos, remaining.clone()) {
            Ok(None) => return None,
            Ok(Some(rest)) => remaining = rest,
            Err(e) => {
                tracing::warn!(container = %pos, error = %e, "Container rejected deposit");
            }
        }
    }
    Some(remaining)
}

//! In-memory host world.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::model::{ActorId, BlockPos, ItemStack, MAX_STACK_SIZE, RegionPos, ResourceType};
use crate::world::{
    BlockKind, DroppedItem, EntityId, PLAYER_SLOT_COUNT, Player, World, WorldError, WorldLookup,
};

// =============================================================================
// Inventory
// =============================================================================

/// Fixed-size slot inventory with per-slot stacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
        }
    }

    /// Merge into matching stacks first, then fill empty slots.
    ///
    /// Returns the remainder that did not fit.
    pub fn insert(&mut self, mut stack: ItemStack) -> Option<ItemStack> {
        for existing in self.slots.iter_mut().flatten() {
            if stack.amount == 0 {
                break;
            }
            if existing.resource == stack.resource && existing.amount < MAX_STACK_SIZE {
                let moved = (MAX_STACK_SIZE - existing.amount).min(stack.amount);
                existing.amount += moved;
                stack.amount -= moved;
            }
        }

        for slot in self.slots.iter_mut().filter(|s| s.is_none()) {
            if stack.amount == 0 {
                break;
            }
            let moved = stack.amount.min(MAX_STACK_SIZE);
            *slot = Some(ItemStack::new(stack.resource.clone(), moved));
            stack.amount -= moved;
        }

        (stack.amount > 0).then_some(stack)
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    /// Total amount held of one resource type.
    pub fn count(&self, resource: &ResourceType) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| &s.resource == resource)
            .map(|s| s.amount)
            .sum()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

// =============================================================================
// World state
// =============================================================================

#[derive(Debug)]
struct PlayerState {
    name: String,
    world: String,
    coords: (f64, f64, f64),
    inventory: Inventory,
}

#[derive(Debug, Default)]
struct WorldState {
    worlds: HashSet<String>,
    blocks: HashMap<BlockPos, BlockKind>,
    inventories: HashMap<BlockPos, Inventory>,
    inactive_regions: HashSet<RegionPos>,
    items: BTreeMap<EntityId, DroppedItem>,
    next_entity: EntityId,
    players: HashMap<ActorId, PlayerState>,
}

/// Thread-safe in-memory world.
///
/// Every region is active unless explicitly deactivated. Item enumeration
/// returns entities in spawn order.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    state: Mutex<WorldState>,
}

impl MemoryWorld {
    /// Create a host that knows the given world names.
    pub fn new<I, S>(worlds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = WorldState {
            worlds: worlds.into_iter().map(Into::into).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_world(&self, name: impl Into<String>) {
        self.lock().worlds.insert(name.into());
    }

    pub fn remove_world(&self, name: &str) {
        self.lock().worlds.remove(name);
    }

    /// Place a block, replacing whatever was there (inventory included).
    pub fn set_block(&self, pos: BlockPos, kind: BlockKind) {
        let mut state = self.lock();
        state.inventories.remove(&pos);
        if kind.is_container() {
            state
                .inventories
                .insert(pos.clone(), Inventory::new(kind.slot_count()));
        }
        state.blocks.insert(pos, kind);
    }

    pub fn remove_block(&self, pos: &BlockPos) {
        let mut state = self.lock();
        state.blocks.remove(pos);
        state.inventories.remove(pos);
    }

    /// Snapshot of a container's inventory.
    pub fn inventory(&self, pos: &BlockPos) -> Option<Inventory> {
        self.lock().inventories.get(pos).cloned()
    }

    pub fn set_region_active(&self, region: RegionPos, active: bool) {
        let mut state = self.lock();
        if active {
            state.inactive_regions.remove(&region);
        } else {
            state.inactive_regions.insert(region);
        }
    }

    /// Drop a resource object into the world.
    pub fn spawn_item(&self, pos: BlockPos, stack: ItemStack) -> EntityId {
        let mut state = self.lock();
        state.next_entity += 1;
        let id = state.next_entity;
        state.items.insert(id, DroppedItem { id, pos, stack });
        id
    }

    /// All resource objects currently in the world.
    pub fn items(&self) -> Vec<DroppedItem> {
        self.lock().items.values().cloned().collect()
    }

    /// Register an online player standing at world spawn.
    pub fn add_player(&self, name: impl Into<String>, world: impl Into<String>) -> ActorId {
        let id = Uuid::new_v4();
        self.lock().players.insert(
            id,
            PlayerState {
                name: name.into(),
                world: world.into(),
                coords: (0.0, 0.0, 0.0),
                inventory: Inventory::new(PLAYER_SLOT_COUNT),
            },
        );
        id
    }

    pub fn player_position(&self, player: ActorId) -> Option<(String, (f64, f64, f64))> {
        self.lock()
            .players
            .get(&player)
            .map(|p| (p.world.clone(), p.coords))
    }

    pub fn player_inventory(&self, player: ActorId) -> Option<Inventory> {
        self.lock().players.get(&player).map(|p| p.inventory.clone())
    }

    fn ensure_world(state: &WorldState, name: &str) -> Result<(), WorldError> {
        if state.worlds.contains(name) {
            Ok(())
        } else {
            Err(WorldError::UnknownWorld(name.to_owned()))
        }
    }
}

impl WorldLookup for MemoryWorld {
    fn world_exists(&self, name: &str) -> bool {
        self.lock().worlds.contains(name)
    }
}

impl World for MemoryWorld {
    fn block_kind(&self, pos: &BlockPos) -> Option<BlockKind> {
        let state = self.lock();
        if !state.worlds.contains(&pos.world) {
            return None;
        }
        state.blocks.get(pos).copied()
    }

    fn is_region_active(&self, region: &RegionPos) -> bool {
        let state = self.lock();
        state.worlds.contains(&region.world) && !state.inactive_regions.contains(region)
    }

    fn items_in_region(&self, region: &RegionPos) -> Result<Vec<DroppedItem>, WorldError> {
        let state = self.lock();
        Self::ensure_world(&state, &region.world)?;
        Ok(state
            .items
            .values()
            .filter(|item| &item.pos.region() == region)
            .cloned()
            .collect())
    }

    fn items_near(&self, center: &BlockPos, radius: u32) -> Result<Vec<DroppedItem>, WorldError> {
        let state = self.lock();
        Self::ensure_world(&state, &center.world)?;
        Ok(state
            .items
            .values()
            .filter(|item| center.within_cube(&item.pos, radius))
            .cloned()
            .collect())
    }

    fn remove_item(&self, id: EntityId) -> bool {
        self.lock().items.remove(&id).is_some()
    }

    fn insert_into_container(
        &self,
        pos: &BlockPos,
        stack: ItemStack,
    ) -> Result<Option<ItemStack>, WorldError> {
        let mut state = self.lock();
        Self::ensure_world(&state, &pos.world)?;
        let inventory = state
            .inventories
            .get_mut(pos)
            .ok_or_else(|| WorldError::NotAContainer(pos.clone()))?;
        Ok(inventory.insert(stack))
    }

    fn find_player(&self, name: &str) -> Option<Player> {
        self.lock()
            .players
            .iter()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            .map(|(id, p)| Player {
                id: *id,
                name: p.name.clone(),
            })
    }

    fn teleport_player(
        &self,
        player: ActorId,
        world: &str,
        coords: (f64, f64, f64),
    ) -> Result<(), WorldError> {
        let mut state = self.lock();
        Self::ensure_world(&state, world)?;
        let p = state
            .players
            .get_mut(&player)
            .ok_or(WorldError::UnknownPlayer(player))?;
        p.world = world.to_owned();
        p.coords = coords;
        Ok(())
    }

    fn give_to_player(
        &self,
        player: ActorId,
        stack: ItemStack,
    ) -> Result<Option<ItemStack>, WorldError> {
        let mut state = self.lock();
        let p = state
            .players
            .get_mut(&player)
            .ok_or(WorldError::UnknownPlayer(player))?;
        Ok(p.inventory.insert(stack))
    }
}

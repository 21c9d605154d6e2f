//! Host world collaborator.
//!
//! The collection core never touches blocks, entities or inventories
//! directly; it goes through the [`World`] trait. [`MemoryWorld`] is an
//! in-process host used by the binary and the tests.
//!
//! # Block kinds
//!
//! - Tile-capable blocks carry an inventory and can anchor a collector.
//! - Storage containers (chests) are what auto-linking and link sessions accept.
//! - Any inventory block is a valid deposit target.

mod memory;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::model::{ActorId, BlockPos, ItemStack, RegionPos, ResourceType};

pub use memory::{Inventory, MemoryWorld};

/// Slots in a chest, trapped chest or barrel.
pub const CHEST_SLOT_COUNT: usize = 27;

/// Slots in a hopper.
pub const HOPPER_SLOT_COUNT: usize = 5;

/// Slots in a player inventory.
pub const PLAYER_SLOT_COUNT: usize = 36;

/// Free-floating resource object identifier.
pub type EntityId = u64;

/// Errors reported by host world operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The named world is not loaded.
    #[error("unknown world: {0}")]
    UnknownWorld(String),

    /// The block has no inventory.
    #[error("block at {0} is not a container")]
    NotAContainer(BlockPos),

    /// No online player with this identity.
    #[error("unknown player: {0}")]
    UnknownPlayer(ActorId),
}

/// Block classification as far as collectors care.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BlockKind {
    Chest,
    TrappedChest,
    Barrel,
    Hopper,
    /// Any block without an inventory.
    Solid,
}

impl BlockKind {
    /// Inventory size, zero for non-containers.
    pub fn slot_count(self) -> usize {
        match self {
            Self::Chest | Self::TrappedChest | Self::Barrel => CHEST_SLOT_COUNT,
            Self::Hopper => HOPPER_SLOT_COUNT,
            Self::Solid => 0,
        }
    }

    /// Whether the block can carry collector identity.
    pub fn is_tile(self) -> bool {
        self.slot_count() > 0
    }

    /// Whether the block exposes an inventory.
    pub fn is_container(self) -> bool {
        self.slot_count() > 0
    }

    /// Chest-type blocks accepted by auto-linking and link sessions.
    pub fn is_storage_container(self) -> bool {
        matches!(self, Self::Chest | Self::TrappedChest)
    }

    /// Item form of the block, handed out by the give command.
    pub fn item_type(self) -> ResourceType {
        ResourceType::from_block_name(self.as_ref())
    }
}

/// A resource object lying in the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedItem {
    pub id: EntityId,
    pub pos: BlockPos,
    pub stack: ItemStack,
}

/// Online player handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ActorId,
    pub name: String,
}

/// World-name resolution, used when restoring persisted records.
pub trait WorldLookup: Send + Sync {
    fn world_exists(&self, name: &str) -> bool;
}

/// Operations the collection core consumes from the host.
pub trait World: WorldLookup {
    /// Kind of the block at `pos`, `None` for air or unloaded worlds.
    fn block_kind(&self, pos: &BlockPos) -> Option<BlockKind>;

    /// Whether the region is currently simulated.
    fn is_region_active(&self, region: &RegionPos) -> bool;

    /// Resource objects physically inside `region`.
    fn items_in_region(&self, region: &RegionPos) -> Result<Vec<DroppedItem>, WorldError>;

    /// Resource objects inside the cube of `radius` around `center`.
    fn items_near(&self, center: &BlockPos, radius: u32) -> Result<Vec<DroppedItem>, WorldError>;

    /// Despawn a resource object. Returns false if it was already gone.
    fn remove_item(&self, id: EntityId) -> bool;

    /// Insert into a container, returning whatever did not fit.
    fn insert_into_container(
        &self,
        pos: &BlockPos,
        stack: ItemStack,
    ) -> Result<Option<ItemStack>, WorldError>;

    /// Resolve an online player by name (case-insensitive).
    fn find_player(&self, name: &str) -> Option<Player>;

    /// Move a player to the given world coordinates.
    fn teleport_player(
        &self,
        player: ActorId,
        world: &str,
        coords: (f64, f64, f64),
    ) -> Result<(), WorldError>;

    /// Add items to a player inventory, returning whatever did not fit.
    fn give_to_player(
        &self,
        player: ActorId,
        stack: ItemStack,
    ) -> Result<Option<ItemStack>, WorldError>;
}

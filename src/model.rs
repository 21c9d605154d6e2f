//! Shared data model.
//!
//! Block positions, regions, resource stacks and the [`CollectorRecord`]
//! owned by the registry.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Region (chunk) edge length is `1 << REGION_SHIFT` blocks.
pub const REGION_SHIFT: i32 = 4;

/// Maximum number of items a single stack (or slot) may hold.
pub const MAX_STACK_SIZE: u32 = 64;

/// Stable player identity.
pub type ActorId = Uuid;

// =============================================================================
// Positions
// =============================================================================

/// Integer block position inside a named world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// World name.
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The region (chunk column) this block belongs to.
    pub fn region(&self) -> RegionPos {
        RegionPos {
            world: self.world.clone(),
            x: self.x >> REGION_SHIFT,
            z: self.z >> REGION_SHIFT,
        }
    }

    /// Position shifted by the given deltas, in the same world.
    ///
    /// `None` if any coordinate leaves the `i32` range.
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self::new(
            self.world.clone(),
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    /// True if `other` lies in the same world within a cube of `radius`.
    pub fn within_cube(&self, other: &BlockPos, radius: u32) -> bool {
        let r = i64::from(radius);
        self.world == other.world
            && (i64::from(self.x) - i64::from(other.x)).abs() <= r
            && (i64::from(self.y) - i64::from(other.y)).abs() <= r
            && (i64::from(self.z) - i64::from(other.z)).abs() <= r
    }

    /// Every position of the cube of `radius` centred on `self`.
    ///
    /// Iteration order is fixed: x outer, y middle, z inner, each ascending.
    /// Positions past the edge of the coordinate space are skipped.
    pub fn cube(&self, radius: u32) -> impl Iterator<Item = BlockPos> + '_ {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        (-r..=r).flat_map(move |dx| {
            (-r..=r).flat_map(move |dy| (-r..=r).filter_map(move |dz| self.offset(dx, dy, dz)))
        })
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Region (chunk column) coordinates inside a named world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.world, self.x, self.z)
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Registry-assigned collector identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectorId(Uuid);

impl CollectorId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CollectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for CollectorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Error returned when a resource type name is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid resource type: '{0}'")]
pub struct InvalidResourceType(pub String);

/// Resource type identifier, e.g. `COBBLESTONE`.
///
/// Names are upper-case ASCII letters, digits and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceType(String);

impl ResourceType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Item name of a snake_case block name, e.g. `trapped_chest` -> `TRAPPED_CHEST`.
    pub(crate) fn from_block_name(name: &str) -> Self {
        Self(name.to_ascii_uppercase())
    }
}

impl FromStr for ResourceType {
    type Err = InvalidResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidResourceType(s.to_owned()))
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = InvalidResourceType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Stacks
// =============================================================================

/// A quantity of a single resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub resource: ResourceType,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(resource: ResourceType, amount: u32) -> Self {
        Self { resource, amount }
    }
}

// =============================================================================
// Collector record
// =============================================================================

/// One placed collector.
///
/// The anchor and its derived region are fixed at construction. Linked
/// containers are kept in link order and never exceed
/// [`max_linked_containers`](Self::max_linked_containers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorRecord {
    owner: ActorId,
    anchor: BlockPos,
    region: RegionPos,
    speed_level: u32,
    range_level: u32,
    filters: BTreeSet<ResourceType>,
    linked_containers: Vec<BlockPos>,
    max_linked_containers: u32,
}

impl CollectorRecord {
    /// Create a record with zero upgrades, no filters and no links.
    pub fn new(owner: ActorId, anchor: BlockPos, max_linked_containers: u32) -> Self {
        let region = anchor.region();
        Self {
            owner,
            anchor,
            region,
            speed_level: 0,
            range_level: 0,
            filters: BTreeSet::new(),
            linked_containers: Vec::new(),
            max_linked_containers: max_linked_containers.max(1),
        }
    }

    pub fn with_levels(mut self, speed_level: u32, range_level: u32) -> Self {
        self.speed_level = speed_level;
        self.range_level = range_level;
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = ResourceType>) -> Self {
        self.filters = filters.into_iter().collect();
        self
    }

    /// Append links in order; entries beyond capacity are dropped.
    pub fn with_linked_containers(mut self, containers: impl IntoIterator<Item = BlockPos>) -> Self {
        for pos in containers {
            self.push_link(pos);
        }
        self
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn anchor(&self) -> &BlockPos {
        &self.anchor
    }

    pub fn region(&self) -> &RegionPos {
        &self.region
    }

    pub fn speed_level(&self) -> u32 {
        self.speed_level
    }

    pub fn range_level(&self) -> u32 {
        self.range_level
    }

    pub fn filters(&self) -> &BTreeSet<ResourceType> {
        &self.filters
    }

    pub fn linked_containers(&self) -> &[BlockPos] {
        &self.linked_containers
    }

    pub fn max_linked_containers(&self) -> u32 {
        self.max_linked_containers
    }

    pub fn is_full(&self) -> bool {
        self.linked_containers.len() >= self.max_linked_containers as usize
    }

    /// Whether a resource passes this collector's filter.
    pub fn accepts(&self, resource: &ResourceType, filters_enabled: bool) -> bool {
        !filters_enabled || self.filters.is_empty() || self.filters.contains(resource)
    }

    pub(crate) fn push_link(&mut self, pos: BlockPos) -> bool {
        if self.is_full() || self.linked_containers.contains(&pos) {
            return false;
        }
        self.linked_containers.push(pos);
        true
    }

    pub(crate) fn remove_link(&mut self, pos: &BlockPos) -> bool {
        match self.linked_containers.iter().position(|p| p == pos) {
            Some(idx) => {
                self.linked_containers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_speed_level(&mut self, level: u32) {
        self.speed_level = level;
    }

    pub(crate) fn set_range_level(&mut self, level: u32) {
        self.range_level = level;
    }

    pub(crate) fn filters_mut(&mut self) -> &mut BTreeSet<ResourceType> {
        &mut self.filters
    }
}

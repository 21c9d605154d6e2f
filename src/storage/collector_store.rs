//! Collector persistence contract.
//!
//! [`CollectorStore`] is implemented by both database backends. Row types
//! and the row-to-record assembly are shared so that both backends apply
//! the same integrity rules on load.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::{Database, Encode, FromRow, Type};
use uuid::Uuid;

use crate::config::DatabaseDriver;
use crate::model::{BlockPos, CollectorId, CollectorRecord, ResourceType};
use crate::storage::StorageError;
use crate::storage::schema::Statements;
use crate::world::WorldLookup;

// =============================================================================
// Store trait
// =============================================================================

/// Durable store for collector records, filter sets and linked containers.
#[async_trait]
pub trait CollectorStore: Send + Sync {
    /// Which backend this is.
    fn backend(&self) -> DatabaseDriver;

    /// Open the connection pool and create the schema if absent.
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Rebuild every record.
    ///
    /// Records in unknown worlds and malformed sub-rows are skipped with a
    /// warning.
    async fn load_all(
        &self,
        worlds: &dyn WorldLookup,
    ) -> Result<HashMap<CollectorId, CollectorRecord>, StorageError>;

    /// Replace the whole store with `records` in one transaction.
    async fn save_all(
        &self,
        records: &HashMap<CollectorId, CollectorRecord>,
    ) -> Result<(), StorageError>;

    /// Upsert one record and replace its filter and link rows.
    async fn save_one(&self, id: CollectorId, record: &CollectorRecord)
    -> Result<(), StorageError>;

    /// Remove a record together with its filter and link rows.
    async fn delete(&self, id: CollectorId) -> Result<(), StorageError>;

    /// Release the connection pool. Safe to call more than once.
    async fn close(&self);
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CollectorRow {
    pub id: String,
    pub owner: String,
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub speed_level: i64,
    pub range_level: i64,
    pub max_linked: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct FilterRow {
    pub collector_id: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct LinkRow {
    pub collector_id: String,
    pub world: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Column values of one collector row, in `upsert_collector` bind order.
pub(crate) struct CollectorValues {
    pub id: String,
    pub owner: String,
    pub world: String,
    pub coords: [i64; 5],
    pub levels: [i64; 3],
}

impl CollectorValues {
    pub fn new(id: CollectorId, record: &CollectorRecord) -> Self {
        let anchor = record.anchor();
        let region = record.region();
        Self {
            id: id.to_string(),
            owner: record.owner().to_string(),
            world: anchor.world.clone(),
            coords: [
                anchor.x.into(),
                anchor.y.into(),
                anchor.z.into(),
                region.x.into(),
                region.z.into(),
            ],
            levels: [
                record.speed_level().into(),
                record.range_level().into(),
                record.max_linked_containers().into(),
            ],
        }
    }
}

/// Bound statement for one backend.
pub(crate) type BoundQuery<'q, DB> = Query<'q, DB, <DB as Database>::Arguments<'q>>;

/// Statements writing one record: the collector upsert, then one insert per
/// filter and per link (links carry their position in the list).
///
/// The caller runs them in order inside its transaction, after clearing the
/// child rows.
pub(crate) fn record_writes<'q, DB>(
    sql: &'q Statements,
    id: CollectorId,
    record: &CollectorRecord,
) -> Vec<BoundQuery<'q, DB>>
where
    DB: Database,
    String: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
{
    let values = CollectorValues::new(id, record);
    let [x, y, z, region_x, region_z] = values.coords;
    let [speed, range, max_linked] = values.levels;

    let mut queries = Vec::with_capacity(1 + record.filters().len() + record.linked_containers().len());
    queries.push(
        sqlx::query::<DB>(&sql.upsert_collector)
            .bind(values.id.clone())
            .bind(values.owner)
            .bind(values.world)
            .bind(x)
            .bind(y)
            .bind(z)
            .bind(region_x)
            .bind(region_z)
            .bind(speed)
            .bind(range)
            .bind(max_linked),
    );

    for resource in record.filters() {
        queries.push(
            sqlx::query::<DB>(&sql.insert_filter)
                .bind(values.id.clone())
                .bind(resource.as_str().to_owned()),
        );
    }

    for (order, pos) in record.linked_containers().iter().enumerate() {
        queries.push(
            sqlx::query::<DB>(&sql.insert_link)
                .bind(values.id.clone())
                .bind(pos.world.clone())
                .bind(i64::from(pos.x))
                .bind(i64::from(pos.y))
                .bind(i64::from(pos.z))
                .bind(order as i64),
        );
    }

    queries
}

/// Statements removing the filter and link rows of one collector.
pub(crate) fn child_deletes<'q, DB>(sql: &'q Statements, id: CollectorId) -> [BoundQuery<'q, DB>; 2]
where
    DB: Database,
    String: Encode<'q, DB> + Type<DB>,
{
    [
        sqlx::query::<DB>(&sql.delete_filters_of).bind(id.to_string()),
        sqlx::query::<DB>(&sql.delete_links_of).bind(id.to_string()),
    ]
}

fn position(world: &str, x: i64, y: i64, z: i64) -> Option<BlockPos> {
    Some(BlockPos::new(
        world,
        i32::try_from(x).ok()?,
        i32::try_from(y).ok()?,
        i32::try_from(z).ok()?,
    ))
}

fn collector_from_row(row: &CollectorRow, worlds: &dyn WorldLookup) -> Option<CollectorId> {
    let Ok(id) = row.id.parse::<CollectorId>() else {
        tracing::warn!(id = %row.id, "Skipping collector with malformed id");
        return None;
    };
    if !worlds.world_exists(&row.world) {
        tracing::warn!(collector = %id, world = %row.world, "Skipping collector in unknown world");
        return None;
    }
    Some(id)
}

/// Turn raw rows into records, skipping anything that fails validation.
pub(crate) fn assemble(
    collectors: Vec<CollectorRow>,
    filters: Vec<FilterRow>,
    links: Vec<LinkRow>,
    worlds: &dyn WorldLookup,
) -> HashMap<CollectorId, CollectorRecord> {
    let mut records = HashMap::with_capacity(collectors.len());

    for row in &collectors {
        let Some(id) = collector_from_row(row, worlds) else {
            continue;
        };

        let Ok(owner) = Uuid::parse_str(&row.owner) else {
            tracing::warn!(collector = %id, owner = %row.owner, "Skipping collector with malformed owner");
            continue;
        };

        let Some(anchor) = position(&row.world, row.x, row.y, row.z) else {
            tracing::warn!(collector = %id, "Skipping collector with out-of-range coordinates");
            continue;
        };

        let levels = (
            u32::try_from(row.speed_level),
            u32::try_from(row.range_level),
            u32::try_from(row.max_linked),
        );
        let (Ok(speed), Ok(range), Ok(max_linked)) = levels else {
            tracing::warn!(collector = %id, "Skipping collector with negative level or capacity");
            continue;
        };

        let record = CollectorRecord::new(owner, anchor, max_linked).with_levels(speed, range);
        records.insert(id, record);
    }

    for row in filters {
        let Some(record) = row
            .collector_id
            .parse::<CollectorId>()
            .ok()
            .and_then(|id| records.get_mut(&id))
        else {
            continue;
        };
        match row.resource_type.parse::<ResourceType>() {
            Ok(resource) => {
                record.filters_mut().insert(resource);
            }
            Err(e) => {
                tracing::warn!(collector = %row.collector_id, error = %e, "Skipping invalid filter");
            }
        }
    }

    for row in links {
        let Ok(id) = row.collector_id.parse::<CollectorId>() else {
            continue;
        };
        let Some(record) = records.get_mut(&id) else {
            continue;
        };
        if !worlds.world_exists(&row.world) {
            tracing::warn!(collector = %id, world = %row.world, "Skipping link in unknown world");
            continue;
        }
        let Some(pos) = position(&row.world, row.x, row.y, row.z) else {
            tracing::warn!(collector = %id, "Skipping link with out-of-range coordinates");
            continue;
        };
        if !record.push_link(pos.clone()) {
            tracing::warn!(collector = %id, container = %pos, "Skipping link beyond capacity");
        }
    }

    records
}

//! Database schema definitions and SQL statements.
//!
//! Both backends share one logical schema: `collectors`, `filters` and
//! `linked_containers`, the latter two cascading from `collectors`. The
//! MySQL backend qualifies every table with a configurable prefix.

use crate::config::DatabaseDriver;

/// Table names after prefixing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub collectors: String,
    pub filters: String,
    pub linked_containers: String,
}

impl TableNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            collectors: format!("{prefix}collectors"),
            filters: format!("{prefix}filters"),
            linked_containers: format!("{prefix}linked_containers"),
        }
    }
}

fn sqlite_ddl(t: &TableNames) -> Vec<String> {
    vec![
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {c} (
    id          TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    world       TEXT NOT NULL,
    x           INTEGER NOT NULL,
    y           INTEGER NOT NULL,
    z           INTEGER NOT NULL,
    region_x    INTEGER NOT NULL,
    region_z    INTEGER NOT NULL,
    speed_level INTEGER NOT NULL DEFAULT 0,
    range_level INTEGER NOT NULL DEFAULT 0,
    max_linked  INTEGER NOT NULL DEFAULT 1
)"#,
            c = t.collectors
        ),
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {f} (
    collector_id  TEXT NOT NULL REFERENCES {c}(id) ON DELETE CASCADE,
    resource_type TEXT NOT NULL,
    PRIMARY KEY (collector_id, resource_type)
)"#,
            f = t.filters,
            c = t.collectors
        ),
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {l} (
    collector_id TEXT NOT NULL REFERENCES {c}(id) ON DELETE CASCADE,
    world        TEXT NOT NULL,
    x            INTEGER NOT NULL,
    y            INTEGER NOT NULL,
    z            INTEGER NOT NULL,
    link_order   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (collector_id, world, x, y, z)
)"#,
            l = t.linked_containers,
            c = t.collectors
        ),
    ]
}

fn mysql_ddl(t: &TableNames) -> Vec<String> {
    vec![
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {c} (
    id          VARCHAR(36) PRIMARY KEY,
    owner       VARCHAR(36) NOT NULL,
    world       VARCHAR(64) NOT NULL,
    x           BIGINT NOT NULL,
    y           BIGINT NOT NULL,
    z           BIGINT NOT NULL,
    region_x    BIGINT NOT NULL,
    region_z    BIGINT NOT NULL,
    speed_level BIGINT NOT NULL DEFAULT 0,
    range_level BIGINT NOT NULL DEFAULT 0,
    max_linked  BIGINT NOT NULL DEFAULT 1
) ENGINE=InnoDB"#,
            c = t.collectors
        ),
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {f} (
    collector_id  VARCHAR(36) NOT NULL,
    resource_type VARCHAR(64) NOT NULL,
    PRIMARY KEY (collector_id, resource_type),
    FOREIGN KEY (collector_id) REFERENCES {c}(id) ON DELETE CASCADE
) ENGINE=InnoDB"#,
            f = t.filters,
            c = t.collectors
        ),
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {l} (
    collector_id VARCHAR(36) NOT NULL,
    world        VARCHAR(64) NOT NULL,
    x            BIGINT NOT NULL,
    y            BIGINT NOT NULL,
    z            BIGINT NOT NULL,
    link_order   BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (collector_id, world, x, y, z),
    FOREIGN KEY (collector_id) REFERENCES {c}(id) ON DELETE CASCADE
) ENGINE=InnoDB"#,
            l = t.linked_containers,
            c = t.collectors
        ),
    ]
}

const COLLECTOR_COLUMNS: &str =
    "id, owner, world, x, y, z, region_x, region_z, speed_level, range_level, max_linked";

const UPDATED_COLUMNS: [&str; 10] = [
    "owner",
    "world",
    "x",
    "y",
    "z",
    "region_x",
    "region_z",
    "speed_level",
    "range_level",
    "max_linked",
];

/// Every statement a backend issues, rendered for one dialect.
#[derive(Debug, Clone)]
pub struct Statements {
    pub create_tables: Vec<String>,
    pub select_collectors: String,
    pub select_filters: String,
    pub select_links: String,
    pub upsert_collector: String,
    pub insert_filter: String,
    pub insert_link: String,
    pub delete_all_links: String,
    pub delete_all_filters: String,
    pub delete_all_collectors: String,
    pub delete_links_of: String,
    pub delete_filters_of: String,
    pub delete_collector: String,
}

impl Statements {
    pub fn new(driver: DatabaseDriver, prefix: &str) -> Self {
        let t = TableNames::with_prefix(prefix);

        let (create_tables, conflict) = match driver {
            DatabaseDriver::Sqlite => {
                let set = UPDATED_COLUMNS
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                (sqlite_ddl(&t), format!("ON CONFLICT(id) DO UPDATE SET {set}"))
            }
            DatabaseDriver::Mysql => {
                let set = UPDATED_COLUMNS
                    .iter()
                    .map(|c| format!("{c} = VALUES({c})"))
                    .collect::<Vec<_>>()
                    .join(", ");
                (mysql_ddl(&t), format!("ON DUPLICATE KEY UPDATE {set}"))
            }
        };

        Self {
            create_tables,
            select_collectors: format!(
                "SELECT id, owner, world, x, y, z, speed_level, range_level, max_linked FROM {}",
                t.collectors
            ),
            select_filters: format!(
                "SELECT collector_id, resource_type FROM {} ORDER BY collector_id, resource_type",
                t.filters
            ),
            select_links: format!(
                "SELECT collector_id, world, x, y, z FROM {} ORDER BY collector_id, link_order",
                t.linked_containers
            ),
            upsert_collector: format!(
                "INSERT INTO {} ({COLLECTOR_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) {conflict}",
                t.collectors
            ),
            insert_filter: format!(
                "INSERT INTO {} (collector_id, resource_type) VALUES (?, ?)",
                t.filters
            ),
            insert_link: format!(
                "INSERT INTO {} (collector_id, world, x, y, z, link_order) VALUES (?, ?, ?, ?, ?, ?)",
                t.linked_containers
            ),
            delete_all_links: format!("DELETE FROM {}", t.linked_containers),
            delete_all_filters: format!("DELETE FROM {}", t.filters),
            delete_all_collectors: format!("DELETE FROM {}", t.collectors),
            delete_links_of: format!(
                "DELETE FROM {} WHERE collector_id = ?",
                t.linked_containers
            ),
            delete_filters_of: format!("DELETE FROM {} WHERE collector_id = ?", t.filters),
            delete_collector: format!("DELETE FROM {} WHERE id = ?", t.collectors),
        }
    }
}

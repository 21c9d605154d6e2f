//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::world::BlockKind;

use super::messages::MessagesConfig;
use super::validation::{ConfigError, expand_env_vars, validate_table_prefix};

// =============================================================================
// Constants
// =============================================================================

/// Default base collection interval, in ticks.
pub const DEFAULT_INTERVAL_TICKS: u64 = 20;

/// Default heartbeat period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Default cube radius for the fallback container scan and auto-linking.
pub const DEFAULT_STORAGE_RANGE: u32 = 5;

/// Largest accepted storage range. The scan visits `(2r + 1)^3` blocks.
pub const MAX_STORAGE_RANGE: u32 = 16;

/// Default connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 4;

fn default_interval_ticks() -> u64 {
    DEFAULT_INTERVAL_TICKS
}

fn default_storage_range() -> u32 {
    DEFAULT_STORAGE_RANGE
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

fn default_true() -> bool {
    true
}

fn default_collector_block() -> BlockKind {
    BlockKind::Hopper
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_worlds() -> Vec<String> {
    vec!["world".to_string()]
}

// =============================================================================
// Collection
// =============================================================================

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Base interval between services of one collector, in ticks.
    #[serde(default = "default_interval_ticks")]
    pub interval_ticks: u64,

    /// Radius of the fallback container scan and of auto-linking.
    #[serde(default = "default_storage_range")]
    pub storage_range: u32,

    /// Global filter switch; when off every resource is eligible.
    #[serde(default = "default_true")]
    pub filters_enabled: bool,

    /// Block kind that turns into a collector when placed.
    #[serde(default = "default_collector_block")]
    pub collector_block: BlockKind,

    /// Heartbeat period (default: 50ms).
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_ticks: DEFAULT_INTERVAL_TICKS,
            storage_range: DEFAULT_STORAGE_RANGE,
            filters_enabled: true,
            collector_block: BlockKind::Hopper,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

// =============================================================================
// Chest linking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChestLinkingConfig {
    pub auto_linking_enabled: bool,
    pub auto_link_on_placement: bool,
    /// Cap on containers linked automatically at creation.
    pub max_auto_linked: u32,
    /// Link capacity given to new collectors.
    pub max_manual_linked: u32,
}

impl Default for ChestLinkingConfig {
    fn default() -> Self {
        Self {
            auto_linking_enabled: true,
            auto_link_on_placement: true,
            max_auto_linked: 1,
            max_manual_linked: 3,
        }
    }
}

// =============================================================================
// Upgrades
// =============================================================================

/// How an upgrade is paid for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CostType {
    /// Experience levels.
    Xp,
    Item,
    Economy,
}

/// One upgrade track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub max_level: u32,
    pub cost_per_level: u32,
    #[serde(default = "default_cost_type")]
    pub cost_type: CostType,
}

fn default_cost_type() -> CostType {
    CostType::Xp
}

fn default_speed_upgrade() -> UpgradeConfig {
    UpgradeConfig {
        max_level: 5,
        cost_per_level: 5,
        cost_type: CostType::Xp,
    }
}

fn default_range_upgrade() -> UpgradeConfig {
    UpgradeConfig {
        max_level: 3,
        cost_per_level: 10,
        cost_type: CostType::Xp,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradesConfig {
    #[serde(default = "default_speed_upgrade")]
    pub speed: UpgradeConfig,
    #[serde(default = "default_range_upgrade")]
    pub range: UpgradeConfig,
}

impl Default for UpgradesConfig {
    fn default() -> Self {
        Self {
            speed: default_speed_upgrade(),
            range: default_range_upgrade(),
        }
    }
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Persistence backend selector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DatabaseDriver {
    /// Embedded file database.
    #[default]
    Sqlite,
    /// Client-server database.
    Mysql,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path.
    pub file: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            file: "collectors.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Supports `${VAR}` / `${VAR:-default}` expansion.
    pub username: String,
    /// Supports `${VAR}` / `${VAR:-default}` expansion.
    pub password: String,
    /// Prepended to every table name.
    pub table_prefix: String,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "chunkcollect".to_string(),
            username: "root".to_string(),
            password: "password".to_string(),
            table_prefix: "cc_".to_string(),
        }
    }
}

impl MysqlConfig {
    /// Username with `${VAR}` references expanded.
    pub fn resolved_username(&self) -> String {
        expand_env_vars(&self.username)
    }

    /// Password with `${VAR}` references expanded.
    pub fn resolved_password(&self) -> String {
        expand_env_vars(&self.password)
    }
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,

    #[serde(default)]
    pub sqlite: SqliteConfig,

    #[serde(default)]
    pub mysql: MysqlConfig,

    /// Connection pool size (default: 4).
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::Sqlite,
            sqlite: SqliteConfig::default(),
            mysql: MysqlConfig::default(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collection: CollectionConfig,

    #[serde(default)]
    pub chest_linking: ChestLinkingConfig,

    #[serde(default)]
    pub upgrades: UpgradesConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub messages: MessagesConfig,

    /// Worlds known to the headless host.
    #[serde(default = "default_worlds")]
    pub worlds: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collection: CollectionConfig::default(),
            chest_linking: ChestLinkingConfig::default(),
            upgrades: UpgradesConfig::default(),
            database: DatabaseConfig::default(),
            messages: MessagesConfig::default(),
            worlds: default_worlds(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.interval_ticks == 0 {
            return Err(ConfigError::ValidationError(
                "collection interval_ticks must be positive".to_string(),
            ));
        }

        if self.collection.tick_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "collection tick_interval must be non-zero".to_string(),
            ));
        }

        if self.collection.storage_range > MAX_STORAGE_RANGE {
            return Err(ConfigError::ValidationError(format!(
                "collection storage_range must be at most {}",
                MAX_STORAGE_RANGE
            )));
        }

        if !self.collection.collector_block.is_tile() {
            return Err(ConfigError::ValidationError(format!(
                "collector_block '{}' cannot hold an inventory",
                self.collection.collector_block
            )));
        }

        if self.chest_linking.max_manual_linked == 0 {
            return Err(ConfigError::ValidationError(
                "chest_linking max_manual_linked must be positive".to_string(),
            ));
        }

        if self.database.pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "database pool_size must be positive".to_string(),
            ));
        }

        match self.database.driver {
            DatabaseDriver::Sqlite => {
                if self.database.sqlite.file.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "database sqlite file must not be empty".to_string(),
                    ));
                }
            }
            DatabaseDriver::Mysql => {
                if self.database.mysql.port == 0 {
                    return Err(ConfigError::ValidationError(
                        "database mysql port must be non-zero".to_string(),
                    ));
                }
                validate_table_prefix(&self.database.mysql.table_prefix)?;
            }
        }

        if self.worlds.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one world must be configured".to_string(),
            ));
        }

        Ok(())
    }
}

//! Command and event issuers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::model::{ActorId, BlockPos};

/// Permission nodes checked by the boundary adapters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
pub enum Permission {
    /// Place, manage, link and upgrade collectors.
    #[strum(serialize = "harvest.use")]
    #[serde(rename = "harvest.use")]
    Use,
    /// List, reload and teleport.
    #[strum(serialize = "harvest.admin")]
    #[serde(rename = "harvest.admin")]
    Admin,
    /// Hand out collector blocks.
    #[strum(serialize = "harvest.give")]
    #[serde(rename = "harvest.give")]
    Give,
    /// Ignore the one-collector-per-region rule.
    #[strum(serialize = "harvest.bypass.limit")]
    #[serde(rename = "harvest.bypass.limit")]
    BypassLimit,
}

/// A player or the console.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub permissions: HashSet<Permission>,
    /// Experience levels, spent on upgrades.
    pub experience_level: u32,
    /// Block the actor is looking at.
    pub target: Option<BlockPos>,
    /// False for the console.
    pub is_player: bool,
}

impl Actor {
    pub fn player(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions: HashSet::new(),
            experience_level: 0,
            target: None,
            is_player: true,
        }
    }

    /// Console sender holding every permission.
    pub fn console() -> Self {
        Self {
            id: ActorId::nil(),
            name: "CONSOLE".to_string(),
            permissions: [
                Permission::Use,
                Permission::Admin,
                Permission::Give,
                Permission::BypassLimit,
            ]
            .into_iter()
            .collect(),
            experience_level: 0,
            target: None,
            is_player: false,
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    pub fn with_experience(mut self, levels: u32) -> Self {
        self.experience_level = levels;
        self
    }

    pub fn looking_at(mut self, target: BlockPos) -> Self {
        self.target = Some(target);
        self
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    #[test]
    fn test_permission_names() {
        assert_eq!(Permission::BypassLimit.to_string(), "harvest.bypass.limit");
        assert_eq!(Permission::from_str("harvest.use").unwrap(), Permission::Use);
        assert!(Permission::from_str("harvest.unknown").is_err());
    }

    #[test]
    fn test_console_has_everything() {
        let console = Actor::console();
        assert!(!console.is_player);
        assert!(console.has(Permission::Admin));
        assert!(console.has(Permission::Give));
    }

    #[test]
    fn test_player_builder() {
        let player = Actor::player(Uuid::new_v4(), "Alex")
            .with_permissions([Permission::Use])
            .with_experience(12);
        assert!(player.has(Permission::Use));
        assert!(!player.has(Permission::Admin));
        assert_eq!(player.experience_level, 12);
    }
}

//! Player-facing message strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Configurable message keys.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MessageKey {
    CollectorPlaced,
    CollectorRemoved,
    NoPermission,
    MaxCollectorsReached,
    ChestLinked,
    ChestUnlinked,
    MaxLinkedChestsReached,
    ChestLinkingMode,
    ChestLinkingCancelled,
    ChestAlreadyLinked,
    AutoLinked,
    CollectorGiven,
    CollectorReceived,
    CollectorNotAdded,
    PlayersOnly,
    NotLookingAtCollector,
    NotCollectorBlock,
    AlreadyCollector,
    RemoveFailed,
    AtMaxLevel,
    NotEnoughXp,
    CostTypeUnsupported,
    Upgraded,
    NoLinkedChests,
    LinkedChestsHeader,
    FilterAdded,
    FilterAlreadyPresent,
    FilterRemoved,
    FilterNotPresent,
    FilterCleared,
    UnknownItemType,
    NoCollectors,
    CollectorListHeader,
    ConfigReloaded,
    ReloadFailed,
    CollectorNotFound,
    Teleported,
    TeleportFailed,
    PlayerNotFound,
    AmountNotPositive,
    AmountNotNumber,
    GiveFailed,
    HelpHeader,
}

impl MessageKey {
    /// Built-in text used when the config does not override a key.
    pub fn default_text(self) -> &'static str {
        match self {
            Self::CollectorPlaced => "Collector placed successfully!",
            Self::CollectorRemoved => "Collector removed.",
            Self::NoPermission => "You don't have permission to do that.",
            Self::MaxCollectorsReached => {
                "You've reached the maximum number of collectors in this chunk."
            }
            Self::ChestLinked => "Chest linked successfully!",
            Self::ChestUnlinked => "Chest unlinked.",
            Self::MaxLinkedChestsReached => "You've reached the maximum number of linked chests.",
            Self::ChestLinkingMode => "Click a chest to link it to your collector.",
            Self::ChestLinkingCancelled => "Chest linking cancelled.",
            Self::ChestAlreadyLinked => "This chest is already linked to a collector.",
            Self::AutoLinked => "Auto-linked %amount% chest(s) to your collector.",
            Self::CollectorGiven => "Gave %amount% collector(s) to %player%.",
            Self::CollectorReceived => "You received %amount% collector(s).",
            Self::CollectorNotAdded => "Could not give %amount% collector(s) due to full inventory.",
            Self::PlayersOnly => "This command can only be used by players.",
            Self::NotLookingAtCollector => "You must be looking at a collector.",
            Self::NotCollectorBlock => "You must be looking at a %block% to create a collector.",
            Self::AlreadyCollector => "This block is already a collector.",
            Self::RemoveFailed => "Failed to remove collector.",
            Self::AtMaxLevel => "This collector is already at the maximum %upgrade% level!",
            Self::NotEnoughXp => "You need %amount% XP levels to upgrade this collector!",
            Self::CostTypeUnsupported => "This upgrade cost type is not implemented yet!",
            Self::Upgraded => "Collector %upgrade% upgraded to level %level%!",
            Self::NoLinkedChests => "This collector has no linked chests.",
            Self::LinkedChestsHeader => "Linked Chests (%amount%/%max%):",
            Self::FilterAdded => "%item% added to the filter.",
            Self::FilterAlreadyPresent => "%item% is already in the filter.",
            Self::FilterRemoved => "%item% removed from the filter.",
            Self::FilterNotPresent => "%item% is not in the filter.",
            Self::FilterCleared => "Filter cleared. The collector accepts everything.",
            Self::UnknownItemType => "Unknown item type: %item%",
            Self::NoCollectors => "No collectors found.",
            Self::CollectorListHeader => "Collectors (%amount%):",
            Self::ConfigReloaded => "Configuration reloaded.",
            Self::ReloadFailed => "Failed to reload configuration: %error%",
            Self::CollectorNotFound => "Collector not found: %id%",
            Self::Teleported => "Teleported to collector: %id%",
            Self::TeleportFailed => "Teleport failed: %error%",
            Self::PlayerNotFound => "Player not found: %player%",
            Self::AmountNotPositive => "Amount must be a positive number.",
            Self::AmountNotNumber => "Amount must be a number.",
            Self::GiveFailed => "Could not give items: %error%",
            Self::HelpHeader => "Harvest commands:",
        }
    }
}

/// Message prefix plus per-key overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// Prepended to every formatted message.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Overrides keyed by message key, e.g. `collector-placed`.
    #[serde(flatten)]
    pub overrides: BTreeMap<MessageKey, String>,
}

fn default_prefix() -> String {
    "[Harvest] ".to_string()
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            overrides: BTreeMap::new(),
        }
    }
}

impl MessagesConfig {
    /// Prefixed message text.
    pub fn get(&self, key: MessageKey) -> String {
        self.format(key, &[])
    }

    /// Prefixed message text with `%name%` placeholders substituted.
    pub fn format(&self, key: MessageKey, vars: &[(&str, &str)]) -> String {
        let template = self
            .overrides
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| key.default_text());

        let mut text = format!("{}{}", self.prefix, template);
        for (name, value) in vars {
            text = text.replace(&format!("%{}%", name), value);
        }
        text
    }
}

//! Command surface.
//!
//! Thin adapter over the registry: permission checks, argument parsing and
//! message formatting. Every outcome is reported as text; nothing here
//! returns an error to the caller.

use std::sync::Arc;

use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::actor::{Actor, Permission};
use crate::collector::{CollectorRegistry, CreateRejection, UpgradeKind, UpgradeOutcome};
use crate::config::{AppConfig, ConfigHandle, CostType, MessageKey};
use crate::model::{ActorId, CollectorId, CollectorRecord, ItemStack, ResourceType};

/// Sub-commands, in help order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SubCommand {
    Create,
    Remove,
    Gui,
    Upgrade,
    Link,
    Links,
    Filter,
    List,
    Reload,
    Tp,
    Give,
}

impl SubCommand {
    pub fn permission(self) -> Permission {
        match self {
            Self::Create
            | Self::Remove
            | Self::Gui
            | Self::Upgrade
            | Self::Link
            | Self::Links
            | Self::Filter => Permission::Use,
            Self::List | Self::Reload | Self::Tp => Permission::Admin,
            Self::Give => Permission::Give,
        }
    }

    /// Whether the console may run it.
    pub fn console_allowed(self) -> bool {
        matches!(self, Self::List | Self::Reload | Self::Give)
    }

    fn usage(self) -> &'static str {
        match self {
            Self::Create => "/harvest create - Turn the targeted block into a collector",
            Self::Remove => "/harvest remove - Remove the targeted collector",
            Self::Gui => "/harvest gui - Show the targeted collector",
            Self::Upgrade => "/harvest upgrade <speed|range> - Upgrade the targeted collector",
            Self::Link => "/harvest link - Select a chest to link",
            Self::Links => "/harvest links - Show linked chests",
            Self::Filter => "/harvest filter <add|remove|clear> [TYPE] - Edit the item filter",
            Self::List => "/harvest list - List all collectors",
            Self::Reload => "/harvest reload - Reload the configuration",
            Self::Tp => "/harvest tp <id> - Teleport to a collector",
            Self::Give => "/harvest give <player> <amount> - Give collector blocks to a player",
        }
    }
}

/// Filter editing actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum FilterAction {
    Add,
    Remove,
    Clear,
}

/// Text produced by one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Lines for the issuer.
    pub replies: Vec<String>,
    /// Lines for other online players.
    pub notices: Vec<(ActorId, String)>,
}

impl CommandOutput {
    fn reply(line: impl Into<String>) -> Self {
        Self {
            replies: vec![line.into()],
            notices: Vec::new(),
        }
    }

    fn lines(replies: Vec<String>) -> Self {
        Self {
            replies,
            notices: Vec::new(),
        }
    }
}

/// Management view of one collector.
pub fn management_view(id: CollectorId, record: &CollectorRecord, config: &AppConfig) -> Vec<String> {
    let anchor = record.anchor();
    let filters = if record.filters().is_empty() {
        "None".to_string()
    } else {
        record
            .filters()
            .iter()
            .map(ResourceType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let speed = &config.upgrades.speed;
    let range = &config.upgrades.range;

    vec![
        format!("Collector {}", id),
        format!("Location: {}", anchor),
        format!(
            "Speed Level: {}/{} (next: {} {})",
            record.speed_level(),
            speed.max_level,
            speed.cost_per_level,
            speed.cost_type
        ),
        format!(
            "Range Level: {}/{} (next: {} {})",
            record.range_level(),
            range.max_level,
            range.cost_per_level,
            range.cost_type
        ),
        format!("Filters: {}", filters),
        format!(
            "Linked Chests: {}/{}",
            record.linked_containers().len(),
            record.max_linked_containers()
        ),
    ]
}

/// Dispatches `/harvest` sub-commands.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    registry: Arc<CollectorRegistry>,
    config: Arc<ConfigHandle>,
}

impl CommandHandler {
    pub fn new(registry: Arc<CollectorRegistry>, config: Arc<ConfigHandle>) -> Self {
        Self { registry, config }
    }

    /// Run a command. `actor` is mutable because upgrades spend experience.
    pub async fn execute(&self, actor: &mut Actor, args: &[&str]) -> CommandOutput {
        let Some(sub) = args.first().and_then(|s| s.parse::<SubCommand>().ok()) else {
            return CommandOutput::lines(self.help(actor, &self.config.current()));
        };

        let config = self.config.current();
        if !actor.is_player && !sub.console_allowed() {
            return CommandOutput::reply(config.messages.get(MessageKey::PlayersOnly));
        }
        if !actor.has(sub.permission()) {
            return CommandOutput::reply(config.messages.get(MessageKey::NoPermission));
        }

        tracing::debug!(actor = %actor.name, command = %sub, "Executing command");
        let rest = &args[1..];
        match sub {
            SubCommand::Create => self.create(actor, &config).await,
            SubCommand::Remove => self.remove(actor, &config).await,
            SubCommand::Gui => self.gui(actor, &config).await,
            SubCommand::Upgrade => self.upgrade(actor, rest, &config).await,
            SubCommand::Link => self.link(actor, &config).await,
            SubCommand::Links => self.links(actor, &config).await,
            SubCommand::Filter => self.filter(actor, rest, &config).await,
            SubCommand::List => self.list(&config).await,
            SubCommand::Reload => self.reload(&config),
            SubCommand::Tp => self.teleport(actor, rest, &config).await,
            SubCommand::Give => self.give(rest, &config),
        }
    }

    /// Completions for the argument being typed (the last element of `args`).
    pub async fn complete(&self, actor: &Actor, args: &[&str]) -> Vec<String> {
        let matching = |options: Vec<String>, prefix: &str| -> Vec<String> {
            let prefix = prefix.to_lowercase();
            options
                .into_iter()
                .filter(|o| o.to_lowercase().starts_with(&prefix))
                .collect()
        };

        match args {
            [prefix] => matching(
                SubCommand::iter()
                    .filter(|s| actor.has(s.permission()))
                    .map(|s| s.as_ref().to_string())
                    .collect(),
                *prefix,
            ),
            [sub, prefix] => match sub.parse::<SubCommand>() {
                Ok(SubCommand::Tp) if actor.has(Permission::Admin) => {
                    let mut ids: Vec<String> = self
                        .registry
                        .all()
                        .await
                        .keys()
                        .map(ToString::to_string)
                        .collect();
                    ids.sort();
                    matching(ids, *prefix)
                }
                Ok(SubCommand::Upgrade) => matching(
                    vec![
                        UpgradeKind::Speed.as_ref().to_string(),
                        UpgradeKind::Range.as_ref().to_string(),
                    ],
                    *prefix,
                ),
                Ok(SubCommand::Filter) => matching(
                    FilterAction::iter().map(|a| a.as_ref().to_string()).collect(),
                    *prefix,
                ),
                _ => Vec::new(),
            },
            [sub, _, _] if sub.parse::<SubCommand>() == Ok(SubCommand::Give) => {
                if actor.has(Permission::Give) {
                    ["1", "5", "10", "64"].iter().map(|s| s.to_string()).collect()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn help(&self, actor: &Actor, config: &AppConfig) -> Vec<String> {
        let mut lines = vec![config.messages.get(MessageKey::HelpHeader)];
        lines.extend(
            SubCommand::iter()
                .filter(|s| actor.has(s.permission()))
                .map(|s| s.usage().to_string()),
        );
        lines
    }

    async fn targeted_collector(&self, actor: &Actor) -> Option<(CollectorId, CollectorRecord)> {
        let target = actor.target.as_ref()?;
        self.registry.get(target).await
    }

    async fn create(&self, actor: &Actor, config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let block = config.collection.collector_block;
        let wrong_block = || {
            CommandOutput::reply(
                messages.format(MessageKey::NotCollectorBlock, &[("block", block.as_ref())]),
            )
        };
        let Some(target) = actor
            .target
            .as_ref()
            .filter(|pos| self.registry.world().block_kind(pos) == Some(block))
        else {
            return wrong_block();
        };

        match self.registry.create(actor, target).await {
            Ok(created) => {
                let mut replies = vec![messages.get(MessageKey::CollectorPlaced)];
                if created.auto_linked > 0 {
                    replies.push(messages.format(
                        MessageKey::AutoLinked,
                        &[("amount", &created.auto_linked.to_string())],
                    ));
                }
                CommandOutput::lines(replies)
            }
            Err(CreateRejection::NotATile) => wrong_block(),
            Err(rejection) => CommandOutput::reply(messages.get(rejection.message_key())),
        }
    }

    async fn remove(&self, actor: &Actor, config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let Some(target) = actor.target.as_ref() else {
            return CommandOutput::reply(messages.get(MessageKey::NotLookingAtCollector));
        };
        if !self.registry.is_collector(target).await {
            return CommandOutput::reply(messages.get(MessageKey::NotLookingAtCollector));
        }
        match self.registry.remove(target).await {
            Some(_) => CommandOutput::reply(messages.get(MessageKey::CollectorRemoved)),
            None => CommandOutput::reply(messages.get(MessageKey::RemoveFailed)),
        }
    }

    async fn gui(&self, actor: &Actor, config: &AppConfig) -> CommandOutput {
        match self.targeted_collector(actor).await {
            Some((id, record)) => CommandOutput::lines(management_view(id, &record, config)),
            None => CommandOutput::reply(config.messages.get(MessageKey::NotLookingAtCollector)),
        }
    }

    async fn upgrade(&self, actor: &mut Actor, args: &[&str], config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let at_max = |kind: UpgradeKind| {
            CommandOutput::reply(messages.format(MessageKey::AtMaxLevel, &[("upgrade", kind.as_ref())]))
        };
        let Some(kind) = args.first().and_then(|s| s.parse::<UpgradeKind>().ok()) else {
            return CommandOutput::reply(SubCommand::Upgrade.usage());
        };
        let Some((id, record)) = self.targeted_collector(actor).await else {
            return CommandOutput::reply(messages.get(MessageKey::NotLookingAtCollector));
        };

        let (level, track) = match kind {
            UpgradeKind::Speed => (record.speed_level(), &config.upgrades.speed),
            UpgradeKind::Range => (record.range_level(), &config.upgrades.range),
        };
        if level >= track.max_level {
            return at_max(kind);
        }

        let cost = track.cost_per_level;
        match track.cost_type {
            CostType::Xp if actor.experience_level < cost => {
                return CommandOutput::reply(
                    messages.format(MessageKey::NotEnoughXp, &[("amount", &cost.to_string())]),
                );
            }
            CostType::Xp => actor.experience_level -= cost,
            CostType::Item | CostType::Economy => {
                return CommandOutput::reply(messages.get(MessageKey::CostTypeUnsupported));
            }
        }

        match self.registry.upgrade(id, kind).await {
            UpgradeOutcome::Upgraded(level) => CommandOutput::reply(messages.format(
                MessageKey::Upgraded,
                &[("upgrade", kind.as_ref()), ("level", &level.to_string())],
            )),
            outcome => {
                // Lost a race with another upgrade or a removal.
                actor.experience_level += cost;
                tracing::debug!(collector = %id, outcome = ?outcome, "Upgrade refunded");
                at_max(kind)
            }
        }
    }

    async fn link(&self, actor: &Actor, config: &AppConfig) -> CommandOutput {
        let Some((id, record)) = self.targeted_collector(actor).await else {
            return CommandOutput::reply(config.messages.get(MessageKey::NotLookingAtCollector));
        };
        if record.is_full() {
            return CommandOutput::reply(config.messages.get(MessageKey::MaxLinkedChestsReached));
        }
        self.registry.begin_linking(actor.id, id).await;
        CommandOutput::reply(config.messages.get(MessageKey::ChestLinkingMode))
    }

    async fn links(&self, actor: &Actor, config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let Some((_, record)) = self.targeted_collector(actor).await else {
            return CommandOutput::reply(messages.get(MessageKey::NotLookingAtCollector));
        };
        if record.linked_containers().is_empty() {
            return CommandOutput::reply(messages.get(MessageKey::NoLinkedChests));
        }

        let mut replies = vec![messages.format(
            MessageKey::LinkedChestsHeader,
            &[
                ("amount", &record.linked_containers().len().to_string()),
                ("max", &record.max_linked_containers().to_string()),
            ],
        )];
        replies.extend(
            record
                .linked_containers()
                .iter()
                .enumerate()
                .map(|(i, pos)| format!("{}. {}", i + 1, pos)),
        );
        CommandOutput::lines(replies)
    }

    async fn filter(&self, actor: &Actor, args: &[&str], config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let Some(action) = args.first().and_then(|s| s.parse::<FilterAction>().ok()) else {
            return CommandOutput::reply(SubCommand::Filter.usage());
        };
        let Some((id, _)) = self.targeted_collector(actor).await else {
            return CommandOutput::reply(messages.get(MessageKey::NotLookingAtCollector));
        };

        if action == FilterAction::Clear {
            self.registry.clear_filters(id).await;
            return CommandOutput::reply(messages.get(MessageKey::FilterCleared));
        }

        let Some(name) = args.get(1) else {
            return CommandOutput::reply(SubCommand::Filter.usage());
        };
        let resource = match name.to_ascii_uppercase().parse::<ResourceType>() {
            Ok(resource) => resource,
            Err(e) => {
                return CommandOutput::reply(
                    messages.format(MessageKey::UnknownItemType, &[("item", &e.0)]),
                );
            }
        };

        let changed = match action {
            FilterAction::Add => self.registry.add_filter(id, resource.clone()).await,
            _ => self.registry.remove_filter(id, &resource).await,
        };
        let key = match (action, changed) {
            (FilterAction::Add, true) => MessageKey::FilterAdded,
            (FilterAction::Add, false) => MessageKey::FilterAlreadyPresent,
            (_, true) => MessageKey::FilterRemoved,
            (_, false) => MessageKey::FilterNotPresent,
        };
        CommandOutput::reply(messages.format(key, &[("item", resource.as_str())]))
    }

    async fn list(&self, config: &AppConfig) -> CommandOutput {
        let collectors = self.registry.all().await;
        if collectors.is_empty() {
            return CommandOutput::reply(config.messages.get(MessageKey::NoCollectors));
        }

        let mut entries: Vec<_> = collectors.into_iter().collect();
        entries.sort_by_key(|(id, _)| *id);

        let mut replies = vec![config.messages.format(
            MessageKey::CollectorListHeader,
            &[("amount", &entries.len().to_string())],
        )];
        replies.extend(entries.iter().map(|(id, record)| {
            let a = record.anchor();
            format!("{} - {} {},{},{}", id, a.world, a.x, a.y, a.z)
        }));
        CommandOutput::lines(replies)
    }

    /// Replies come from the configuration that was in effect when the
    /// command was issued.
    fn reload(&self, config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        match self.config.reload() {
            Ok(_) => CommandOutput::reply(messages.get(MessageKey::ConfigReloaded)),
            Err(e) => {
                tracing::warn!(error = %e, "Configuration reload failed");
                CommandOutput::reply(
                    messages.format(MessageKey::ReloadFailed, &[("error", &e.to_string())]),
                )
            }
        }
    }

    async fn teleport(&self, actor: &Actor, args: &[&str], config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let Some(raw) = args.first() else {
            return CommandOutput::reply(SubCommand::Tp.usage());
        };
        let record = match raw.parse::<CollectorId>() {
            Ok(id) => self.registry.get_by_id(id).await,
            Err(_) => None,
        };
        let Some(record) = record else {
            return CommandOutput::reply(messages.format(MessageKey::CollectorNotFound, &[("id", *raw)]));
        };

        let a = record.anchor();
        let coords = (f64::from(a.x) + 0.5, f64::from(a.y) + 1.0, f64::from(a.z) + 0.5);
        match self.registry.world().teleport_player(actor.id, &a.world, coords) {
            Ok(()) => CommandOutput::reply(messages.format(MessageKey::Teleported, &[("id", *raw)])),
            Err(e) => {
                tracing::warn!(actor = %actor.id, error = %e, "Teleport failed");
                CommandOutput::reply(
                    messages.format(MessageKey::TeleportFailed, &[("error", &e.to_string())]),
                )
            }
        }
    }

    fn give(&self, args: &[&str], config: &AppConfig) -> CommandOutput {
        let messages = &config.messages;
        let [name, amount, ..] = args else {
            return CommandOutput::reply(SubCommand::Give.usage());
        };
        let world = self.registry.world();
        let Some(player) = world.find_player(name) else {
            return CommandOutput::reply(messages.format(MessageKey::PlayerNotFound, &[("player", *name)]));
        };
        let amount = match amount.parse::<i64>() {
            Ok(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            Ok(_) => return CommandOutput::reply(messages.get(MessageKey::AmountNotPositive)),
            Err(_) => return CommandOutput::reply(messages.get(MessageKey::AmountNotNumber)),
        };

        let stack = ItemStack::new(config.collection.collector_block.item_type(), amount);
        let rest = match world.give_to_player(player.id, stack) {
            Ok(rest) => rest,
            Err(e) => {
                return CommandOutput::reply(
                    messages.format(MessageKey::GiveFailed, &[("error", &e.to_string())]),
                );
            }
        };
        let missing = rest.map_or(0, |s| s.amount);
        let given = amount - missing;

        let mut output = CommandOutput::reply(messages.format(
            MessageKey::CollectorGiven,
            &[("amount", &given.to_string()), ("player", &player.name)],
        ));
        if missing > 0 {
            output.replies.push(messages.format(
                MessageKey::CollectorNotAdded,
                &[("amount", &missing.to_string())],
            ));
        }
        if given > 0 {
            output.notices.push((
                player.id,
                messages.format(MessageKey::CollectorReceived, &[("amount", &given.to_string())]),
            ));
        }
        tracing::info!(player = %player.name, given, missing, "Collector blocks given");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::{Fixture, fixture};
    use crate::model::BlockPos;
    use crate::world::BlockKind;

    fn pos(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new("world", x, y, z)
    }

    fn handler(f: &Fixture) -> CommandHandler {
        let handle = ConfigHandle::new((*f.config.current()).clone(), None);
        CommandHandler::new(f.registry.clone(), Arc::new(handle))
    }

    async fn placed(f: &Fixture, at: BlockPos) -> CollectorId {
        f.world.set_block(at.clone(), BlockKind::Hopper);
        f.registry.create(&f.owner, &at).await.unwrap().id
    }

    #[tokio::test]
    async fn test_help_filtered_by_permission() {
        let f = fixture().await;
        let h = handler(&f);
        let mut player = f.owner.clone();
        let out = h.execute(&mut player, &[]).await;
        assert!(out.replies.iter().any(|l| l.contains("create")));
        assert!(!out.replies.iter().any(|l| l.contains("reload")));

        let mut console = Actor::console();
        let out = h.execute(&mut console, &["bogus"]).await;
        assert!(out.replies.iter().any(|l| l.contains("give")));
    }

    #[tokio::test]
    async fn test_console_cannot_create() {
        let f = fixture().await;
        let out = handler(&f).execute(&mut Actor::console(), &["create"]).await;
        assert_eq!(out.replies, vec!["[Harvest] This command can only be used by players.".to_string()]);
    }

    #[tokio::test]
    async fn test_create_and_remove() {
        let f = fixture().await;
        let h = handler(&f);
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0));

        let out = h.execute(&mut player, &["create"]).await;
        assert_eq!(out.replies[0], "[Harvest] Collector placed successfully!");
        assert_eq!(out.replies[1], "[Harvest] Auto-linked 1 chest(s) to your collector.");

        let out = h.execute(&mut player, &["create"]).await;
        assert_eq!(out.replies, vec!["[Harvest] This block is already a collector.".to_string()]);

        let out = h.execute(&mut player, &["remove"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Collector removed.".to_string()]);
        assert!(f.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_wrong_block_and_occupied_region() {
        let f = fixture().await;
        let h = handler(&f);
        f.world.set_block(pos(0, 64, 0), BlockKind::Chest);
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0));
        let out = h.execute(&mut player, &["create"]).await;
        assert_eq!(
            out.replies,
            vec!["[Harvest] You must be looking at a hopper to create a collector.".to_string()]
        );

        placed(&f, pos(2, 64, 2)).await;
        f.world.set_block(pos(4, 64, 4), BlockKind::Hopper);
        let mut player = f.owner.clone().looking_at(pos(4, 64, 4));
        let out = h.execute(&mut player, &["create"]).await;
        assert_eq!(
            out.replies[0],
            "[Harvest] You've reached the maximum number of collectors in this chunk."
        );
    }

    #[tokio::test]
    async fn test_no_permission() {
        let f = fixture().await;
        let id = f.world.add_player("Guest", "world");
        let mut guest = Actor::player(id, "Guest");
        let out = handler(&f).execute(&mut guest, &["gui"]).await;
        assert_eq!(out.replies, vec!["[Harvest] You don't have permission to do that.".to_string()]);
    }

    #[tokio::test]
    async fn test_gui_shows_record() {
        let f = fixture().await;
        let id = placed(&f, pos(0, 64, 0)).await;
        f.registry.add_filter(id, "STONE".parse().unwrap()).await;
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0));
        let out = handler(&f).execute(&mut player, &["gui"]).await;
        assert_eq!(out.replies[0], format!("Collector {}", id));
        assert!(out.replies.contains(&"Filters: STONE".to_string()));
        assert!(out.replies.contains(&"Linked Chests: 0/3".to_string()));
    }

    #[tokio::test]
    async fn test_upgrade_spends_experience() {
        let f = fixture().await;
        let id = placed(&f, pos(0, 64, 0)).await;
        let h = handler(&f);
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0)).with_experience(7);

        let out = h.execute(&mut player, &["upgrade", "speed"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Collector speed upgraded to level 1!".to_string()]);
        assert_eq!(player.experience_level, 2);

        let out = h.execute(&mut player, &["upgrade", "speed"]).await;
        assert_eq!(out.replies, vec!["[Harvest] You need 5 XP levels to upgrade this collector!".to_string()]);
        assert_eq!(player.experience_level, 2);
        assert_eq!(f.registry.get_by_id(id).await.unwrap().speed_level(), 1);

        let out = h.execute(&mut player, &["upgrade", "power"]).await;
        assert_eq!(out.replies[0], SubCommand::Upgrade.usage());
    }

    #[tokio::test]
    async fn test_upgrade_at_max_and_stubbed_costs() {
        let f = fixture().await;
        let mut config = (*f.config.current()).clone();
        config.upgrades.range.max_level = 1;
        config.upgrades.speed.cost_type = CostType::Economy;
        let h = CommandHandler::new(
            f.registry.clone(),
            Arc::new(ConfigHandle::new(config, None)),
        );
        placed(&f, pos(0, 64, 0)).await;
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0)).with_experience(100);

        h.execute(&mut player, &["upgrade", "range"]).await;
        let out = h.execute(&mut player, &["upgrade", "range"]).await;
        assert_eq!(out.replies, vec!["[Harvest] This collector is already at the maximum range level!".to_string()]);
        assert_eq!(player.experience_level, 90);

        let out = h.execute(&mut player, &["upgrade", "speed"]).await;
        assert_eq!(out.replies, vec!["[Harvest] This upgrade cost type is not implemented yet!".to_string()]);
        assert_eq!(player.experience_level, 90);
    }

    #[tokio::test]
    async fn test_replies_use_configured_messages() {
        let f = fixture().await;
        let mut config = (*f.config.current()).clone();
        config.messages.prefix = "» ".to_string();
        config
            .messages
            .overrides
            .insert(MessageKey::NotLookingAtCollector, "Aim at a collector first.".to_string());
        let h = CommandHandler::new(f.registry.clone(), Arc::new(ConfigHandle::new(config, None)));

        let mut player = f.owner.clone().looking_at(pos(9, 9, 9));
        let out = h.execute(&mut player, &["links"]).await;
        assert_eq!(out.replies, vec!["» Aim at a collector first.".to_string()]);
        let out = h.execute(&mut Actor::console(), &["list"]).await;
        assert_eq!(out.replies, vec!["» No collectors found.".to_string()]);
    }

    #[tokio::test]
    async fn test_link_starts_session() {
        let f = fixture().await;
        let id = placed(&f, pos(0, 64, 0)).await;
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0));
        let out = handler(&f).execute(&mut player, &["link"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Click a chest to link it to your collector.".to_string()]);
        assert_eq!(f.registry.linking_target(player.id).await, Some(id));
    }

    #[tokio::test]
    async fn test_links_listing() {
        let f = fixture().await;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        placed(&f, pos(0, 64, 0)).await;
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0));
        let out = handler(&f).execute(&mut player, &["links"]).await;
        assert_eq!(out.replies[0], "[Harvest] Linked Chests (1/3):");
        assert_eq!(out.replies[1], "1. world (1, 64, 0)");
    }

    #[tokio::test]
    async fn test_filter_commands() {
        let f = fixture().await;
        let id = placed(&f, pos(0, 64, 0)).await;
        let h = handler(&f);
        let mut player = f.owner.clone().looking_at(pos(0, 64, 0));

        let out = h.execute(&mut player, &["filter", "add", "stone"]).await;
        assert_eq!(out.replies, vec!["[Harvest] STONE added to the filter.".to_string()]);
        let out = h.execute(&mut player, &["filter", "add", "STONE"]).await;
        assert_eq!(out.replies, vec!["[Harvest] STONE is already in the filter.".to_string()]);
        let out = h.execute(&mut player, &["filter", "add", "bad-name"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Unknown item type: BAD-NAME".to_string()]);

        let out = h.execute(&mut player, &["filter", "remove", "stone"]).await;
        assert_eq!(out.replies, vec!["[Harvest] STONE removed from the filter.".to_string()]);

        h.execute(&mut player, &["filter", "add", "dirt"]).await;
        h.execute(&mut player, &["filter", "clear"]).await;
        assert!(f.registry.get_by_id(id).await.unwrap().filters().is_empty());
    }

    #[tokio::test]
    async fn test_list_and_teleport() {
        let f = fixture().await;
        let id = placed(&f, pos(3, 64, -2)).await;
        let h = handler(&f);

        let out = h.execute(&mut Actor::console(), &["list"]).await;
        assert_eq!(out.replies[0], "[Harvest] Collectors (1):");
        assert_eq!(out.replies[1], format!("{} - world 3,64,-2", id));

        let mut admin = f.owner.clone().with_permissions([Permission::Admin]);
        let out = h.execute(&mut admin, &["tp", id.to_string().as_str()]).await;
        assert_eq!(out.replies, vec![format!("[Harvest] Teleported to collector: {}", id)]);
        assert_eq!(
            f.world.player_position(admin.id),
            Some(("world".to_string(), (3.5, 65.0, -1.5)))
        );

        let out = h.execute(&mut admin, &["tp", "nope"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Collector not found: nope".to_string()]);
    }

    #[tokio::test]
    async fn test_reload_without_file() {
        let f = fixture().await;
        let out = handler(&f).execute(&mut Actor::console(), &["reload"]).await;
        assert!(out.replies[0].starts_with("[Harvest] Failed to reload configuration"));
    }

    #[tokio::test]
    async fn test_give() {
        let f = fixture().await;
        let h = handler(&f);
        let mut console = Actor::console();

        let out = h.execute(&mut console, &["give", "alex", "10"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Gave 10 collector(s) to Alex.".to_string()]);
        assert_eq!(
            out.notices,
            vec![(f.owner.id, "[Harvest] You received 10 collector(s).".to_string())]
        );
        let inventory = f.world.player_inventory(f.owner.id).unwrap();
        assert_eq!(inventory.count(&"HOPPER".parse().unwrap()), 10);

        let out = h.execute(&mut console, &["give", "nobody", "1"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Player not found: nobody".to_string()]);
        let out = h.execute(&mut console, &["give", "alex", "0"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Amount must be a positive number.".to_string()]);
        let out = h.execute(&mut console, &["give", "alex", "x"]).await;
        assert_eq!(out.replies, vec!["[Harvest] Amount must be a number.".to_string()]);
    }

    #[tokio::test]
    async fn test_give_reports_overflow() {
        let f = fixture().await;
        let h = handler(&f);
        // 36 slots of 64.
        let out = h.execute(&mut Actor::console(), &["give", "Alex", "2400"]).await;
        assert_eq!(out.replies[0], "[Harvest] Gave 2304 collector(s) to Alex.");
        assert_eq!(
            out.replies[1],
            "[Harvest] Could not give 96 collector(s) due to full inventory."
        );
    }

    #[tokio::test]
    async fn test_tab_completion() {
        let f = fixture().await;
        let id = placed(&f, pos(0, 64, 0)).await;
        let h = handler(&f);

        assert_eq!(h.complete(&f.owner, &["li"]).await, vec!["link", "links"]);
        assert!(h.complete(&f.owner, &["l"]).await.iter().all(|s| s != "list"));
        assert_eq!(h.complete(&f.owner, &["upgrade", "s"]).await, vec!["speed"]);
        assert_eq!(h.complete(&f.owner, &["filter", ""]).await, vec!["add", "remove", "clear"]);

        let console = Actor::console();
        assert_eq!(h.complete(&console, &["tp", ""]).await, vec![id.to_string()]);
        assert_eq!(h.complete(&console, &["give", "Alex", ""]).await, vec!["1", "5", "10", "64"]);
        assert!(h.complete(&f.owner, &["tp", ""]).await.is_empty());
    }
}

//! World-event adapter.
//!
//! Translates block placement, breaking and interaction into registry
//! calls. Each handler reports whether the host should cancel the event
//! and which lines to show the actor.

use std::sync::Arc;

use crate::actor::{Actor, Permission};
use crate::collector::{CollectorRegistry, LinkOutcome};
use crate::command::management_view;
use crate::config::MessageKey;
use crate::model::BlockPos;

/// What the host should do with an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Undo the action in the world.
    pub cancelled: bool,
    pub messages: Vec<String>,
}

impl EventOutcome {
    fn ignored() -> Self {
        Self::default()
    }

    fn allow(message: String) -> Self {
        Self {
            cancelled: false,
            messages: vec![message],
        }
    }

    fn cancel(messages: Vec<String>) -> Self {
        Self {
            cancelled: true,
            messages,
        }
    }
}

/// Block event handlers.
#[derive(Debug, Clone)]
pub struct BlockListener {
    registry: Arc<CollectorRegistry>,
}

impl BlockListener {
    pub fn new(registry: Arc<CollectorRegistry>) -> Self {
        Self { registry }
    }

    /// A block was placed at `pos`.
    ///
    /// Placing the configured collector block creates a collector; a
    /// rejected creation cancels the placement.
    pub async fn on_block_place(&self, actor: &Actor, pos: &BlockPos) -> EventOutcome {
        let config = self.registry.config();
        if self.registry.world().block_kind(pos) != Some(config.collection.collector_block) {
            return EventOutcome::ignored();
        }
        if !actor.has(Permission::Use) {
            return EventOutcome::cancel(vec![config.messages.get(MessageKey::NoPermission)]);
        }

        match self.registry.create(actor, pos).await {
            Ok(created) => {
                let mut messages = vec![config.messages.get(MessageKey::CollectorPlaced)];
                if created.auto_linked > 0 {
                    messages.push(config.messages.format(
                        MessageKey::AutoLinked,
                        &[("amount", &created.auto_linked.to_string())],
                    ));
                }
                EventOutcome {
                    cancelled: false,
                    messages,
                }
            }
            Err(rejection) => {
                tracing::debug!(actor = %actor.name, pos = %pos, rejection = ?rejection, "Collector placement rejected");
                let block = config.collection.collector_block;
                EventOutcome::cancel(vec![config.messages.format(
                    rejection.message_key(),
                    &[("block", block.as_ref())],
                )])
            }
        }
    }

    /// A block at `pos` was broken.
    ///
    /// Breaking an anchor removes its collector; breaking a linked chest
    /// unlinks it.
    pub async fn on_block_break(&self, _actor: &Actor, pos: &BlockPos) -> EventOutcome {
        let config = self.registry.config();
        if self.registry.is_collector(pos).await {
            if self.registry.remove(pos).await.is_some() {
                return EventOutcome::allow(config.messages.get(MessageKey::CollectorRemoved));
            }
            return EventOutcome::ignored();
        }
        if self.registry.unlink_container(pos).await {
            return EventOutcome::allow(config.messages.get(MessageKey::ChestUnlinked));
        }
        EventOutcome::ignored()
    }

    /// The actor used (right-clicked) the block at `pos`.
    pub async fn on_interact(&self, actor: &Actor, pos: &BlockPos) -> EventOutcome {
        let config = self.registry.config();
        let messages = &config.messages;

        if self.registry.is_linking(actor.id).await {
            let is_chest = self
                .registry
                .world()
                .block_kind(pos)
                .is_some_and(|k| k.is_storage_container());
            if !is_chest {
                self.registry.end_linking(actor.id).await;
                return EventOutcome::cancel(vec![messages.get(MessageKey::ChestLinkingCancelled)]);
            }

            let Some(id) = self.registry.linking_target(actor.id).await else {
                return EventOutcome::cancel(vec![messages.get(MessageKey::ChestLinkingCancelled)]);
            };
            if self.registry.is_container_linked(pos).await {
                // The session stays open so the actor can pick another chest.
                return EventOutcome::cancel(vec![messages.get(MessageKey::ChestAlreadyLinked)]);
            }

            let outcome = self.registry.link_container(id, pos).await;
            self.registry.end_linking(actor.id).await;
            let key = match outcome {
                LinkOutcome::Linked => MessageKey::ChestLinked,
                LinkOutcome::AlreadyLinked => MessageKey::ChestAlreadyLinked,
                LinkOutcome::Full => MessageKey::MaxLinkedChestsReached,
                LinkOutcome::NotAContainer | LinkOutcome::UnknownCollector => {
                    MessageKey::ChestLinkingCancelled
                }
            };
            return EventOutcome::cancel(vec![messages.get(key)]);
        }

        let Some((id, record)) = self.registry.get(pos).await else {
            return EventOutcome::ignored();
        };
        if !actor.has(Permission::Use) {
            return EventOutcome::cancel(vec![messages.get(MessageKey::NoPermission)]);
        }
        EventOutcome::cancel(management_view(id, &record, &config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::fixture;
    use crate::world::BlockKind;

    fn pos(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new("world", x, y, z)
    }

    #[tokio::test]
    async fn test_place_ignores_other_blocks() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());
        f.world.set_block(pos(0, 64, 0), BlockKind::Chest);
        assert_eq!(
            listener.on_block_place(&f.owner, &pos(0, 64, 0)).await,
            EventOutcome::ignored()
        );
        assert!(f.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_place_creates_and_second_in_region_is_cancelled() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());

        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        let outcome = listener.on_block_place(&f.owner, &pos(0, 64, 0)).await;
        assert!(!outcome.cancelled);
        assert!(f.registry.is_collector(&pos(0, 64, 0)).await);

        f.world.set_block(pos(3, 64, 3), BlockKind::Hopper);
        let outcome = listener.on_block_place(&f.owner, &pos(3, 64, 3)).await;
        assert!(outcome.cancelled);
        assert_eq!(
            outcome.messages,
            vec!["[Harvest] You've reached the maximum number of collectors in this chunk.".to_string()]
        );
        assert_eq!(f.registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_place_rejection_message_matches_reason() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());
        let bypass = f.owner.clone().with_permissions([Permission::BypassLimit]);

        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        listener.on_block_place(&bypass, &pos(0, 64, 0)).await;
        let outcome = listener.on_block_place(&bypass, &pos(0, 64, 0)).await;
        assert!(outcome.cancelled);
        assert_eq!(
            outcome.messages,
            vec!["[Harvest] This block is already a collector.".to_string()]
        );
        assert_eq!(f.registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_place_without_permission() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());
        let guest = Actor::player(f.world.add_player("Guest", "world"), "Guest");
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        let outcome = listener.on_block_place(&guest, &pos(0, 64, 0)).await;
        assert!(outcome.cancelled);
        assert!(f.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_break_anchor_and_linked_chest() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        listener.on_block_place(&f.owner, &pos(0, 64, 0)).await;
        assert!(f.registry.is_container_linked(&pos(1, 64, 0)).await);

        let outcome = listener.on_block_break(&f.owner, &pos(1, 64, 0)).await;
        assert_eq!(outcome.messages, vec!["[Harvest] Chest unlinked.".to_string()]);
        assert!(!f.registry.is_container_linked(&pos(1, 64, 0)).await);

        let outcome = listener.on_block_break(&f.owner, &pos(0, 64, 0)).await;
        assert_eq!(outcome.messages, vec!["[Harvest] Collector removed.".to_string()]);
        assert!(f.registry.is_empty().await);

        let outcome = listener.on_block_break(&f.owner, &pos(5, 5, 5)).await;
        assert_eq!(outcome, EventOutcome::ignored());
    }

    #[tokio::test]
    async fn test_link_session_flow() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        let id = f.registry.create(&f.owner, &pos(0, 64, 0)).await.unwrap().id;
        f.world.set_block(pos(2, 64, 0), BlockKind::Chest);
        f.world.set_block(pos(0, 65, 0), BlockKind::Solid);

        // Anything but a chest cancels the session.
        f.registry.begin_linking(f.owner.id, id).await;
        let outcome = listener.on_interact(&f.owner, &pos(0, 65, 0)).await;
        assert_eq!(outcome.messages, vec!["[Harvest] Chest linking cancelled.".to_string()]);
        assert!(!f.registry.is_linking(f.owner.id).await);

        f.registry.begin_linking(f.owner.id, id).await;
        let outcome = listener.on_interact(&f.owner, &pos(2, 64, 0)).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.messages, vec!["[Harvest] Chest linked successfully!".to_string()]);
        assert!(!f.registry.is_linking(f.owner.id).await);
        assert_eq!(f.registry.linked_owner_id(&pos(2, 64, 0)).await, Some(id));

        // An already linked chest keeps the session open.
        f.registry.begin_linking(f.owner.id, id).await;
        let outcome = listener.on_interact(&f.owner, &pos(2, 64, 0)).await;
        assert_eq!(
            outcome.messages,
            vec!["[Harvest] This chest is already linked to a collector.".to_string()]
        );
        assert!(f.registry.is_linking(f.owner.id).await);
    }

    #[tokio::test]
    async fn test_link_session_full() {
        let f = fixture().await;
        let mut config = (*f.config.current()).clone();
        config.chest_linking.auto_linking_enabled = false;
        config.chest_linking.max_manual_linked = 1;
        f.config.replace(config).unwrap();

        let listener = BlockListener::new(f.registry.clone());
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        let id = f.registry.create(&f.owner, &pos(0, 64, 0)).await.unwrap().id;
        f.world.set_block(pos(1, 64, 0), BlockKind::Chest);
        f.world.set_block(pos(2, 64, 0), BlockKind::Chest);
        f.registry.link_container(id, &pos(1, 64, 0)).await;

        f.registry.begin_linking(f.owner.id, id).await;
        let outcome = listener.on_interact(&f.owner, &pos(2, 64, 0)).await;
        assert_eq!(
            outcome.messages,
            vec!["[Harvest] You've reached the maximum number of linked chests.".to_string()]
        );
        assert!(!f.registry.is_linking(f.owner.id).await);
    }

    #[tokio::test]
    async fn test_interact_opens_view() {
        let f = fixture().await;
        let listener = BlockListener::new(f.registry.clone());
        f.world.set_block(pos(0, 64, 0), BlockKind::Hopper);
        let id = f.registry.create(&f.owner, &pos(0, 64, 0)).await.unwrap().id;

        let outcome = listener.on_interact(&f.owner, &pos(0, 64, 0)).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.messages[0], format!("Collector {}", id));

        let outcome = listener.on_interact(&f.owner, &pos(9, 64, 9)).await;
        assert_eq!(outcome, EventOutcome::ignored());
    }
}

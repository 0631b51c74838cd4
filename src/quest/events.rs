//! Quest Event Types
//!
//! Notifications published by the quest engine after each state change.

use super::definition::{QuestId, QuestRef};
use crate::channel::EventChannel;

/// Payload shared by the per-quest notifications
#[derive(Debug, Clone)]
pub struct QuestNotice {
    pub quest: QuestRef,
}

impl QuestNotice {
    pub fn id(&self) -> &QuestId {
        &self.quest.id
    }
}

#[derive(Debug, Clone)]
pub struct ObjectiveNotice {
    pub quest: QuestRef,
    pub index: usize,
}

impl ObjectiveNotice {
    pub fn description(&self) -> &str {
        self.quest
            .objectives
            .get(self.index)
            .map(|o| o.description.as_str())
            .unwrap_or_default()
    }
}

/// Every channel the quest engine publishes on
#[derive(Debug)]
pub struct QuestEvents {
    pub quest_added: EventChannel<QuestNotice>,
    pub quest_completed: EventChannel<QuestNotice>,
    pub quest_removed: EventChannel<QuestNotice>,
    pub quest_available: EventChannel<QuestNotice>,
    pub objective_completed: EventChannel<ObjectiveNotice>,
    /// Bookkeeping was wiped or replaced wholesale
    pub quests_reset: EventChannel<()>,
}

impl QuestEvents {
    pub fn new() -> Self {
        Self {
            quest_added: EventChannel::new("quest_added"),
            quest_completed: EventChannel::new("quest_completed"),
            quest_removed: EventChannel::new("quest_removed"),
            quest_available: EventChannel::new("quest_available"),
            objective_completed: EventChannel::new("objective_completed"),
            quests_reset: EventChannel::new("quests_reset"),
        }
    }
}

impl Default for QuestEvents {
    fn default() -> Self {
        Self::new()
    }
}

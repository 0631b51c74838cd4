//! Quest System Module
//!
//! Quests authored in TOML, tracked by a single engine that owns all
//! progress and announces every change on typed event channels.

pub mod definition;
pub mod engine;
pub mod events;
pub mod registry;
pub mod state;
pub mod tracker;

pub use definition::{Objective, Quest, QuestId, QuestRef, Reward};
pub use engine::QuestEngine;
pub use events::{ObjectiveNotice, QuestEvents, QuestNotice};
pub use registry::QuestCatalog;
pub use state::{ProgressSnapshot, QuestProgress, QuestStatus};
pub use tracker::DelayedObjective;

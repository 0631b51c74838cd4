//! Game progression core: quests with objectives and follow-up chains, and
//! branching dialogs that are typed out over time and can grant quests.
//!
//! Everything runs on the caller's thread. Time only moves when the host
//! calls [`Progression::tick`].

pub mod channel;
pub mod config;
pub mod context;
pub mod dialog;
pub mod error;
pub mod quest;
pub mod scheduler;

pub use channel::{EventChannel, SubscriptionId};
pub use config::{DialogConfig, ProgressionConfig, TrackerConfig};
pub use context::Progression;
pub use error::{CatalogError, ConfigError, DialogError, ErrorKind, QuestError, SnapshotError};
pub use scheduler::{Generation, Scheduler, Ticket, TimerId};

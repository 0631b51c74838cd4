//! Dialog System
//!
//! Branching conversations typed out over time, with choices that can grant
//! quests or lead into other dialogs.

pub mod definition;
pub mod engine;
pub mod events;
pub mod presenter;
pub mod registry;
pub mod state;

pub use definition::{Dialog, DialogChoice, DialogId, DialogLine, DialogRef, Speaker};
pub use engine::DialogEngine;
pub use events::{DialogEvents, DialogNotice};
pub use presenter::{DialogPresenter, NullControls, NullPresenter, PlayerControls};
pub use registry::{DanglingReference, DialogCatalog};
pub use state::{ChoiceOption, DialogPhase, LineView};

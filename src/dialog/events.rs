//! Dialog Event Types

use super::definition::{DialogId, DialogRef};
use crate::channel::EventChannel;

#[derive(Debug, Clone)]
pub struct DialogNotice {
    pub dialog: DialogRef,
}

impl DialogNotice {
    pub fn id(&self) -> &DialogId {
        &self.dialog.id
    }
}

/// Every channel the dialog engine publishes on
#[derive(Debug)]
pub struct DialogEvents {
    /// A dialog was put on screen, including continuations reached by choices
    pub show_dialog: EventChannel<DialogNotice>,
    /// The dialog box should go away (normal end or forced close)
    pub hide_dialog: EventChannel<()>,
    /// A conversation ran to its end; carries the last dialog shown
    pub dialog_complete: EventChannel<DialogNotice>,
}

impl DialogEvents {
    pub fn new() -> Self {
        Self {
            show_dialog: EventChannel::new("show_dialog"),
            hide_dialog: EventChannel::new("hide_dialog"),
            dialog_complete: EventChannel::new("dialog_complete"),
        }
    }
}

impl Default for DialogEvents {
    fn default() -> Self {
        Self::new()
    }
}

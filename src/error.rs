//! Error Types
//!
//! Engine errors never escape to callers: the engine that detects one logs it
//! and treats the call as a no-op. Loader and config errors are ordinary
//! `Result` errors.

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dialog::DialogId;
use crate::quest::{QuestId, QuestStatus};

/// Coarse classification of a rejected engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown quest or dialog, or an empty dialog
    InvalidReference,
    /// Objective or choice index beyond the available count
    OutOfRange,
    /// Operation not allowed in the current state
    IllegalTransition,
    /// Repeat of something that already happened
    Redundant,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::IllegalTransition => "illegal_transition",
            ErrorKind::Redundant => "redundant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("unknown quest '{0}'")]
    UnknownQuest(QuestId),
    #[error("objective {index} out of range for quest '{quest}' ({count} objectives)")]
    ObjectiveOutOfRange {
        quest: QuestId,
        index: usize,
        count: usize,
    },
    #[error("quest '{quest}' is {status}, not active")]
    NotActive { quest: QuestId, status: QuestStatus },
    #[error("quest '{0}' is already active")]
    AlreadyActive(QuestId),
    #[error("quest '{0}' is already completed")]
    AlreadyCompleted(QuestId),
    #[error("quest '{0}' is already available")]
    AlreadyAvailable(QuestId),
    #[error("objective {index} of quest '{quest}' is already completed")]
    ObjectiveAlreadyCompleted { quest: QuestId, index: usize },
}

impl QuestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuestError::UnknownQuest(_) => ErrorKind::InvalidReference,
            QuestError::ObjectiveOutOfRange { .. } => ErrorKind::OutOfRange,
            QuestError::NotActive { .. } => ErrorKind::IllegalTransition,
            QuestError::AlreadyActive(_)
            | QuestError::AlreadyCompleted(_)
            | QuestError::AlreadyAvailable(_)
            | QuestError::ObjectiveAlreadyCompleted { .. } => ErrorKind::Redundant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    #[error("unknown dialog '{0}'")]
    UnknownDialog(DialogId),
    #[error("dialog '{0}' has no lines")]
    EmptyDialog(DialogId),
    #[error("a dialog is already in progress")]
    Busy,
    #[error("dialog cooldown has not elapsed")]
    CoolingDown,
    #[error("no dialog is in progress")]
    NoActiveDialog,
    #[error("dialog is not waiting for {0}")]
    UnexpectedInput(&'static str),
    #[error("choice {index} out of range ({count} choices)")]
    ChoiceOutOfRange { index: usize, count: usize },
}

impl DialogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DialogError::UnknownDialog(_) | DialogError::EmptyDialog(_) => {
                ErrorKind::InvalidReference
            }
            DialogError::ChoiceOutOfRange { .. } => ErrorKind::OutOfRange,
            DialogError::Busy
            | DialogError::CoolingDown
            | DialogError::UnexpectedInput(_) => ErrorKind::IllegalTransition,
            DialogError::NoActiveDialog => ErrorKind::Redundant,
        }
    }
}

/// Log a rejected engine call at a level matching its kind
pub(crate) fn report(operation: &'static str, kind: ErrorKind, error: &dyn std::fmt::Display) {
    match kind {
        ErrorKind::Redundant => debug!(operation, kind = kind.as_str(), "ignored: {}", error),
        _ => warn!(operation, kind = kind.as_str(), "rejected: {}", error),
    }
}

/// Errors raised while loading quest or dialog definitions
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid definition '{id}': {reason}")]
    Invalid { id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quest_error_kinds() {
        let id = QuestId::from("q");
        assert_eq!(QuestError::UnknownQuest(id.clone()).kind(), ErrorKind::InvalidReference);
        assert_eq!(
            QuestError::ObjectiveOutOfRange { quest: id.clone(), index: 3, count: 2 }.kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(
            QuestError::NotActive { quest: id.clone(), status: QuestStatus::Inactive }.kind(),
            ErrorKind::IllegalTransition
        );
        assert_eq!(QuestError::AlreadyActive(id).kind(), ErrorKind::Redundant);
    }

    #[test]
    fn test_error_messages() {
        let err = QuestError::ObjectiveOutOfRange { quest: QuestId::from("cellar"), index: 4, count: 2 };
        assert_eq!(err.to_string(), "objective 4 out of range for quest 'cellar' (2 objectives)");

        let err = DialogError::ChoiceOutOfRange { index: 2, count: 1 };
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(err.to_string(), "choice 2 out of range (1 choices)");
    }
}

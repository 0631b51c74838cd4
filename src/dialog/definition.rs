//! Dialog Definition Structures
//!
//! Conversations are authored as TOML files: an ordered list of lines, where
//! a line may offer choices that grant quests or branch into another dialog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::error::CatalogError;
use crate::quest::QuestId;

/// Stable identifier of a dialog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogId(String);

impl DialogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DialogId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DialogId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Raw Structures (as they appear in TOML)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawDialogFile {
    pub dialog: RawDialog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDialog {
    pub id: String,
    #[serde(default)]
    pub lines: Vec<RawDialogLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDialogLine {
    pub text: String,
    #[serde(default)]
    pub speaker: Option<Speaker>,
    #[serde(default)]
    pub choices: Vec<RawDialogChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDialogChoice {
    pub text: String,
    #[serde(default)]
    pub grants_quest: Option<String>,
    #[serde(default)]
    pub next_dialog: Option<String>,
}

// ============================================================================
// Resolved Dialog Structures
// ============================================================================

/// Who is talking; the portrait is an asset path the display resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    #[serde(default)]
    pub portrait: Option<String>,
}

impl Speaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portrait: None,
        }
    }

    pub fn with_portrait(mut self, portrait: impl Into<String>) -> Self {
        self.portrait = Some(portrait.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogChoice {
    pub text: String,
    pub grants_quest: Option<QuestId>,
    /// `None` ends the conversation
    pub next_dialog: Option<DialogId>,
}

impl DialogChoice {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grants_quest: None,
            next_dialog: None,
        }
    }

    pub fn granting(mut self, quest: impl Into<String>) -> Self {
        self.grants_quest = Some(QuestId::new(quest));
        self
    }

    pub fn leading_to(mut self, dialog: impl Into<String>) -> Self {
        self.next_dialog = Some(DialogId::new(dialog));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogLine {
    pub text: String,
    pub speaker: Option<Speaker>,
    /// Empty: advance on input. Otherwise the player must pick one.
    pub choices: Vec<DialogChoice>,
}

impl DialogLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker: None,
            choices: Vec::new(),
        }
    }

    pub fn spoken_by(mut self, speaker: Speaker) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_choice(mut self, choice: DialogChoice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Length in characters, which is what the reveal counts
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// The first `chars` characters of the text
    pub fn revealed(&self, chars: usize) -> &str {
        match self.text.char_indices().nth(chars) {
            Some((byte, _)) => &self.text[..byte],
            None => &self.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    pub id: DialogId,
    pub lines: Vec<DialogLine>,
}

pub type DialogRef = Rc<Dialog>;

impl Dialog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: DialogId::new(id),
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: DialogLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&DialogLine> {
        self.lines.get(index)
    }

    /// Dialogs reachable in one step through choices
    pub fn branches(&self) -> impl Iterator<Item = &DialogId> {
        self.lines
            .iter()
            .flat_map(|line| line.choices.iter())
            .filter_map(|choice| choice.next_dialog.as_ref())
    }

    /// Create a Dialog from raw TOML data
    pub fn from_raw(raw: &RawDialog) -> Result<Self, CatalogError> {
        if raw.lines.is_empty() {
            return Err(CatalogError::Invalid {
                id: raw.id.clone(),
                reason: "dialog has no lines".to_string(),
            });
        }

        let lines = raw
            .lines
            .iter()
            .map(|line| DialogLine {
                text: line.text.clone(),
                speaker: line.speaker.clone(),
                choices: line
                    .choices
                    .iter()
                    .map(|c| DialogChoice {
                        text: c.text.clone(),
                        grants_quest: c.grants_quest.clone().map(QuestId::from),
                        next_dialog: c.next_dialog.clone().map(DialogId::from),
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            id: DialogId::new(raw.id.clone()),
            lines,
        })
    }
}

//! Dialog Session State
//!
//! The transient state of the one conversation that may be on screen.

use std::fmt;

use super::definition::{DialogLine, DialogRef, Speaker};
use crate::quest::QuestId;
use crate::scheduler::TimerId;

/// Where the conversation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogPhase {
    #[default]
    Idle,
    /// Revealing the current line character by character
    Typing,
    /// Line fully shown, waiting for the player to continue
    AwaitingAdvance,
    /// Line fully shown, waiting for the player to pick a choice
    AwaitingChoice,
    /// A choice was picked; waiting out the cleanup / follow-up delays
    Transitioning,
}

impl DialogPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogPhase::Idle => "idle",
            DialogPhase::Typing => "typing",
            DialogPhase::AwaitingAdvance => "awaiting_advance",
            DialogPhase::AwaitingChoice => "awaiting_choice",
            DialogPhase::Transitioning => "transitioning",
        }
    }
}

impl fmt::Display for DialogPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A choice as offered to the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub index: usize,
    pub text: String,
    pub grants_quest: Option<QuestId>,
}

impl ChoiceOption {
    pub(crate) fn for_line(line: &DialogLine) -> Vec<ChoiceOption> {
        line.choices
            .iter()
            .enumerate()
            .map(|(index, choice)| ChoiceOption {
                index,
                text: choice.text.clone(),
                grants_quest: choice.grants_quest.clone(),
            })
            .collect()
    }
}

/// Copy of the line currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct LineView {
    pub index: usize,
    pub speaker: Option<Speaker>,
    pub full_text: String,
    pub visible_text: String,
    pub is_last: bool,
}

#[derive(Debug)]
pub(crate) struct DialogSession {
    pub dialog: DialogRef,
    pub line: usize,
    /// Characters of the current line shown so far
    pub revealed: usize,
    pub phase: DialogPhase,
    pub options: Vec<ChoiceOption>,
    /// Next reveal step or transition continuation
    pub timer: Option<TimerId>,
}

impl DialogSession {
    pub fn new(dialog: DialogRef) -> Self {
        Self {
            dialog,
            line: 0,
            revealed: 0,
            phase: DialogPhase::Typing,
            options: Vec::new(),
            timer: None,
        }
    }

    pub fn current_line(&self) -> &DialogLine {
        &self.dialog.lines[self.line]
    }

    pub fn is_last_line(&self) -> bool {
        self.line + 1 >= self.dialog.lines.len()
    }

    pub fn visible_text(&self) -> &str {
        self.current_line().revealed(self.revealed)
    }

    pub fn view(&self) -> LineView {
        let line = self.current_line();
        LineView {
            index: self.line,
            speaker: line.speaker.clone(),
            full_text: line.text.clone(),
            visible_text: self.visible_text().to_string(),
            is_last: self.is_last_line(),
        }
    }
}

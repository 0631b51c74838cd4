//! Quest State Tracking
//!
//! Per-quest status and objective flags, plus the serializable snapshot used
//! by save/load collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::definition::QuestId;
use crate::error::SnapshotError;

/// Lifecycle of a quest; only ever moves forward until a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    #[default]
    Inactive,
    Active,
    Completed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Inactive => "inactive",
            QuestStatus::Active => "active",
            QuestStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-owned mutable state of one quest
#[derive(Debug, Clone)]
pub(crate) struct QuestRecord {
    pub status: QuestStatus,
    pub objectives: Vec<bool>,
    /// Bumped on every reset so delayed confirmations can detect staleness
    pub epoch: u64,
    pub activated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuestRecord {
    pub fn new(objective_count: usize) -> Self {
        Self {
            status: QuestStatus::Inactive,
            objectives: vec![false; objective_count],
            epoch: 0,
            activated_at: None,
            completed_at: None,
        }
    }

    pub fn activate(&mut self) {
        self.status = QuestStatus::Active;
        self.objectives.iter_mut().for_each(|o| *o = false);
        self.activated_at = Some(Utc::now());
        self.completed_at = None;
    }

    pub fn complete(&mut self) {
        self.status = QuestStatus::Completed;
        self.objectives.iter_mut().for_each(|o| *o = true);
        self.completed_at = Some(Utc::now());
    }

    pub fn reset(&mut self) {
        self.status = QuestStatus::Inactive;
        self.objectives.iter_mut().for_each(|o| *o = false);
        self.epoch += 1;
        self.activated_at = None;
        self.completed_at = None;
    }

    /// Vacuously true for a quest without objectives
    pub fn all_objectives_complete(&self) -> bool {
        self.objectives.iter().all(|done| *done)
    }

    pub fn progress(&self, quest: &QuestId) -> QuestProgress {
        QuestProgress {
            quest: quest.clone(),
            status: self.status,
            objectives: self.objectives.clone(),
            activated_at: self.activated_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only copy of a quest's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub quest: QuestId,
    pub status: QuestStatus,
    pub objectives: Vec<bool>,
    pub activated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuestProgress {
    pub fn completed_objectives(&self) -> usize {
        self.objectives.iter().filter(|done| **done).count()
    }

    pub fn progress_percent(&self) -> f32 {
        if self.objectives.is_empty() {
            return if self.status == QuestStatus::Completed { 1.0 } else { 0.0 };
        }
        self.completed_objectives() as f32 / self.objectives.len() as f32
    }
}

/// Saved quest bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub active: Vec<QuestId>,
    pub completed: Vec<QuestId>,
    pub available: Vec<QuestId>,
    /// Progress of every quest that has left the inactive state
    pub quests: BTreeMap<QuestId, QuestProgress>,
}

impl ProgressSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

//! Quest Definition Structures
//!
//! These structures are deserialized from TOML quest files. Definitions are
//! immutable once resolved; progress lives in the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::error::CatalogError;

/// Stable identifier of a quest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestId(String);

impl QuestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for QuestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Raw Structures (as they appear in TOML)
// ============================================================================

/// A quest definition file
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Follow-ups wait in the available list instead of starting on their own
    #[serde(default)]
    pub requires_manual_acceptance: bool,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<RawObjective>,
    #[serde(default)]
    pub rewards: Vec<RawReward>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawObjective {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReward {
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// A single completable step of a quest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Objective {
    pub description: String,
}

/// Reward descriptor, interpreted by whoever pays out rewards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reward {
    pub kind: String,
    pub value: String,
}

/// A fully resolved quest definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quest {
    pub id: QuestId,
    pub name: String,
    pub description: String,
    pub objectives: Vec<Objective>,
    pub rewards: Vec<Reward>,
    /// Quests promoted when this one completes
    pub follow_ups: Vec<QuestId>,
    pub requires_manual_acceptance: bool,
}

/// Shared read-only handle to a definition
pub type QuestRef = Rc<Quest>;

impl Quest {
    /// Create a Quest from raw TOML data
    pub fn from_raw(raw: &RawQuest) -> Result<Self, CatalogError> {
        if raw.id.trim().is_empty() {
            return Err(CatalogError::Invalid {
                id: raw.name.clone(),
                reason: "quest id is empty".to_string(),
            });
        }

        if raw.follow_ups.iter().any(|f| f == &raw.id) {
            return Err(CatalogError::Invalid {
                id: raw.id.clone(),
                reason: "quest lists itself as a follow-up".to_string(),
            });
        }

        Ok(Self {
            id: QuestId::new(raw.id.clone()),
            name: raw.name.clone(),
            description: raw.description.clone(),
            objectives: raw
                .objectives
                .iter()
                .map(|o| Objective {
                    description: o.description.clone(),
                })
                .collect(),
            rewards: raw
                .rewards
                .iter()
                .map(|r| Reward {
                    kind: r.kind.clone(),
                    value: r.value.clone(),
                })
                .collect(),
            follow_ups: raw.follow_ups.iter().map(|f| QuestId::new(f.clone())).collect(),
            requires_manual_acceptance: raw.requires_manual_acceptance,
        })
    }

    /// Build a quest in code
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: QuestId::new(id),
            name: name.into(),
            description: String::new(),
            objectives: Vec::new(),
            rewards: Vec::new(),
            follow_ups: Vec::new(),
            requires_manual_acceptance: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_objective(mut self, description: impl Into<String>) -> Self {
        self.objectives.push(Objective {
            description: description.into(),
        });
        self
    }

    pub fn with_reward(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.rewards.push(Reward {
            kind: kind.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_follow_up(mut self, quest: impl Into<String>) -> Self {
        self.follow_ups.push(QuestId::new(quest));
        self
    }

    pub fn manual_acceptance(mut self) -> Self {
        self.requires_manual_acceptance = true;
        self
    }

    pub fn objective_count(&self) -> usize {
        self.objectives.len()
    }
}

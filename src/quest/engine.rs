//! Quest Engine
//!
//! Sole writer of quest and objective state. Every operation validates its
//! input, applies the change with the bookkeeping borrowed, releases the
//! borrow, and only then publishes, so handlers are free to call back in.
//! Rejected calls are logged and ignored.

use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::definition::{Quest, QuestId, QuestRef};
use super::events::{ObjectiveNotice, QuestEvents, QuestNotice};
use super::registry::QuestCatalog;
use super::state::{ProgressSnapshot, QuestProgress, QuestRecord, QuestStatus};
use crate::error::{QuestError, report};

pub struct QuestEngine {
    book: RefCell<QuestBook>,
    events: QuestEvents,
}

/// Definitions plus the authoritative active/completed/available sets
struct QuestBook {
    catalog: QuestCatalog,
    records: HashMap<QuestId, QuestRecord>,
    active: Vec<QuestId>,
    completed: Vec<QuestId>,
    available: Vec<QuestId>,
}

impl QuestBook {
    fn new(catalog: QuestCatalog) -> Self {
        let records = catalog
            .iter()
            .map(|quest| (quest.id.clone(), QuestRecord::new(quest.objective_count())))
            .collect();

        Self {
            catalog,
            records,
            active: Vec::new(),
            completed: Vec::new(),
            available: Vec::new(),
        }
    }

    fn entry(&mut self, id: &QuestId) -> Result<(QuestRef, &mut QuestRecord), QuestError> {
        let quest = self
            .catalog
            .get(id)
            .ok_or_else(|| QuestError::UnknownQuest(id.clone()))?;
        let record = self
            .records
            .entry(id.clone())
            .or_insert_with(|| QuestRecord::new(quest.objective_count()));
        Ok((quest, record))
    }

    fn status(&self, id: &QuestId) -> Option<QuestStatus> {
        self.records.get(id).map(|r| r.status)
    }

    fn is_tracked(&self, id: &QuestId) -> bool {
        self.available.contains(id)
            || matches!(self.status(id), Some(QuestStatus::Active | QuestStatus::Completed))
    }

    fn is_ready(&self, id: &QuestId) -> bool {
        self.records
            .get(id)
            .is_some_and(|r| r.status == QuestStatus::Active && r.all_objectives_complete())
    }

    fn resolve(&self, ids: &[QuestId]) -> Vec<QuestRef> {
        ids.iter().filter_map(|id| self.catalog.get(id)).collect()
    }

    fn activate(&mut self, id: &QuestId) -> Result<QuestRef, QuestError> {
        let (quest, record) = self.entry(id)?;
        match record.status {
            QuestStatus::Active => return Err(QuestError::AlreadyActive(id.clone())),
            QuestStatus::Completed => return Err(QuestError::AlreadyCompleted(id.clone())),
            QuestStatus::Inactive => record.activate(),
        }

        self.available.retain(|q| q != id);
        self.active.push(id.clone());
        Ok(quest)
    }

    fn mark_objective(&mut self, id: &QuestId, index: usize) -> Result<QuestRef, QuestError> {
        let (quest, record) = self.entry(id)?;
        let count = record.objectives.len();

        if index >= count {
            return Err(QuestError::ObjectiveOutOfRange {
                quest: id.clone(),
                index,
                count,
            });
        }
        if record.status != QuestStatus::Active {
            return Err(QuestError::NotActive {
                quest: id.clone(),
                status: record.status,
            });
        }
        if record.objectives[index] {
            return Err(QuestError::ObjectiveAlreadyCompleted {
                quest: id.clone(),
                index,
            });
        }

        record.objectives[index] = true;
        Ok(quest)
    }

    fn finish(&mut self, id: &QuestId) -> Result<QuestRef, QuestError> {
        let (quest, record) = self.entry(id)?;
        match record.status {
            QuestStatus::Active => record.complete(),
            QuestStatus::Completed => return Err(QuestError::AlreadyCompleted(id.clone())),
            QuestStatus::Inactive => {
                return Err(QuestError::NotActive {
                    quest: id.clone(),
                    status: QuestStatus::Inactive,
                });
            }
        }

        self.active.retain(|q| q != id);
        self.completed.push(id.clone());
        Ok(quest)
    }

    fn offer(&mut self, id: &QuestId) -> Result<QuestRef, QuestError> {
        let (quest, record) = self.entry(id)?;
        match record.status {
            QuestStatus::Active => return Err(QuestError::AlreadyActive(id.clone())),
            QuestStatus::Completed => return Err(QuestError::AlreadyCompleted(id.clone())),
            QuestStatus::Inactive => {}
        }
        if self.available.contains(id) {
            return Err(QuestError::AlreadyAvailable(id.clone()));
        }

        self.available.push(id.clone());
        Ok(quest)
    }

    /// Returns the quest and whether it was active or available beforehand
    fn reset_one(&mut self, id: &QuestId) -> Result<(QuestRef, bool), QuestError> {
        let (quest, record) = self.entry(id)?;
        let was_active = record.status == QuestStatus::Active;
        record.reset();

        let was_available = self.available.contains(id);
        self.active.retain(|q| q != id);
        self.completed.retain(|q| q != id);
        self.available.retain(|q| q != id);
        Ok((quest, was_active || was_available))
    }

    fn reset_all(&mut self) {
        self.active.clear();
        self.completed.clear();
        self.available.clear();
        for record in self.records.values_mut() {
            record.reset();
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            active: self.active.clone(),
            completed: self.completed.clone(),
            available: self.available.clone(),
            quests: self
                .records
                .iter()
                .filter(|(_, r)| r.status != QuestStatus::Inactive)
                .map(|(id, r)| (id.clone(), r.progress(id)))
                .collect(),
        }
    }

    /// Replace all bookkeeping with a snapshot; returns restored quest count
    fn restore(&mut self, snapshot: &ProgressSnapshot) -> usize {
        self.reset_all();

        let mut restored = 0;
        for (id, progress) in &snapshot.quests {
            let Ok((quest, record)) = self.entry(id) else {
                warn!("Snapshot references unknown quest '{}', skipping", id);
                continue;
            };

            let count = quest.objective_count();
            if progress.objectives.len() != count {
                warn!(
                    "Snapshot of quest '{}' has {} objective flags, definition has {}",
                    id,
                    progress.objectives.len(),
                    count
                );
            }

            record.status = progress.status;
            record.objectives = (0..count)
                .map(|i| progress.objectives.get(i).copied().unwrap_or(false))
                .collect();
            if record.status == QuestStatus::Completed {
                record.objectives.iter_mut().for_each(|o| *o = true);
            }
            record.activated_at = progress.activated_at;
            record.completed_at = progress.completed_at;
            restored += 1;
        }

        // Status is authoritative; lists keep the saved order
        self.active = self.ordered(&snapshot.active, QuestStatus::Active);
        self.completed = self.ordered(&snapshot.completed, QuestStatus::Completed);
        self.available = snapshot
            .available
            .iter()
            .filter(|id| self.status(id) == Some(QuestStatus::Inactive))
            .cloned()
            .collect();
        self.available.dedup();

        restored
    }

    fn ordered(&self, saved: &[QuestId], status: QuestStatus) -> Vec<QuestId> {
        let mut ids: Vec<QuestId> = Vec::new();
        for id in saved {
            if self.status(id) == Some(status) && !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        let mut missing: Vec<QuestId> = self
            .records
            .iter()
            .filter(|(id, r)| r.status == status && !ids.contains(id))
            .map(|(id, _)| id.clone())
            .collect();
        missing.sort();
        ids.extend(missing);
        ids
    }
}

impl QuestEngine {
    pub fn new(catalog: QuestCatalog) -> Self {
        info!("Quest engine tracking {} quests", catalog.len());
        Self {
            book: RefCell::new(QuestBook::new(catalog)),
            events: QuestEvents::new(),
        }
    }

    pub fn events(&self) -> &QuestEvents {
        &self.events
    }

    /// Add or replace a definition at runtime; a replaced quest starts over
    ///
    /// Replacing a quest that was active, completed or offered publishes
    /// `quest_removed` for the old definition.
    pub fn register(&self, quest: Quest) -> QuestRef {
        let (quest, replaced) = {
            let mut book = self.book.borrow_mut();
            let id = quest.id.clone();
            let count = quest.objective_count();
            let previous = book.is_tracked(&id).then(|| book.catalog.get(&id)).flatten();
            let quest = book.catalog.insert(quest);

            let epoch = book.records.get(&id).map(|r| r.epoch + 1).unwrap_or(0);
            let mut record = QuestRecord::new(count);
            record.epoch = epoch;
            book.records.insert(id.clone(), record);
            book.active.retain(|q| q != &id);
            book.completed.retain(|q| q != &id);
            book.available.retain(|q| q != &id);
            (quest, previous)
        };

        if let Some(previous) = replaced {
            info!("Quest definition replaced while tracked: {}", previous.id);
            self.events.quest_removed.publish(&QuestNotice { quest: previous });
        }
        quest
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Start a quest; removes it from the available list if it was offered
    pub fn add_quest(&self, id: &QuestId) -> bool {
        let result = self.book.borrow_mut().activate(id);
        match result {
            Ok(quest) => {
                info!("Quest added: {} ({})", quest.name, quest.id);
                self.events.quest_added.publish(&QuestNotice { quest });
                true
            }
            Err(e) => {
                report("add_quest", e.kind(), &e);
                false
            }
        }
    }

    /// Mark one objective done, completing the quest once all are done
    pub fn complete_objective(&self, id: &QuestId, index: usize) -> bool {
        let result = self.book.borrow_mut().mark_objective(id, index);
        let quest = match result {
            Ok(quest) => quest,
            Err(e) => {
                report("complete_objective", e.kind(), &e);
                return false;
            }
        };

        info!("Objective {} of quest '{}' completed", index, quest.id);
        self.events
            .objective_completed
            .publish(&ObjectiveNotice { quest, index });

        // Handlers may already have completed or reset the quest
        let ready = self.book.borrow().is_ready(id);
        if ready {
            self.complete_quest(id);
        }
        true
    }

    /// Force-complete an active quest and promote its follow-ups
    pub fn complete_quest(&self, id: &QuestId) -> bool {
        let result = self.book.borrow_mut().finish(id);
        let quest = match result {
            Ok(quest) => quest,
            Err(e) => {
                report("complete_quest", e.kind(), &e);
                return false;
            }
        };

        info!("Quest completed: {} ({})", quest.name, quest.id);
        let notice = QuestNotice { quest };
        self.events.quest_completed.publish(&notice);
        self.events.quest_removed.publish(&notice);

        self.promote_follow_ups(&notice.quest);
        true
    }

    fn promote_follow_ups(&self, quest: &Quest) {
        for follow_up in &quest.follow_ups {
            let target = self.book.borrow().catalog.get(follow_up);
            let Some(target) = target else {
                warn!(
                    "Quest '{}' has unknown follow-up '{}', skipping",
                    quest.id, follow_up
                );
                continue;
            };

            if target.requires_manual_acceptance {
                let result = self.book.borrow_mut().offer(follow_up);
                match result {
                    Ok(offered) => {
                        info!("Quest available: {} ({})", offered.name, offered.id);
                        self.events
                            .quest_available
                            .publish(&QuestNotice { quest: offered });
                    }
                    Err(e) => report("promote_follow_up", e.kind(), &e),
                }
            } else {
                let tracked = self.book.borrow().is_tracked(follow_up);
                if tracked {
                    debug!(
                        "Follow-up '{}' of '{}' already tracked, not re-adding",
                        follow_up, quest.id
                    );
                    continue;
                }
                self.add_quest(follow_up);
            }
        }
    }

    /// Return one quest to inactive with all objectives cleared
    pub fn reset_quest(&self, id: &QuestId) -> bool {
        let result = self.book.borrow_mut().reset_one(id);
        match result {
            Ok((quest, was_tracked)) => {
                info!("Quest reset: {} ({})", quest.name, quest.id);
                if was_tracked {
                    self.events.quest_removed.publish(&QuestNotice { quest });
                }
                true
            }
            Err(e) => {
                report("reset_quest", e.kind(), &e);
                false
            }
        }
    }

    /// Clear every set and return all quests to their initial state
    pub fn reset_all(&self) {
        self.book.borrow_mut().reset_all();
        info!("All quest progress reset");
        self.events.quests_reset.publish(&());
    }

    // ========================================================================
    // Queries (all return copies)
    // ========================================================================

    pub fn quest(&self, id: &QuestId) -> Option<QuestRef> {
        self.book.borrow().catalog.get(id)
    }

    pub fn status(&self, id: &QuestId) -> Option<QuestStatus> {
        self.book.borrow().status(id)
    }

    pub fn progress(&self, id: &QuestId) -> Option<QuestProgress> {
        self.book.borrow().records.get(id).map(|r| r.progress(id))
    }

    /// Reset counter of a quest; changes whenever its progress is wiped
    pub fn epoch(&self, id: &QuestId) -> Option<u64> {
        self.book.borrow().records.get(id).map(|r| r.epoch)
    }

    pub fn is_quest_active(&self, id: &QuestId) -> bool {
        self.status(id) == Some(QuestStatus::Active)
    }

    pub fn is_quest_completed(&self, id: &QuestId) -> bool {
        self.status(id) == Some(QuestStatus::Completed)
    }

    pub fn is_quest_available(&self, id: &QuestId) -> bool {
        self.book.borrow().available.contains(id)
    }

    pub fn is_objective_completed(&self, id: &QuestId, index: usize) -> bool {
        self.book
            .borrow()
            .records
            .get(id)
            .and_then(|r| r.objectives.get(index).copied())
            .unwrap_or(false)
    }

    pub fn active_quests(&self) -> Vec<QuestRef> {
        let book = self.book.borrow();
        book.resolve(&book.active)
    }

    pub fn completed_quests(&self) -> Vec<QuestRef> {
        let book = self.book.borrow();
        book.resolve(&book.completed)
    }

    pub fn available_quests(&self) -> Vec<QuestRef> {
        let book = self.book.borrow();
        book.resolve(&book.available)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.book.borrow().snapshot()
    }

    /// Replace all progress with a saved snapshot
    ///
    /// An active quest saved with every objective done is completed right
    /// after the restore, follow-ups included. Quests without objectives stay
    /// active until completed explicitly.
    pub fn restore(&self, snapshot: &ProgressSnapshot) -> usize {
        let (restored, finished) = {
            let mut book = self.book.borrow_mut();
            let restored = book.restore(snapshot);
            let finished: Vec<QuestId> = book
                .active
                .iter()
                .filter(|id| {
                    book.is_ready(id)
                        && book.catalog.get(id).is_some_and(|q| q.objective_count() > 0)
                })
                .cloned()
                .collect();
            (restored, finished)
        };

        info!("Restored progress for {} quests", restored);
        self.events.quests_reset.publish(&());

        for id in finished {
            // A quests_reset handler may have moved it on already
            let ready = self.book.borrow().is_ready(&id);
            if ready {
                debug!("Restored quest '{}' has every objective done", id);
                self.complete_quest(&id);
            }
        }
        restored
    }
}

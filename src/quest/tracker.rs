//! Objective Trackers
//!
//! Gameplay triggers often only want to count a condition once it has held
//! for a while (an object left in place, a door kept open). A
//! `DelayedObjective` arms a confirmation timer when the condition is
//! observed and completes the objective when the window elapses, unless the
//! condition was retracted or the quest was reset in the meantime.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

use super::definition::QuestId;
use super::engine::QuestEngine;
use crate::scheduler::{Scheduler, TimerId};

pub struct DelayedObjective {
    name: String,
    quest: QuestId,
    index: usize,
    delay: Duration,
    quests: Rc<QuestEngine>,
    scheduler: Rc<Scheduler>,
    /// Armed timer and the quest epoch it was armed under
    pending: Rc<Cell<Option<(TimerId, u64)>>>,
}

impl DelayedObjective {
    pub fn new(
        name: impl Into<String>,
        quest: QuestId,
        index: usize,
        delay: Duration,
        quests: Rc<QuestEngine>,
        scheduler: Rc<Scheduler>,
    ) -> Self {
        Self {
            name: name.into(),
            quest,
            index,
            delay,
            quests,
            scheduler,
            pending: Rc::new(Cell::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// A live confirmation window is running for the current quest run
    pub fn is_pending(&self) -> bool {
        match self.pending.get() {
            Some((timer, epoch)) => {
                self.scheduler.is_scheduled(timer)
                    && self.quests.epoch(&self.quest) == Some(epoch)
            }
            None => false,
        }
    }

    /// The tracked condition became true; start the confirmation window
    ///
    /// A window left over from before a quest reset, or dropped by the
    /// scheduler, does not block a new one.
    pub fn observe(&self) -> bool {
        if self.is_pending() {
            return false;
        }
        if let Some((timer, _)) = self.pending.take() {
            self.scheduler.cancel(timer);
            debug!(tracker = %self.name, "discarding stale confirmation");
        }
        if !self.quests.is_quest_active(&self.quest) {
            debug!(tracker = %self.name, "quest '{}' not active, ignoring", self.quest);
            return false;
        }
        if self.quests.is_objective_completed(&self.quest, self.index) {
            return false;
        }
        let Some(epoch) = self.quests.epoch(&self.quest) else {
            return false;
        };

        let quests = Rc::clone(&self.quests);
        let pending = Rc::clone(&self.pending);
        let quest = self.quest.clone();
        let index = self.index;
        let name = self.name.clone();

        let timer = self.scheduler.schedule(self.delay, move || {
            pending.set(None);
            // A reset in the meantime means this observation belongs to an
            // earlier run of the quest
            if quests.epoch(&quest) != Some(epoch) || !quests.is_quest_active(&quest) {
                debug!(tracker = %name, "confirmation for '{}' is stale, dropping", quest);
                return;
            }
            info!(tracker = %name, "confirmed objective {} of '{}'", index, quest);
            quests.complete_objective(&quest, index);
        });

        self.pending.set(Some((timer, epoch)));
        debug!(tracker = %self.name, delay_ms = self.delay.as_millis() as u64, "confirmation armed");
        true
    }

    /// The tracked condition stopped holding; cancel the pending window
    pub fn retract(&self) -> bool {
        match self.pending.take() {
            Some((timer, _)) => {
                self.scheduler.cancel(timer);
                debug!(tracker = %self.name, "confirmation retracted");
                true
            }
            None => false,
        }
    }
}

impl Drop for DelayedObjective {
    fn drop(&mut self) {
        self.retract();
    }
}

//! Progression Context
//!
//! One value per play session holding the scheduler and both engines.
//! Gameplay code receives a reference to it instead of reaching for globals.

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ProgressionConfig;
use crate::dialog::{DialogCatalog, DialogEngine, DialogPresenter, PlayerControls};
use crate::error::CatalogError;
use crate::quest::{DelayedObjective, QuestCatalog, QuestEngine, QuestId};
use crate::scheduler::Scheduler;

pub struct Progression {
    config: ProgressionConfig,
    scheduler: Rc<Scheduler>,
    quests: Rc<QuestEngine>,
    dialogs: Rc<DialogEngine>,
}

impl Progression {
    pub fn new(
        config: ProgressionConfig,
        quest_catalog: QuestCatalog,
        dialog_catalog: DialogCatalog,
        presenter: Rc<dyn DialogPresenter>,
        controls: Rc<dyn PlayerControls>,
    ) -> Self {
        let scheduler = Rc::new(Scheduler::new());
        let quests = Rc::new(QuestEngine::new(quest_catalog));
        let dialogs = DialogEngine::new(
            config.dialog.clone(),
            dialog_catalog,
            Rc::clone(&quests),
            Rc::clone(&scheduler),
            presenter,
            controls,
        );

        Self {
            config,
            scheduler,
            quests,
            dialogs,
        }
    }

    /// Build from `<data_dir>/quests` and `<data_dir>/dialogs`
    pub fn load(
        data_dir: &Path,
        config: ProgressionConfig,
        presenter: Rc<dyn DialogPresenter>,
        controls: Rc<dyn PlayerControls>,
    ) -> Result<Self, CatalogError> {
        let quest_catalog = QuestCatalog::load_from_directory(&data_dir.join("quests"))?;
        let dialog_catalog = DialogCatalog::load_from_directory(&data_dir.join("dialogs"))?;

        let dangling = dialog_catalog.validate_references(&quest_catalog);
        if !dangling.is_empty() {
            warn!("{} dialog choices point at missing content", dangling.len());
        }

        Ok(Self::new(
            config,
            quest_catalog,
            dialog_catalog,
            presenter,
            controls,
        ))
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn quests(&self) -> &Rc<QuestEngine> {
        &self.quests
    }

    pub fn dialogs(&self) -> &Rc<DialogEngine> {
        &self.dialogs
    }

    /// Advance all pending timers by one frame
    pub fn tick(&self, dt: Duration) -> usize {
        self.scheduler.advance(dt)
    }

    /// Delayed objective tracker using the configured window for `name`
    pub fn tracker(
        &self,
        name: &str,
        quest: impl Into<QuestId>,
        index: usize,
    ) -> DelayedObjective {
        DelayedObjective::new(
            name,
            quest.into(),
            index,
            self.config.trackers.delay_for(name),
            Rc::clone(&self.quests),
            Rc::clone(&self.scheduler),
        )
    }

    /// Close the dialog and drop every pending continuation
    pub fn shutdown(&self) {
        self.dialogs.shutdown();
        let dropped = self.scheduler.pending();
        self.scheduler.clear();
        info!("Progression shut down ({} pending timers dropped)", dropped);
    }
}

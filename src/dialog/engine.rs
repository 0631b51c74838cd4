//! Dialog Engine
//!
//! Owns the single conversation slot. A dialog is typed out line by line
//! through the scheduler; lines with choices wait for `choose`, the rest wait
//! for `advance`. Every continuation carries a generation ticket, so closing
//! or replacing a session silently invalidates whatever it left queued.
//!
//! Like the quest engine, borrows of the session are released before calling
//! the presenter, the controls or any event handler.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info};

use super::definition::{Dialog, DialogChoice, DialogId, DialogRef};
use super::events::{DialogEvents, DialogNotice};
use super::presenter::{DialogPresenter, PlayerControls};
use super::registry::DialogCatalog;
use super::state::{ChoiceOption, DialogPhase, DialogSession, LineView};
use crate::config::DialogConfig;
use crate::error::{DialogError, report};
use crate::quest::QuestEngine;
use crate::scheduler::{Generation, Scheduler, TimerId};

pub struct DialogEngine {
    config: DialogConfig,
    catalog: RefCell<DialogCatalog>,
    quests: Rc<QuestEngine>,
    scheduler: Rc<Scheduler>,
    presenter: Rc<dyn DialogPresenter>,
    controls: Rc<dyn PlayerControls>,
    session: RefCell<Option<DialogSession>>,
    cooldown: Cell<Option<TimerId>>,
    generation: Generation,
    events: DialogEvents,
    this: Weak<DialogEngine>,
}

impl DialogEngine {
    pub fn new(
        config: DialogConfig,
        catalog: DialogCatalog,
        quests: Rc<QuestEngine>,
        scheduler: Rc<Scheduler>,
        presenter: Rc<dyn DialogPresenter>,
        controls: Rc<dyn PlayerControls>,
    ) -> Rc<Self> {
        info!("Dialog engine loaded with {} dialogs", catalog.len());
        Rc::new_cyclic(|this| Self {
            config,
            catalog: RefCell::new(catalog),
            quests,
            scheduler,
            presenter,
            controls,
            session: RefCell::new(None),
            cooldown: Cell::new(None),
            generation: Generation::new(),
            events: DialogEvents::new(),
            this: this.clone(),
        })
    }

    pub fn events(&self) -> &DialogEvents {
        &self.events
    }

    pub fn register(&self, dialog: Dialog) -> DialogRef {
        self.catalog.borrow_mut().insert(dialog)
    }

    pub fn dialog(&self, id: &DialogId) -> Option<DialogRef> {
        self.catalog.borrow().get(id)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// No conversation on screen and the cooldown has elapsed
    pub fn can_start(&self) -> bool {
        self.session.borrow().is_none() && !self.is_cooling_down()
    }

    pub fn is_dialog_active(&self) -> bool {
        self.session.borrow().is_some()
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown.get().is_some()
    }

    pub fn phase(&self) -> DialogPhase {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    pub fn current_dialog(&self) -> Option<DialogRef> {
        self.session.borrow().as_ref().map(|s| Rc::clone(&s.dialog))
    }

    pub fn current_line(&self) -> Option<LineView> {
        self.session.borrow().as_ref().map(DialogSession::view)
    }

    pub fn visible_text(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.visible_text().to_string())
    }

    /// Choices on offer; empty unless waiting for a choice
    pub fn choice_options(&self) -> Vec<ChoiceOption> {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.options.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Player / trigger input
    // ========================================================================

    /// Start a conversation; rejected while another is active or cooling down
    pub fn show_dialog(&self, id: &DialogId) -> bool {
        let result = self.check_start().and_then(|_| self.resolve(id));
        match result {
            Ok(dialog) => {
                self.begin(dialog, true);
                true
            }
            Err(e) => {
                report("show_dialog", e.kind(), &e);
                false
            }
        }
    }

    /// Player pressed "continue"
    pub fn advance(&self) -> bool {
        match self.phase() {
            DialogPhase::Idle => {
                let e = DialogError::NoActiveDialog;
                report("advance", e.kind(), &e);
                false
            }
            DialogPhase::Typing if self.config.skip_typing_on_advance => {
                self.finish_typing();
                true
            }
            DialogPhase::Typing => {
                debug!("Advance ignored while typing");
                false
            }
            DialogPhase::AwaitingAdvance => {
                let next_line = {
                    let mut slot = self.session.borrow_mut();
                    match slot.as_mut() {
                        Some(session) if !session.is_last_line() => {
                            session.line += 1;
                            true
                        }
                        _ => false,
                    }
                };
                if next_line {
                    self.start_line();
                } else {
                    self.end();
                }
                true
            }
            DialogPhase::AwaitingChoice | DialogPhase::Transitioning => {
                let e = DialogError::UnexpectedInput("advance");
                report("advance", e.kind(), &e);
                false
            }
        }
    }

    /// Player picked choice `index` of the current line
    ///
    /// A granted quest is added before this returns. The conversation then
    /// continues after the cleanup delay, and after the follow-up delay too
    /// when the choice leads to another dialog.
    pub fn choose(&self, index: usize) -> bool {
        let choice = match self.take_choice(index) {
            Ok(choice) => choice,
            Err(e) => {
                report("choose", e.kind(), &e);
                return false;
            }
        };

        info!("Dialog choice {} picked: {}", index, choice.text);
        self.presenter.clear_choices();

        let ticket = self.generation.ticket();
        if let Some(quest) = &choice.grants_quest {
            self.quests.add_quest(quest);
        }
        if !ticket.is_current() {
            debug!("Dialog closed while granting quest, not continuing");
            return true;
        }

        let engine = self.this.clone();
        let next = choice.next_dialog;
        let timer = self.scheduler.schedule_guarded(
            self.config.choice_cleanup_delay(),
            ticket,
            move || {
                if let Some(engine) = engine.upgrade() {
                    engine.after_choice(next);
                }
            },
        );
        self.set_timer(timer);
        true
    }

    /// Close whatever is on screen without completing it
    pub fn force_close(&self) -> bool {
        let Some(session) = self.close_session() else {
            let e = DialogError::NoActiveDialog;
            report("force_close", e.kind(), &e);
            return false;
        };

        info!(
            "Dialog force-closed: {} (line {}, {})",
            session.dialog.id, session.line, session.phase
        );
        self.presenter.clear();
        self.events.hide_dialog.publish(&());
        self.controls.set_movement_enabled(true);
        true
    }

    /// Close any conversation and drop the cooldown
    pub fn shutdown(&self) {
        if self.is_dialog_active() {
            self.force_close();
        }
        if let Some(timer) = self.cooldown.take() {
            self.scheduler.cancel(timer);
        }
    }

    // ========================================================================
    // Session flow
    // ========================================================================

    fn check_start(&self) -> Result<(), DialogError> {
        if self.session.borrow().is_some() {
            return Err(DialogError::Busy);
        }
        if self.is_cooling_down() {
            return Err(DialogError::CoolingDown);
        }
        Ok(())
    }

    fn resolve(&self, id: &DialogId) -> Result<DialogRef, DialogError> {
        let dialog = self
            .catalog
            .borrow()
            .get(id)
            .ok_or_else(|| DialogError::UnknownDialog(id.clone()))?;
        if dialog.is_empty() {
            return Err(DialogError::EmptyDialog(id.clone()));
        }
        Ok(dialog)
    }

    /// Put `dialog` on screen; `fresh` is false for continuations
    fn begin(&self, dialog: DialogRef, fresh: bool) {
        let ticket = self.generation.bump();
        let previous = self
            .session
            .replace(Some(DialogSession::new(Rc::clone(&dialog))));
        if let Some(timer) = previous.and_then(|s| s.timer) {
            self.scheduler.cancel(timer);
        }

        info!("Dialog started: {} ({} lines)", dialog.id, dialog.lines.len());
        if fresh {
            self.controls.set_movement_enabled(false);
        }
        self.events.show_dialog.publish(&DialogNotice { dialog });

        if ticket.is_current() {
            self.start_line();
        }
    }

    fn start_line(&self) {
        self.generation.bump();
        let empty = {
            let mut slot = self.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            if let Some(timer) = session.timer.take() {
                self.scheduler.cancel(timer);
            }
            session.revealed = 0;
            session.phase = DialogPhase::Typing;
            session.options.clear();
            debug!("Dialog {} line {}", session.dialog.id, session.line);
            session.current_line().char_count() == 0
        };

        match self.config.char_delay() {
            Some(_) if !empty => {
                self.present_line();
                self.schedule_reveal();
            }
            _ => self.finish_typing(),
        }
    }

    fn schedule_reveal(&self) {
        let Some(delay) = self.config.char_delay() else {
            self.finish_typing();
            return;
        };
        let engine = self.this.clone();
        let timer = self
            .scheduler
            .schedule_guarded(delay, self.generation.ticket(), move || {
                if let Some(engine) = engine.upgrade() {
                    engine.reveal_next();
                }
            });
        self.set_timer(timer);
    }

    fn reveal_next(&self) {
        let done = {
            let mut slot = self.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            if session.phase != DialogPhase::Typing {
                return;
            }
            session.timer = None;
            session.revealed += 1;
            session.revealed >= session.current_line().char_count()
        };

        self.present_line();
        if done {
            self.finish_typing();
        } else if self.phase() == DialogPhase::Typing {
            self.schedule_reveal();
        }
    }

    /// Show the whole line and wait for input
    fn finish_typing(&self) {
        let (present, options) = {
            let mut slot = self.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            if session.phase != DialogPhase::Typing {
                return;
            }
            if let Some(timer) = session.timer.take() {
                self.scheduler.cancel(timer);
            }

            let count = session.current_line().char_count();
            let present = session.revealed < count || count == 0;
            session.revealed = count;

            let options = ChoiceOption::for_line(session.current_line());
            session.phase = if options.is_empty() {
                DialogPhase::AwaitingAdvance
            } else {
                DialogPhase::AwaitingChoice
            };
            session.options = options.clone();
            (present, options)
        };

        if present {
            self.present_line();
        }
        if !options.is_empty() {
            self.presenter.render_choices(&options);
        }
    }

    fn take_choice(&self, index: usize) -> Result<DialogChoice, DialogError> {
        let mut slot = self.session.borrow_mut();
        let session = slot.as_mut().ok_or(DialogError::NoActiveDialog)?;
        if session.phase != DialogPhase::AwaitingChoice {
            return Err(DialogError::UnexpectedInput("a choice"));
        }

        let count = session.options.len();
        let choice = session
            .current_line()
            .choices
            .get(index)
            .cloned()
            .ok_or(DialogError::ChoiceOutOfRange { index, count })?;

        session.options.clear();
        session.phase = DialogPhase::Transitioning;
        Ok(choice)
    }

    fn after_choice(&self, next: Option<DialogId>) {
        let Some(next) = next else {
            self.end();
            return;
        };

        let engine = self.this.clone();
        let timer = self.scheduler.schedule_guarded(
            self.config.follow_up_delay(),
            self.generation.ticket(),
            move || {
                if let Some(engine) = engine.upgrade() {
                    engine.continue_with(&next);
                }
            },
        );
        self.set_timer(timer);
    }

    /// Continuations skip the start checks; the session slot is still ours
    fn continue_with(&self, id: &DialogId) {
        match self.resolve(id) {
            Ok(dialog) => self.begin(dialog, false),
            Err(e) => {
                report("continue_dialog", e.kind(), &e);
                self.end();
            }
        }
    }

    /// Normal end of a conversation
    fn end(&self) {
        let Some(session) = self.close_session() else {
            return;
        };

        info!("Dialog finished: {}", session.dialog.id);
        self.presenter.clear();
        self.events.dialog_complete.publish(&DialogNotice {
            dialog: Rc::clone(&session.dialog),
        });
        self.events.hide_dialog.publish(&());
        self.controls.set_movement_enabled(true);
    }

    /// Empty the slot, invalidate its continuations and arm the cooldown
    ///
    /// The cooldown is armed before anything is published, so a handler
    /// reacting to the end cannot immediately start another conversation.
    fn close_session(&self) -> Option<DialogSession> {
        let session = self.session.borrow_mut().take()?;
        if let Some(timer) = session.timer {
            self.scheduler.cancel(timer);
        }
        self.generation.bump();
        self.start_cooldown();
        Some(session)
    }

    fn start_cooldown(&self) {
        if let Some(timer) = self.cooldown.take() {
            self.scheduler.cancel(timer);
        }
        let duration = self.config.cooldown();
        if duration.is_zero() {
            return;
        }

        let engine = self.this.clone();
        let timer = self.scheduler.schedule(duration, move || {
            if let Some(engine) = engine.upgrade() {
                engine.cooldown.set(None);
                debug!("Dialog cooldown elapsed");
            }
        });
        self.cooldown.set(Some(timer));
    }

    fn set_timer(&self, timer: TimerId) {
        if let Some(session) = self.session.borrow_mut().as_mut() {
            session.timer = Some(timer);
        }
    }

    fn present_line(&self) {
        let shown = self
            .session
            .borrow()
            .as_ref()
            .map(|s| (s.current_line().speaker.clone(), s.visible_text().to_string()));
        if let Some((speaker, text)) = shown {
            self.presenter.show_text(speaker.as_ref(), &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EventChannel;
    use crate::dialog::{DialogLine, Speaker};
    use crate::quest::{Quest, QuestCatalog, QuestId};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        texts: RefCell<Vec<String>>,
        choices: RefCell<Vec<Vec<String>>>,
        clears: Cell<usize>,
        movement: RefCell<Vec<bool>>,
    }

    impl DialogPresenter for Recorder {
        fn show_text(&self, _speaker: Option<&Speaker>, text: &str) {
            self.texts.borrow_mut().push(text.to_string());
        }

        fn render_choices(&self, choices: &[ChoiceOption]) {
            self.choices
                .borrow_mut()
                .push(choices.iter().map(|c| c.text.clone()).collect());
        }

        fn clear_choices(&self) {}

        fn clear(&self) {
            self.clears.set(self.clears.get() + 1);
        }
    }

    impl PlayerControls for Recorder {
        fn set_movement_enabled(&self, enabled: bool) {
            self.movement.borrow_mut().push(enabled);
        }
    }

    struct Fixture {
        scheduler: Rc<Scheduler>,
        quests: Rc<QuestEngine>,
        dialogs: Rc<DialogEngine>,
        recorder: Rc<Recorder>,
    }

    impl Fixture {
        fn tick_ms(&self, ms: u64) {
            self.scheduler.advance(Duration::from_millis(ms));
        }
    }

    fn instant() -> DialogConfig {
        DialogConfig {
            chars_per_second: 0.0,
            ..DialogConfig::default()
        }
    }

    fn fixture(config: DialogConfig, dialogs: Vec<Dialog>, quests: Vec<Quest>) -> Fixture {
        let mut quest_catalog = QuestCatalog::new();
        for quest in quests {
            quest_catalog.insert(quest);
        }
        let mut dialog_catalog = DialogCatalog::new();
        for dialog in dialogs {
            dialog_catalog.insert(dialog);
        }

        let scheduler = Rc::new(Scheduler::new());
        let quests = Rc::new(QuestEngine::new(quest_catalog));
        let recorder = Rc::new(Recorder::default());
        let presenter: Rc<dyn DialogPresenter> = recorder.clone();
        let controls: Rc<dyn PlayerControls> = recorder.clone();
        let dialogs = DialogEngine::new(
            config,
            dialog_catalog,
            Rc::clone(&quests),
            Rc::clone(&scheduler),
            presenter,
            controls,
        );

        Fixture {
            scheduler,
            quests,
            dialogs,
            recorder,
        }
    }

    fn record<T: 'static>(
        channel: &EventChannel<T>,
        log: &Rc<RefCell<Vec<String>>>,
        describe: impl Fn(&T) -> String + 'static,
    ) {
        let log = Rc::clone(log);
        channel.subscribe(move |payload| log.borrow_mut().push(describe(payload)));
    }

    fn id(s: &str) -> DialogId {
        DialogId::from(s)
    }

    fn three_lines() -> Dialog {
        Dialog::new("intro")
            .with_line(DialogLine::new("One"))
            .with_line(DialogLine::new("Two"))
            .with_line(DialogLine::new("Three"))
    }

    fn offer() -> Vec<Dialog> {
        vec![
            Dialog::new("offer").with_line(
                DialogLine::new("Will you find my key?")
                    .with_choice(DialogChoice::new("Yes").granting("find_key").leading_to("thanks"))
                    .with_choice(DialogChoice::new("No")),
            ),
            Dialog::new("thanks").with_line(DialogLine::new("Thank you.")),
        ]
    }

    #[test]
    fn test_three_lines_in_order() {
        let f = fixture(instant(), vec![three_lines()], vec![]);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().dialog_complete, &log, |n| format!("complete:{}", n.id()));
        record(&f.dialogs.events().hide_dialog, &log, |_| "hide".to_string());

        assert!(f.dialogs.show_dialog(&id("intro")));
        assert_eq!(f.dialogs.phase(), DialogPhase::AwaitingAdvance);
        assert!(f.dialogs.advance());
        assert!(f.dialogs.advance());
        assert!(f.dialogs.advance());

        assert_eq!(*f.recorder.texts.borrow(), vec!["One", "Two", "Three"]);
        assert_eq!(*log.borrow(), vec!["complete:intro", "hide"]);
        assert_eq!(*f.recorder.movement.borrow(), vec![false, true]);
        assert_eq!(f.dialogs.phase(), DialogPhase::Idle);
        assert!(f.dialogs.is_cooling_down());
        assert!(!f.dialogs.advance());
    }

    #[test]
    fn test_typing_reveals_per_character() {
        let config = DialogConfig {
            chars_per_second: 10.0,
            ..DialogConfig::default()
        };
        let f = fixture(
            config,
            vec![Dialog::new("d").with_line(DialogLine::new("Hey"))],
            vec![],
        );

        assert!(f.dialogs.show_dialog(&id("d")));
        assert_eq!(f.dialogs.phase(), DialogPhase::Typing);
        assert_eq!(f.dialogs.visible_text().as_deref(), Some(""));
        assert!(!f.dialogs.advance());

        f.tick_ms(100);
        assert_eq!(f.dialogs.visible_text().as_deref(), Some("H"));
        f.tick_ms(200);
        assert_eq!(f.dialogs.phase(), DialogPhase::AwaitingAdvance);
        assert_eq!(*f.recorder.texts.borrow(), vec!["", "H", "He", "Hey"]);

        let view = f.dialogs.current_line().unwrap();
        assert_eq!(view.full_text, "Hey");
        assert!(view.is_last);
    }

    #[test]
    fn test_skip_typing_on_advance() {
        let config = DialogConfig {
            chars_per_second: 10.0,
            skip_typing_on_advance: true,
            ..DialogConfig::default()
        };
        let f = fixture(config, vec![three_lines()], vec![]);

        f.dialogs.show_dialog(&id("intro"));
        f.tick_ms(100);
        assert!(f.dialogs.advance());
        assert_eq!(f.dialogs.visible_text().as_deref(), Some("One"));
        assert_eq!(f.dialogs.phase(), DialogPhase::AwaitingAdvance);

        // The cancelled reveal must not come back
        f.tick_ms(1000);
        assert_eq!(*f.recorder.texts.borrow(), vec!["", "O", "One"]);
    }

    #[test]
    fn test_second_dialog_rejected_while_active() {
        let other = Dialog::new("other").with_line(DialogLine::new("x"));
        let f = fixture(instant(), vec![three_lines(), other], vec![]);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().show_dialog, &log, |n| n.id().to_string());

        assert!(f.dialogs.show_dialog(&id("intro")));
        assert!(!f.dialogs.can_start());
        assert!(!f.dialogs.show_dialog(&id("other")));
        assert_eq!(*log.borrow(), vec!["intro"]);
        assert_eq!(f.dialogs.current_dialog().unwrap().id, id("intro"));
    }

    #[test]
    fn test_cooldown_blocks_restart() {
        let greeting = Dialog::new("d").with_line(DialogLine::new("Hi"));
        let f = fixture(instant(), vec![greeting], vec![]);

        f.dialogs.show_dialog(&id("d"));
        f.dialogs.advance();
        assert!(!f.dialogs.can_start());
        assert!(!f.dialogs.show_dialog(&id("d")));

        f.tick_ms(499);
        assert!(f.dialogs.is_cooling_down());
        f.tick_ms(1);
        assert!(f.dialogs.can_start());
        assert!(f.dialogs.show_dialog(&id("d")));
    }

    #[test]
    fn test_choice_grants_quest_before_next_dialog() {
        let f = fixture(instant(), offer(), vec![Quest::new("find_key", "Find the Key")]);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().show_dialog, &log, |n| format!("show:{}", n.id()));
        record(&f.dialogs.events().dialog_complete, &log, |n| format!("complete:{}", n.id()));
        record(&f.quests.events().quest_added, &log, |n| format!("quest:{}", n.id()));

        f.dialogs.show_dialog(&id("offer"));
        assert_eq!(f.dialogs.phase(), DialogPhase::AwaitingChoice);
        assert_eq!(f.dialogs.choice_options().len(), 2);
        assert_eq!(*f.recorder.choices.borrow(), vec![vec!["Yes", "No"]]);

        assert!(f.dialogs.choose(0));
        assert!(f.quests.is_quest_active(&QuestId::from("find_key")));
        assert_eq!(f.dialogs.phase(), DialogPhase::Transitioning);
        assert!(f.dialogs.choice_options().is_empty());

        f.tick_ms(100);
        assert_eq!(f.dialogs.phase(), DialogPhase::Transitioning);
        f.tick_ms(100);
        assert_eq!(f.dialogs.current_dialog().unwrap().id, id("thanks"));
        assert_eq!(f.dialogs.visible_text().as_deref(), Some("Thank you."));

        f.dialogs.advance();
        assert_eq!(
            *log.borrow(),
            vec!["show:offer", "quest:find_key", "show:thanks", "complete:thanks"]
        );
        assert_eq!(*f.recorder.movement.borrow(), vec![false, true]);
    }

    #[test]
    fn test_choice_without_next_dialog_ends() {
        let f = fixture(instant(), offer(), vec![Quest::new("find_key", "Find the Key")]);
        let completed = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().dialog_complete, &completed, |n| n.id().to_string());

        f.dialogs.show_dialog(&id("offer"));
        assert!(f.dialogs.choose(1));
        assert!(!f.quests.is_quest_active(&QuestId::from("find_key")));
        assert!(f.dialogs.is_dialog_active());

        f.tick_ms(100);
        assert!(!f.dialogs.is_dialog_active());
        assert_eq!(*completed.borrow(), vec!["offer"]);
    }

    #[test]
    fn test_input_rejections() {
        let f = fixture(instant(), offer(), vec![Quest::new("find_key", "Find the Key")]);

        assert!(!f.dialogs.choose(0));
        f.dialogs.show_dialog(&id("offer"));
        assert!(!f.dialogs.advance());
        assert!(!f.dialogs.choose(2));
        assert_eq!(f.dialogs.phase(), DialogPhase::AwaitingChoice);

        f.dialogs.choose(0);
        assert!(!f.dialogs.choose(0));
        assert!(!f.dialogs.advance());
    }

    #[test]
    fn test_force_close_while_typing() {
        let config = DialogConfig {
            chars_per_second: 10.0,
            ..DialogConfig::default()
        };
        let f = fixture(config, vec![three_lines()], vec![]);
        let log = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().dialog_complete, &log, |_| "complete".to_string());
        record(&f.dialogs.events().hide_dialog, &log, |_| "hide".to_string());

        f.dialogs.show_dialog(&id("intro"));
        f.tick_ms(100);
        assert!(f.dialogs.force_close());

        assert_eq!(f.dialogs.phase(), DialogPhase::Idle);
        assert_eq!(*log.borrow(), vec!["hide"]);
        assert_eq!(*f.recorder.movement.borrow(), vec![false, true]);
        assert_eq!(f.recorder.clears.get(), 1);

        let shown = f.recorder.texts.borrow().len();
        f.tick_ms(5000);
        assert_eq!(f.recorder.texts.borrow().len(), shown);
        assert!(!f.dialogs.force_close());
    }

    #[test]
    fn test_force_close_while_awaiting_choice() {
        let f = fixture(instant(), offer(), vec![Quest::new("find_key", "Find the Key")]);

        f.dialogs.show_dialog(&id("offer"));
        assert_eq!(f.dialogs.phase(), DialogPhase::AwaitingChoice);
        assert_eq!(*f.recorder.choices.borrow(), vec![vec!["Yes", "No"]]);

        assert!(f.dialogs.force_close());
        assert_eq!(f.recorder.clears.get(), 1);
        assert!(f.dialogs.choice_options().is_empty());
        assert!(!f.dialogs.choose(0));
        assert!(!f.quests.is_quest_active(&QuestId::from("find_key")));

        // A fresh conversation offers its own choices only
        f.tick_ms(500);
        assert!(f.dialogs.show_dialog(&id("offer")));
        assert_eq!(f.dialogs.choice_options().len(), 2);
        assert_eq!(f.recorder.choices.borrow().len(), 2);
    }

    #[test]
    fn test_force_close_during_transition_drops_continuation() {
        let f = fixture(instant(), offer(), vec![Quest::new("find_key", "Find the Key")]);
        let shows = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().show_dialog, &shows, |n| n.id().to_string());

        f.dialogs.show_dialog(&id("offer"));
        f.dialogs.choose(0);
        f.tick_ms(150);
        assert!(f.dialogs.force_close());
        assert!(f.dialogs.choice_options().is_empty());

        f.tick_ms(1000);
        assert_eq!(*shows.borrow(), vec!["offer"]);
        assert!(!f.dialogs.is_dialog_active());
        // The quest grant is not undone
        assert!(f.quests.is_quest_active(&QuestId::from("find_key")));
    }

    #[test]
    fn test_handler_closing_dialog_on_show() {
        let f = fixture(instant(), vec![three_lines()], vec![]);
        let weak = Rc::downgrade(&f.dialogs);
        f.dialogs.events().show_dialog.subscribe(move |_| {
            if let Some(dialogs) = weak.upgrade() {
                dialogs.force_close();
            }
        });

        assert!(f.dialogs.show_dialog(&id("intro")));
        assert!(!f.dialogs.is_dialog_active());
        assert!(f.recorder.texts.borrow().is_empty());
    }

    #[test]
    fn test_unknown_and_empty_dialogs_rejected() {
        let f = fixture(instant(), vec![], vec![]);
        assert!(!f.dialogs.show_dialog(&id("missing")));

        f.dialogs.register(Dialog::new("empty"));
        assert!(!f.dialogs.show_dialog(&id("empty")));
        assert!(f.recorder.movement.borrow().is_empty());
        assert!(f.dialogs.can_start());
    }

    #[test]
    fn test_choice_into_unknown_dialog_ends_conversation() {
        let f = fixture(
            instant(),
            vec![Dialog::new("d").with_line(
                DialogLine::new("Go?").with_choice(DialogChoice::new("Go").leading_to("nowhere")),
            )],
            vec![],
        );
        let completed = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().dialog_complete, &completed, |n| n.id().to_string());

        f.dialogs.show_dialog(&id("d"));
        f.dialogs.choose(0);
        f.tick_ms(200);
        assert!(!f.dialogs.is_dialog_active());
        assert_eq!(*completed.borrow(), vec!["d"]);
    }

    #[test]
    fn test_looping_conversation() {
        let hub = Dialog::new("hub").with_line(
            DialogLine::new("Anything else?")
                .with_choice(DialogChoice::new("Rumors").leading_to("rumors"))
                .with_choice(DialogChoice::new("Bye")),
        );
        let rumors = Dialog::new("rumors").with_line(
            DialogLine::new("They say the cellar is haunted.")
                .with_choice(DialogChoice::new("Back").leading_to("hub")),
        );
        let f = fixture(instant(), vec![hub, rumors], vec![]);
        let shows = Rc::new(RefCell::new(Vec::new()));
        record(&f.dialogs.events().show_dialog, &shows, |n| n.id().to_string());

        f.dialogs.show_dialog(&id("hub"));
        for _ in 0..2 {
            f.dialogs.choose(0);
            f.tick_ms(200);
            f.dialogs.choose(0);
            f.tick_ms(200);
        }
        f.dialogs.choose(1);
        f.tick_ms(100);

        assert_eq!(*shows.borrow(), vec!["hub", "rumors", "hub", "rumors", "hub"]);
        assert!(!f.dialogs.is_dialog_active());
    }
}

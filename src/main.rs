use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use progression_core::dialog::{
    ChoiceOption, DialogId, DialogPhase, DialogPresenter, PlayerControls, Speaker,
};
use progression_core::{Progression, ProgressionConfig};

/// 20 Hz, same cadence as the game loop
const TICK: Duration = Duration::from_millis(50);

/// Give up on conversations that loop forever under the autopilot
const MAX_TICKS: u32 = 20 * 120;

const DEFAULT_DIALOG: &str = "butler_intro";

// ============================================================================
// Headless collaborators
// ============================================================================

struct LogPresenter;

impl DialogPresenter for LogPresenter {
    fn show_text(&self, speaker: Option<&Speaker>, text: &str) {
        let speaker = speaker.map(|s| s.name.as_str()).unwrap_or("-");
        tracing::trace!(speaker, "typing: {}", text);
    }

    fn render_choices(&self, choices: &[ChoiceOption]) {
        debug!("{} choices on screen", choices.len());
    }

    fn clear_choices(&self) {}

    fn clear(&self) {
        debug!("dialog box cleared");
    }
}

struct LogControls;

impl PlayerControls for LogControls {
    fn set_movement_enabled(&self, enabled: bool) {
        debug!(enabled, "player movement");
    }
}

// ============================================================================
// Autopilot
// ============================================================================

fn narrate(progression: &Progression) {
    if let Some(line) = progression.dialogs().current_line() {
        match &line.speaker {
            Some(speaker) => println!("{}: {}", speaker.name, line.full_text),
            None => println!("{}", line.full_text),
        }
    }
    for choice in progression.dialogs().choice_options() {
        match &choice.grants_quest {
            Some(quest) => println!("    [{}] {} (starts '{}')", choice.index, choice.text, quest),
            None => println!("    [{}] {}", choice.index, choice.text),
        }
    }
}

async fn run(progression: &Progression, dialog: &DialogId) -> bool {
    if !progression.dialogs().show_dialog(dialog) {
        error!("Could not start dialog '{}'", dialog);
        return false;
    }

    let mut interval = tokio::time::interval(TICK);
    for _ in 0..MAX_TICKS {
        interval.tick().await;
        progression.tick(TICK);

        let dialogs = progression.dialogs();
        match dialogs.phase() {
            DialogPhase::AwaitingAdvance => {
                narrate(progression);
                dialogs.advance();
            }
            DialogPhase::AwaitingChoice => {
                narrate(progression);
                dialogs.choose(0);
            }
            DialogPhase::Typing | DialogPhase::Transitioning => {}
            DialogPhase::Idle => {
                if !dialogs.is_cooling_down() {
                    return true;
                }
            }
        }
    }

    warn!("Conversation still running after {} ticks, closing it", MAX_TICKS);
    progression.shutdown();
    true
}

fn print_summary(progression: &Progression) {
    let quests = progression.quests();
    let snapshot = quests.snapshot();

    println!();
    println!("Quest summary");
    for (id, progress) in &snapshot.quests {
        let name = quests
            .quest(id)
            .map(|q| q.name.clone())
            .unwrap_or_else(|| id.to_string());
        println!(
            "  {:<10} {} ({}/{} objectives)",
            progress.status.as_str(),
            name,
            progress.completed_objectives(),
            progress.objectives.len()
        );
    }
    for quest in quests.available_quests() {
        println!("  {:<10} {}", "available", quest.name);
    }

    match snapshot.to_json() {
        Ok(json) => debug!("Final snapshot: {}", json),
        Err(e) => warn!("Failed to serialize snapshot: {}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("progression_core=info,progression_sim=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));
    let dialog = DialogId::new(args.next().unwrap_or_else(|| DEFAULT_DIALOG.to_string()));

    let config = match ProgressionConfig::load(Path::new("config.toml")) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let progression = match Progression::load(
        &data_dir,
        config,
        Rc::new(LogPresenter),
        Rc::new(LogControls),
    ) {
        Ok(progression) => progression,
        Err(e) => {
            error!("Failed to load content from {:?}: {}", data_dir, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting conversation '{}'", dialog);
    let ok = run(&progression, &dialog).await;
    print_summary(&progression);
    progression.shutdown();

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

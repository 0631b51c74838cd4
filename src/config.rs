//! Runtime Configuration
//!
//! Tuning values for dialog pacing and objective confirmation windows,
//! loaded from a TOML file. Every field has a default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::scheduler::millis;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default)]
    pub dialog: DialogConfig,
    #[serde(default)]
    pub trackers: TrackerConfig,
}

/// Dialog pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogConfig {
    /// Reveal rate while typing; zero or negative shows lines instantly
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f32,
    /// Whether "advance" during typing reveals the rest of the line
    #[serde(default)]
    pub skip_typing_on_advance: bool,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_transition_ms")]
    pub choice_cleanup_delay_ms: u64,
    #[serde(default = "default_transition_ms")]
    pub follow_up_delay_ms: u64,
}

fn default_chars_per_second() -> f32 {
    40.0
}

fn default_cooldown_ms() -> u64 {
    500
}

fn default_transition_ms() -> u64 {
    100
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            chars_per_second: default_chars_per_second(),
            skip_typing_on_advance: false,
            cooldown_ms: default_cooldown_ms(),
            choice_cleanup_delay_ms: default_transition_ms(),
            follow_up_delay_ms: default_transition_ms(),
        }
    }
}

impl DialogConfig {
    /// Delay between revealed characters, `None` when lines appear at once
    pub fn char_delay(&self) -> Option<Duration> {
        if self.chars_per_second > 0.0 {
            Some(Duration::from_nanos(
                (1e9 / f64::from(self.chars_per_second)).round() as u64,
            ))
        } else {
            None
        }
    }

    pub fn cooldown(&self) -> Duration {
        millis(self.cooldown_ms)
    }

    pub fn choice_cleanup_delay(&self) -> Duration {
        millis(self.choice_cleanup_delay_ms)
    }

    pub fn follow_up_delay(&self) -> Duration {
        millis(self.follow_up_delay_ms)
    }
}

/// Delayed-confirmation windows for objective trackers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_confirmation_ms")]
    pub confirmation_delay_ms: u64,
    /// Per-tracker windows keyed by tracker name
    #[serde(default)]
    pub overrides: HashMap<String, u64>,
}

fn default_confirmation_ms() -> u64 {
    1000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confirmation_delay_ms: default_confirmation_ms(),
            overrides: HashMap::new(),
        }
    }
}

impl TrackerConfig {
    pub fn delay_for(&self, tracker: &str) -> Duration {
        millis(
            self.overrides
                .get(tracker)
                .copied()
                .unwrap_or(self.confirmation_delay_ms),
        )
    }
}

impl ProgressionConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ProgressionConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file falls back to defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dialog.chars_per_second.is_finite() {
            return Err(ConfigError::Invalid {
                field: "dialog.chars_per_second",
                reason: format!("{} is not a finite number", self.dialog.chars_per_second),
            });
        }
        Ok(())
    }
}

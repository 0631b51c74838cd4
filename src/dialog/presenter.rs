//! Display and Input Collaborators
//!
//! The dialog engine never renders anything itself. It pushes text and
//! choice lists to a presenter and toggles player movement through
//! `PlayerControls`. Both take `&self`; implementations that record state
//! use interior mutability.

use super::definition::Speaker;
use super::state::ChoiceOption;

pub trait DialogPresenter {
    /// Show the visible part of the current line
    fn show_text(&self, speaker: Option<&Speaker>, text: &str);
    fn render_choices(&self, choices: &[ChoiceOption]);
    /// Remove any rendered choices
    fn clear_choices(&self);
    /// Remove everything (dialog ended or was closed)
    fn clear(&self);
}

pub trait PlayerControls {
    fn set_movement_enabled(&self, enabled: bool);
}

/// Presenter for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl DialogPresenter for NullPresenter {
    fn show_text(&self, _speaker: Option<&Speaker>, _text: &str) {}
    fn render_choices(&self, _choices: &[ChoiceOption]) {}
    fn clear_choices(&self) {}
    fn clear(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullControls;

impl PlayerControls for NullControls {
    fn set_movement_enabled(&self, _enabled: bool) {}
}

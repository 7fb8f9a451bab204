//! Fluent metronome control.

use std::sync::Arc;

use crate::core::{ClickSettings, MetronomeMode};

/// Fluent API for metronome settings.
///
/// # Example
///
/// ```ignore
/// engine.metronome()
///     .enabled(true)
///     .volume(0.7)
///     .mode(MetronomeMode::Macro);
/// ```
#[derive(Clone)]
pub struct MetronomeHandle {
    settings: Arc<ClickSettings>,
}

impl MetronomeHandle {
    pub(crate) fn new(settings: Arc<ClickSettings>) -> Self {
        Self { settings }
    }

    pub fn enabled(self, enabled: bool) -> Self {
        self.settings.set_enabled(enabled);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_enabled()
    }

    /// Set metronome volume (0.0 to 1.0).
    pub fn volume(self, volume: f32) -> Self {
        self.settings.set_volume(volume);
        self
    }

    pub fn get_volume(&self) -> f32 {
        self.settings.volume()
    }

    pub fn mode(self, mode: MetronomeMode) -> Self {
        self.settings.set_mode(mode);
        self
    }

    pub fn get_mode(&self) -> MetronomeMode {
        self.settings.mode()
    }

    /// Main beats only.
    pub fn macro_beats(self) -> Self {
        self.mode(MetronomeMode::Macro)
    }

    /// Every pulse, downbeat accented.
    pub fn all_pulses(self) -> Self {
        self.mode(MetronomeMode::All)
    }

    /// Every pulse with downbeat / beat / subdivision accents.
    pub fn accented(self) -> Self {
        self.mode(MetronomeMode::Accented)
    }

    /// Strong, normal, and subdivision click pitches in Hz.
    pub fn frequencies(self, strong: f32, normal: f32, subdivision: f32) -> Self {
        self.settings.set_frequencies(strong, normal, subdivision);
        self
    }

    pub fn get_frequencies(&self) -> (f32, f32, f32) {
        self.settings.frequencies()
    }

    pub fn reset_frequencies(self) -> Self {
        self.settings.reset_frequencies();
        self
    }
}

impl std::fmt::Debug for MetronomeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetronomeHandle")
            .field("enabled", &self.is_enabled())
            .field("volume", &self.get_volume())
            .field("mode", &self.get_mode())
            .finish()
    }
}

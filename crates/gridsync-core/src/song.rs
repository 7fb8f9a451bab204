//! The song shape supplied by the host.

use serde::{Deserialize, Serialize};

use crate::tempo::{TempoChange, DEFAULT_TEMPO_BPM};

/// Tempo metadata of a multi-track recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Tempo the audio was recorded at (BPM).
    pub tempo: f64,
    /// Audio seconds. `f64::INFINITY` when unknown.
    pub duration: f64,
    #[serde(default)]
    pub tempo_changes: Vec<TempoChange>,
}

impl Song {
    pub fn new(tempo: f64, duration: f64) -> Self {
        Self {
            tempo,
            duration,
            tempo_changes: Vec::new(),
        }
    }

    pub fn with_tempo_changes(mut self, changes: Vec<TempoChange>) -> Self {
        self.tempo_changes = changes;
        self
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO_BPM, f64::INFINITY)
    }
}

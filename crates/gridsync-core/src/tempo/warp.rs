//! Piecewise-linear grid <-> audio mapping.

use super::{normalize_changes, with_origin, TempoChange, DEFAULT_TEMPO_BPM};
use crate::error::Result;

/// One constant-rate span of the warp. `end_time` is `+∞` for the last segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub audio_start_time: f64,
    pub tempo: f64,
}

impl WarpSegment {
    /// Audio seconds consumed per grid second.
    #[inline]
    pub fn rate(&self, base_tempo: f64) -> f64 {
        base_tempo / self.tempo
    }
}

/// Maps grid time to audio time for a recording made at a single base tempo.
///
/// Segment tempo is the step value of each change; curves only shape the beat
/// grid and never stretch the audio.
#[derive(Debug, Clone)]
pub struct WarpMap {
    segments: Vec<WarpSegment>,
    base_tempo: f64,
    enabled: bool,
}

impl WarpMap {
    /// `grid_to_audio(g) == g` everywhere.
    pub fn identity() -> Self {
        Self {
            segments: vec![WarpSegment {
                start_time: 0.0,
                end_time: f64::INFINITY,
                audio_start_time: 0.0,
                tempo: DEFAULT_TEMPO_BPM,
            }],
            base_tempo: DEFAULT_TEMPO_BPM,
            enabled: false,
        }
    }

    pub fn build(changes: &[TempoChange], base_tempo: f64) -> Result<Self> {
        let effective = with_origin(normalize_changes(changes)?, base_tempo);
        Ok(Self::from_effective(&effective, base_tempo))
    }

    /// `changes` must be normalized and start at grid time 0.
    pub(crate) fn from_effective(changes: &[TempoChange], base_tempo: f64) -> Self {
        let base_tempo = super::clamp_tempo(base_tempo);
        let mut segments: Vec<WarpSegment> = Vec::with_capacity(changes.len());
        let mut audio = 0.0;

        for (i, change) in changes.iter().enumerate() {
            let end_time = changes
                .get(i + 1)
                .map_or(f64::INFINITY, |next| next.time);
            let segment = WarpSegment {
                start_time: change.time,
                end_time,
                audio_start_time: audio,
                tempo: change.tempo,
            };
            if end_time.is_finite() {
                audio += (end_time - change.time) * segment.rate(base_tempo);
            }
            segments.push(segment);
        }

        Self {
            segments,
            base_tempo,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    pub fn segments(&self) -> &[WarpSegment] {
        &self.segments
    }

    /// True when the mapping collapses to `audio == grid`.
    pub fn is_identity(&self) -> bool {
        !self.enabled
            || self
                .segments
                .iter()
                .all(|s| s.rate(self.base_tempo) == 1.0)
    }

    pub fn grid_to_audio(&self, grid_time: f64) -> f64 {
        if !self.enabled {
            return grid_time;
        }
        let idx = self
            .segments
            .partition_point(|s| s.start_time <= grid_time)
            .saturating_sub(1);
        let seg = &self.segments[idx];
        seg.audio_start_time + (grid_time - seg.start_time) * seg.rate(self.base_tempo)
    }

    pub fn audio_to_grid(&self, audio_time: f64) -> f64 {
        if !self.enabled {
            return audio_time;
        }
        let idx = self
            .segments
            .partition_point(|s| s.audio_start_time <= audio_time)
            .saturating_sub(1);
        let seg = &self.segments[idx];
        seg.start_time + (audio_time - seg.audio_start_time) / seg.rate(self.base_tempo)
    }
}

impl Default for WarpMap {
    fn default() -> Self {
        Self::identity()
    }
}

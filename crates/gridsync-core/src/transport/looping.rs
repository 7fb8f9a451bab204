//! Loop range and loop/end-of-media detection.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tempo::TempoSnapshot;

/// Loop bounds in grid seconds. A missing start means 0; a missing end
/// means the end of the media.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRange {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

impl LoopRange {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            start: None,
            end: None,
        }
    }

    pub const fn new(start: f64, end: f64) -> Self {
        Self {
            enabled: true,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let start = self.start.unwrap_or(0.0);
        let end = self.end.unwrap_or(f64::INFINITY);
        let bad_bound = |v: Option<f64>| v.is_some_and(|v| !v.is_finite() || v < 0.0);

        if bad_bound(self.start) || bad_bound(self.end) || start >= end {
            return Err(Error::InvalidLoopRange { start, end });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopAction {
    Continue,
    /// Jump back to the loop start.
    Wrap { audio_time: f64, grid_time: f64 },
    /// Stop and return to the top.
    EndOfMedia,
}

#[derive(Debug, Clone, Copy)]
struct LoopBounds {
    start_grid: f64,
    start_audio: f64,
    end_audio: f64,
}

/// Loop bounds resolved against one tempo snapshot and media length.
#[derive(Debug, Clone, Copy)]
pub struct LoopController {
    bounds: Option<LoopBounds>,
    media_end: f64,
    grid_limit: f64,
}

impl LoopController {
    /// `duration` is in audio seconds.
    pub fn new(range: &LoopRange, tempo: &TempoSnapshot, duration: f64) -> Self {
        let media_end_grid = if duration.is_finite() {
            tempo.audio_to_grid(duration)
        } else {
            f64::INFINITY
        };

        // A loop that starts at or past the end of the media cannot play;
        // playback runs to end of media instead.
        let bounds = range
            .enabled
            .then(|| {
                let start_grid = range.start.unwrap_or(0.0);
                LoopBounds {
                    start_grid,
                    start_audio: tempo.grid_to_audio(start_grid),
                    end_audio: range
                        .end
                        .map_or(duration, |end| tempo.grid_to_audio(end).min(duration)),
                }
            })
            .filter(|bounds| bounds.start_audio < bounds.end_audio);
        let grid_limit = match (bounds, range.end) {
            (Some(_), Some(end)) => end.min(media_end_grid),
            _ => media_end_grid,
        };

        Self {
            bounds,
            media_end: duration,
            grid_limit,
        }
    }

    /// Grid time beyond which nothing is scheduled until the next re-anchor.
    #[inline]
    pub fn grid_limit(&self) -> f64 {
        self.grid_limit
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn check(&self, audio_time: f64) -> LoopAction {
        match self.bounds {
            Some(bounds) if audio_time >= bounds.end_audio => LoopAction::Wrap {
                audio_time: bounds.start_audio,
                grid_time: bounds.start_grid,
            },
            Some(_) => LoopAction::Continue,
            None if audio_time >= self.media_end => LoopAction::EndOfMedia,
            None => LoopAction::Continue,
        }
    }
}

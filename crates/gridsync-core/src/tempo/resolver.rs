//! Instantaneous tempo, beat ordinals, and bar positions over grid time.

use super::{Subdivision, TempoChange, TempoCurve, TimeSignature};
use crate::meter::{Accent, Meter};

/// Tolerance (in beats) when snapping a grid time onto the beat it lands on.
const BEAT_EPSILON: f64 = 1e-6;
const BISECT_ITERATIONS: usize = 64;

/// Values in effect at a grid instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoInfo<'a> {
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub subdivision: Option<&'a Subdivision>,
}

/// Display position of a beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatPosition {
    /// Global beat ordinal counted from grid time 0.
    pub beat_index: i64,
    /// 1-based.
    pub bar: u64,
    /// 1-based main beat within the bar.
    pub beat_number: u32,
    pub pulse_in_measure: u32,
    pub is_strong_beat: bool,
    pub is_subdivision: bool,
    pub accent: Accent,
    pub time_signature: TimeSignature,
}

#[derive(Debug, Clone)]
struct Region {
    change: TempoChange,
    end: f64,
    beat_offset: f64,
}

impl Region {
    /// Curve span clipped to this region: `(curve, curve_end)`.
    fn curve(&self) -> Option<(&TempoCurve, f64)> {
        self.change
            .active_curve()
            .map(|curve| (curve, curve.target_time.min(self.end)))
    }

    fn tempo_at(&self, t: f64) -> f64 {
        match self.curve() {
            Some((curve, _)) if t >= self.change.time && t <= curve.target_time => {
                let span = curve.target_time - self.change.time;
                let p = (t - self.change.time) / span;
                let s = self.change.tempo;
                super::clamp_tempo(s + (curve.target_tempo - s) * curve.kind.ease(p))
            }
            _ => self.change.tempo,
        }
    }

    /// Beats elapsed between the region start and `t`.
    fn beats_until(&self, t: f64) -> f64 {
        let start = self.change.time;
        let tempo = self.change.tempo;
        if t <= start {
            return (t - start) * tempo / 60.0;
        }
        match self.curve() {
            Some((curve, curve_end)) => {
                let span = curve.target_time - start;
                let p = (t.min(curve_end) - start) / span;
                let s = tempo;
                let e = curve.target_tempo;
                let in_curve = span * (s * p + (e - s) * curve.kind.ease_integral(p)) / 60.0;
                let after = (t - curve_end).max(0.0) * tempo / 60.0;
                in_curve + after
            }
            None => (t - start) * tempo / 60.0,
        }
    }

    /// Inverse of [`Region::beats_until`] for `beats >= 0`.
    fn time_after_beats(&self, beats: f64) -> f64 {
        let start = self.change.time;
        let tempo = self.change.tempo;
        if beats <= 0.0 {
            return start + beats * 60.0 / tempo;
        }
        let Some((_, curve_end)) = self.curve() else {
            return start + beats * 60.0 / tempo;
        };

        let curve_beats = self.beats_until(curve_end);
        if beats > curve_beats {
            return curve_end + (beats - curve_beats) * 60.0 / tempo;
        }

        let (mut lo, mut hi) = (start, curve_end);
        for _ in 0..BISECT_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if self.beats_until(mid) < beats {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

#[derive(Debug, Clone)]
struct MeterSpan {
    meter: Meter,
    /// First beat ordinal of the span; always a downbeat.
    anchor: i64,
    /// Bars completed before this span.
    bars_before: u64,
}

/// Answers "what tempo / meter / beat is it at grid time g".
///
/// Beat ordinals integrate the instantaneous tempo, so beats stay evenly
/// spaced in musical terms across curves and step changes. Bars restart at
/// every change of meter; pure tempo changes continue the current bar.
#[derive(Debug, Clone)]
pub struct TempoResolver {
    regions: Vec<Region>,
    meters: Vec<MeterSpan>,
}

impl TempoResolver {
    /// `changes` must be normalized and start at grid time 0.
    pub(crate) fn from_effective(changes: &[TempoChange]) -> Self {
        let mut regions: Vec<Region> = Vec::with_capacity(changes.len());
        let mut meters: Vec<MeterSpan> = Vec::new();
        let mut offset = 0.0;

        for (i, change) in changes.iter().enumerate() {
            let end = changes.get(i + 1).map_or(f64::INFINITY, |next| next.time);
            let region = Region {
                change: change.clone(),
                end,
                beat_offset: offset,
            };

            let meter = Meter::new(change.time_signature, change.subdivision.as_ref());
            match meters.last() {
                Some(span) if span.meter == meter => {}
                Some(span) => {
                    let anchor = (offset - BEAT_EPSILON).ceil() as i64;
                    let cycle = span.meter.pulses_per_measure().max(1) as i64;
                    let pulses = (anchor - span.anchor).max(0);
                    // A partial measure before the change still counts as a bar.
                    let bars = (pulses + cycle - 1) / cycle;
                    meters.push(MeterSpan {
                        meter,
                        anchor,
                        bars_before: span.bars_before + bars as u64,
                    });
                }
                None => meters.push(MeterSpan {
                    meter,
                    anchor: 0,
                    bars_before: 0,
                }),
            }

            if end.is_finite() {
                offset += region.beats_until(end);
            }
            regions.push(region);
        }

        Self { regions, meters }
    }

    fn region_at(&self, grid_time: f64) -> &Region {
        let idx = self
            .regions
            .partition_point(|r| r.change.time <= grid_time)
            .saturating_sub(1);
        &self.regions[idx]
    }

    pub fn at(&self, grid_time: f64) -> TempoInfo<'_> {
        let region = self.region_at(grid_time);
        TempoInfo {
            tempo: region.tempo_at(grid_time),
            time_signature: region.change.time_signature,
            subdivision: region.change.subdivision.as_ref(),
        }
    }

    #[inline]
    pub fn tempo_at(&self, grid_time: f64) -> f64 {
        self.region_at(grid_time).tempo_at(grid_time)
    }

    /// Seconds per beat at `grid_time`.
    #[inline]
    pub fn beat_duration_at(&self, grid_time: f64) -> f64 {
        60.0 / self.tempo_at(grid_time)
    }

    /// Fractional beats elapsed since grid time 0.
    pub fn beats_at(&self, grid_time: f64) -> f64 {
        let region = self.region_at(grid_time);
        region.beat_offset + region.beats_until(grid_time)
    }

    /// Grid time at which beat ordinal `beat` falls.
    pub fn grid_at_beat(&self, beat: f64) -> f64 {
        let idx = self
            .regions
            .partition_point(|r| r.beat_offset <= beat)
            .saturating_sub(1);
        let region = &self.regions[idx];
        region.time_after_beats(beat - region.beat_offset)
    }

    /// The beat ordinal `grid_time` lies on or after.
    #[inline]
    pub fn beat_index_at(&self, grid_time: f64) -> i64 {
        (self.beats_at(grid_time) + BEAT_EPSILON).floor() as i64
    }

    /// First beat ordinal at or after `grid_time`.
    #[inline]
    pub fn next_beat_index(&self, grid_time: f64) -> i64 {
        (self.beats_at(grid_time) - BEAT_EPSILON).ceil() as i64
    }

    pub fn meter_at_beat(&self, beat_index: i64) -> &Meter {
        &self.meter_span(beat_index).meter
    }

    fn meter_span(&self, beat_index: i64) -> &MeterSpan {
        let idx = self
            .meters
            .partition_point(|span| span.anchor <= beat_index)
            .saturating_sub(1);
        &self.meters[idx]
    }

    pub fn position(&self, grid_time: f64) -> BeatPosition {
        self.position_of_beat(self.beat_index_at(grid_time))
    }

    pub fn position_of_beat(&self, beat_index: i64) -> BeatPosition {
        let span = self.meter_span(beat_index);
        let pulses = (beat_index - span.anchor).max(0) as u64;
        let cycle = span.meter.pulses_per_measure().max(1) as u64;
        let info = span.meter.beat_info(pulses);

        BeatPosition {
            beat_index,
            bar: span.bars_before + pulses / cycle + 1,
            beat_number: info.beat_number,
            pulse_in_measure: info.pulse_in_measure,
            is_strong_beat: info.is_strong_beat,
            is_subdivision: info.is_subdivision(),
            accent: info.accent,
            time_signature: span.meter.time_signature(),
        }
    }
}

//! Tempo changes, time signatures, and the grid/audio warp.
//!
//! Grid time is musical time as authored. Audio time is the position inside the
//! recorded files. A [`TempoMap`] owns the authored [`TempoChange`] list and
//! publishes immutable [`TempoSnapshot`]s holding a [`WarpMap`] (grid <-> audio)
//! and a [`TempoResolver`] (instantaneous tempo, beat ordinals, bar positions).

mod map;
mod resolver;
mod warp;

pub use map::{TempoMap, TempoSnapshot};
pub use resolver::{BeatPosition, TempoInfo, TempoResolver};
pub use warp::{WarpMap, WarpSegment};

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MIN_TEMPO_BPM: f64 = 20.0;
pub const MAX_TEMPO_BPM: f64 = 300.0;
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Clamp a tempo into the supported range. Non-finite input maps to the minimum.
#[inline]
pub fn clamp_tempo(bpm: f64) -> f64 {
    if bpm.is_finite() {
        bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM)
    } else {
        MIN_TEMPO_BPM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Parse `"N/D"`, e.g. `"7/8"`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTimeSignature(s.to_string());
        let (num, den) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator: u32 = num.trim().parse().map_err(|_| invalid())?;
        let denominator: u32 = den.trim().parse().map_err(|_| invalid())?;

        if !(1..=64).contains(&numerator)
            || !(1..=64).contains(&denominator)
            || !denominator.is_power_of_two()
        {
            return Err(invalid());
        }
        Ok(Self::new(numerator, denominator))
    }

    /// 6/8, 9/8 and 12/8: pulses grouped in threes.
    #[inline]
    pub fn is_compound(&self) -> bool {
        self.denominator == 8 && matches!(self.numerator, 6 | 9 | 12)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

/// Irregular pulse grouping such as `"3+2+2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subdivision {
    groups: Vec<u32>,
}

impl Subdivision {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = || Error::InvalidSubdivision(pattern.to_string());
        if pattern.trim().is_empty() {
            return Err(invalid());
        }

        let groups = pattern
            .split('+')
            .map(|part| match part.trim().parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[u32] {
        &self.groups
    }

    /// Pulses in one full cycle of the pattern.
    pub fn cycle_len(&self) -> u32 {
        self.groups.iter().sum()
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{group}")?;
        }
        Ok(())
    }
}

impl FromStr for Subdivision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Subdivision {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Subdivision> for String {
    fn from(sub: Subdivision) -> Self {
        sub.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Linear,
    /// Quadratic ease-out: fast change early, settling into the target.
    Exponential,
}

impl CurveKind {
    /// Eased progress for `p` in `[0, 1]`.
    #[inline]
    pub fn ease(self, p: f64) -> f64 {
        match self {
            CurveKind::Linear => p,
            CurveKind::Exponential => 1.0 - (1.0 - p) * (1.0 - p),
        }
    }

    /// `∫₀ᵖ ease(x) dx`, used to count beats under a curve.
    #[inline]
    pub(crate) fn ease_integral(self, p: f64) -> f64 {
        match self {
            CurveKind::Linear => p * p / 2.0,
            CurveKind::Exponential => p * p - p * p * p / 3.0,
        }
    }
}

/// Gradual tempo change (accelerando / rallentando).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoCurve {
    #[serde(rename = "type")]
    pub kind: CurveKind,
    pub target_tempo: f64,
    pub target_time: f64,
}

/// One authored tempo event. `time` is grid seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoChange {
    pub time: f64,
    pub tempo: f64,
    #[serde(default)]
    pub time_signature: TimeSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision: Option<Subdivision>,
    /// Display-only flag owned by the editor.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<TempoCurve>,
}

impl TempoChange {
    pub fn new(time: f64, tempo: f64) -> Self {
        Self {
            time,
            tempo,
            time_signature: TimeSignature::default(),
            subdivision: None,
            hidden: false,
            curve: None,
        }
    }

    pub fn with_time_signature(mut self, time_signature: TimeSignature) -> Self {
        self.time_signature = time_signature;
        self
    }

    pub fn with_subdivision(mut self, subdivision: Subdivision) -> Self {
        self.subdivision = Some(subdivision);
        self
    }

    pub fn with_curve(mut self, kind: CurveKind, target_tempo: f64, target_time: f64) -> Self {
        self.curve = Some(TempoCurve {
            kind,
            target_tempo,
            target_time,
        });
        self
    }

    /// The curve, if it spans a positive duration after this change.
    #[inline]
    pub(crate) fn active_curve(&self) -> Option<&TempoCurve> {
        self.curve
            .as_ref()
            .filter(|curve| curve.target_time > self.time)
    }
}

/// Validate, clamp, sort, and de-duplicate an authored list.
///
/// Later entries win when two changes share a time.
pub(crate) fn normalize_changes(changes: &[TempoChange]) -> Result<Vec<TempoChange>> {
    for change in changes {
        if !change.time.is_finite() || change.time < 0.0 {
            return Err(Error::InvalidTempoChange {
                time: change.time,
                reason: "time must be finite and non-negative",
            });
        }
        if !change.tempo.is_finite() {
            return Err(Error::InvalidTempoChange {
                time: change.time,
                reason: "tempo must be finite",
            });
        }
        if let Some(curve) = &change.curve {
            if !curve.target_time.is_finite() || !curve.target_tempo.is_finite() {
                return Err(Error::InvalidTempoChange {
                    time: change.time,
                    reason: "curve target must be finite",
                });
            }
        }
    }

    let mut sorted: Vec<TempoChange> = changes.to_vec();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut out: Vec<TempoChange> = Vec::with_capacity(sorted.len());
    for mut change in sorted {
        change.tempo = clamp_tempo(change.tempo);
        if let Some(curve) = change.curve.as_mut() {
            curve.target_tempo = clamp_tempo(curve.target_tempo);
        }
        match out.last_mut() {
            Some(last) if last.time == change.time => {
                tracing::debug!(time = change.time, "dropping duplicate tempo change");
                *last = change;
            }
            _ => out.push(change),
        }
    }
    Ok(out)
}

/// Prepend a base-tempo change at grid time 0 when the list doesn't start there.
pub(crate) fn with_origin(mut changes: Vec<TempoChange>, base_tempo: f64) -> Vec<TempoChange> {
    if changes.first().map_or(true, |first| first.time > 0.0) {
        changes.insert(0, TempoChange::new(0.0, clamp_tempo(base_tempo)));
    }
    changes
}

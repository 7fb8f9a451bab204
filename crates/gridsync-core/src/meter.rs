//! Beat resolution for simple, compound, and irregular meters.
//!
//! A measure is a cycle of pulses partitioned into groups. The first pulse of
//! each group is a main beat; the rest are subdivisions.
//!
//! | meter                 | groups        | main beats |
//! |-----------------------|---------------|------------|
//! | 4/4                   | 1+1+1+1       | 4          |
//! | 6/8                   | 3+3           | 2          |
//! | 7/8 with `"3+2+2"`    | 3+2+2         | 3          |

use crate::tempo::{Subdivision, TimeSignature};

/// Click emphasis. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Accent {
    Subdivision = 0,
    Beat = 1,
    Downbeat = 2,
}

impl Accent {
    #[inline]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Relative click gain before the metronome volume is applied.
    #[inline]
    pub fn gain(self) -> f32 {
        match self {
            Accent::Downbeat => 1.0,
            Accent::Beat => 0.7,
            Accent::Subdivision => 0.4,
        }
    }
}

/// Where a pulse sits inside its measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatInfo {
    /// 0-based pulse index within the measure.
    pub pulse_in_measure: u32,
    pub group_index: u32,
    /// 1-based position inside the group.
    pub beat_in_group: u32,
    pub is_group_start: bool,
    /// 1-based main beat number (the group this pulse belongs to).
    pub beat_number: u32,
    pub is_strong_beat: bool,
    pub accent: Accent,
}

impl BeatInfo {
    #[inline]
    pub fn is_subdivision(&self) -> bool {
        !self.is_group_start
    }
}

/// Pulse grouping derived from a time signature and optional subdivision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    time_signature: TimeSignature,
    groups: Vec<u32>,
    irregular: bool,
}

impl Meter {
    pub fn new(time_signature: TimeSignature, subdivision: Option<&Subdivision>) -> Self {
        let (groups, irregular) = match subdivision {
            Some(sub) => (sub.groups().to_vec(), true),
            None if time_signature.is_compound() => {
                (vec![3; (time_signature.numerator / 3) as usize], false)
            }
            None => (vec![1; time_signature.numerator.max(1) as usize], false),
        };
        Self {
            time_signature,
            groups,
            irregular,
        }
    }

    #[inline]
    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn groups(&self) -> &[u32] {
        &self.groups
    }

    /// Custom subdivision in effect.
    #[inline]
    pub fn is_irregular(&self) -> bool {
        self.irregular
    }

    #[inline]
    pub fn main_beats(&self) -> u32 {
        self.groups.len() as u32
    }

    /// Pulses in one measure.
    #[inline]
    pub fn pulses_per_measure(&self) -> u32 {
        self.groups.iter().sum()
    }

    /// Resolve a pulse index. Indices past the measure wrap around.
    pub fn beat_info(&self, pulse: u64) -> BeatInfo {
        let cycle = self.pulses_per_measure().max(1) as u64;
        let pulse_in_measure = (pulse % cycle) as u32;

        let mut start = 0;
        let mut group_index = 0;
        let mut beat_in_group = 1;
        for (i, &len) in self.groups.iter().enumerate() {
            if pulse_in_measure < start + len {
                group_index = i as u32;
                beat_in_group = pulse_in_measure - start + 1;
                break;
            }
            start += len;
        }

        let is_group_start = beat_in_group == 1;
        let accent = if pulse_in_measure == 0 {
            Accent::Downbeat
        } else if is_group_start {
            Accent::Beat
        } else {
            Accent::Subdivision
        };
        let is_strong_beat = if self.irregular {
            is_group_start
        } else {
            pulse_in_measure == 0
        };

        BeatInfo {
            pulse_in_measure,
            group_index,
            beat_in_group,
            is_group_start,
            beat_number: group_index + 1,
            is_strong_beat,
            accent,
        }
    }

    /// Resolve a grid-time offset from the start of a measure at a constant tempo.
    pub fn beat_at_offset(&self, offset: f64, tempo: f64) -> BeatInfo {
        let pulses = (offset.max(0.0) * tempo / 60.0 + 1e-9).floor();
        self.beat_info(pulses as u64)
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new(TimeSignature::default(), None)
    }
}

/// Number of main beats in a measure.
pub fn main_beats_per_measure(
    time_signature: TimeSignature,
    subdivision: Option<&Subdivision>,
) -> u32 {
    Meter::new(time_signature, subdivision).main_beats()
}

/// Group placement of a pulse within its measure.
pub fn beat_info(
    pulse: u64,
    time_signature: TimeSignature,
    subdivision: Option<&Subdivision>,
) -> BeatInfo {
    Meter::new(time_signature, subdivision).beat_info(pulse)
}

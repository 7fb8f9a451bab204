//! Metronome click settings, events, and a reference click voice.
//!
//! The scheduler decides *when* a beat sounds; [`ClickSettings`] decides
//! *whether* and *how* it sounds, and a [`ClickSink`] receives the result.

use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::{Sender, TrySendError};

use crate::lockfree::{AtomicFlag, AtomicFloat};
use crate::meter::Accent;
use crate::scheduler::ScheduledBeat;

pub const DEFAULT_STRONG_HZ: f32 = 1000.0;
pub const DEFAULT_NORMAL_HZ: f32 = 800.0;
pub const DEFAULT_SUBDIVISION_HZ: f32 = 600.0;

/// Click length in seconds.
pub const CLICK_DURATION: f64 = 0.05;
const CLICK_FLOOR_GAIN: f64 = 0.001;

/// Which pulses produce a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetronomeMode {
    /// Main beats only.
    Macro,
    /// Every pulse, accent on the downbeat only.
    All,
    /// Every pulse with downbeat / beat / subdivision accents.
    #[default]
    Accented,
}

impl From<u8> for MetronomeMode {
    fn from(value: u8) -> Self {
        match value {
            0 => MetronomeMode::Macro,
            1 => MetronomeMode::All,
            _ => MetronomeMode::Accented,
        }
    }
}

impl From<MetronomeMode> for u8 {
    fn from(mode: MetronomeMode) -> Self {
        match mode {
            MetronomeMode::Macro => 0,
            MetronomeMode::All => 1,
            MetronomeMode::Accented => 2,
        }
    }
}

/// One click to be rendered at hardware time `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub time: f64,
    pub beat_index: i64,
    pub bar: u64,
    pub beat_number: u32,
    pub is_strong_beat: bool,
    pub is_subdivision: bool,
    pub accent: Accent,
    pub volume: f32,
    pub frequency: f32,
}

/// Shared metronome settings, writable from the control path while the
/// scheduler reads them.
#[derive(Debug)]
pub struct ClickSettings {
    enabled: AtomicFlag,
    volume: AtomicFloat,
    mode: AtomicU8,
    strong_hz: AtomicFloat,
    normal_hz: AtomicFloat,
    subdivision_hz: AtomicFloat,
}

impl ClickSettings {
    pub fn new() -> Self {
        Self {
            enabled: AtomicFlag::new(false),
            volume: AtomicFloat::new(0.5),
            mode: AtomicU8::new(MetronomeMode::default().into()),
            strong_hz: AtomicFloat::new(DEFAULT_STRONG_HZ),
            normal_hz: AtomicFloat::new(DEFAULT_NORMAL_HZ),
            subdivision_hz: AtomicFloat::new(DEFAULT_SUBDIVISION_HZ),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume };
        self.volume.set(volume.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn set_mode(&self, mode: MetronomeMode) {
        self.mode.store(mode.into(), Ordering::Release);
    }

    pub fn mode(&self) -> MetronomeMode {
        MetronomeMode::from(self.mode.load(Ordering::Acquire))
    }

    /// Set the strong / normal / subdivision click pitches in Hz.
    pub fn set_frequencies(&self, strong: f32, normal: f32, subdivision: f32) {
        self.strong_hz.set(strong.max(1.0));
        self.normal_hz.set(normal.max(1.0));
        self.subdivision_hz.set(subdivision.max(1.0));
    }

    pub fn frequencies(&self) -> (f32, f32, f32) {
        (
            self.strong_hz.get(),
            self.normal_hz.get(),
            self.subdivision_hz.get(),
        )
    }

    /// Reset pitches to 1000 / 800 / 600 Hz.
    pub fn reset_frequencies(&self) {
        self.set_frequencies(DEFAULT_STRONG_HZ, DEFAULT_NORMAL_HZ, DEFAULT_SUBDIVISION_HZ);
    }

    /// The click for `beat` under the current mode, or `None` if it is silent.
    pub fn click_for(&self, beat: &ScheduledBeat) -> Option<ClickEvent> {
        let pos = &beat.position;
        let (is_strong_beat, is_subdivision, accent) = match self.mode() {
            MetronomeMode::Macro if pos.is_subdivision => return None,
            MetronomeMode::Macro | MetronomeMode::Accented => {
                (pos.is_strong_beat, pos.is_subdivision, pos.accent)
            }
            MetronomeMode::All => {
                let downbeat = pos.pulse_in_measure == 0;
                let accent = if downbeat { Accent::Downbeat } else { Accent::Beat };
                (downbeat, false, accent)
            }
        };

        let frequency = if is_subdivision {
            self.subdivision_hz.get()
        } else if is_strong_beat {
            self.strong_hz.get()
        } else {
            self.normal_hz.get()
        };

        Some(ClickEvent {
            time: beat.time,
            beat_index: beat.beat_index,
            bar: pos.bar,
            beat_number: pos.beat_number,
            is_strong_beat,
            is_subdivision,
            accent,
            volume: self.volume() * accent.gain(),
            frequency,
        })
    }
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives clicks as they are scheduled. Called from the scheduler task.
pub trait ClickSink: Send + Sync {
    fn schedule(&self, click: ClickEvent);
}

impl ClickSink for Sender<ClickEvent> {
    fn schedule(&self, click: ClickEvent) {
        match self.try_send(click) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(beat = click.beat_index, "click queue full, dropping click");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Renders a click as a decaying sine burst.
#[derive(Debug, Clone, Copy)]
pub struct ClickVoice {
    sample_rate: f64,
}

impl ClickVoice {
    pub fn new(sample_rate: f64) -> Self {
        Self { sample_rate }
    }

    /// Mono samples for `click`: a sine at the click pitch whose gain falls
    /// exponentially from the click volume to 0.001 over 50 ms.
    pub fn render(&self, click: &ClickEvent) -> Vec<f32> {
        let len = (self.sample_rate * CLICK_DURATION) as usize;
        let volume = click.volume as f64;
        if volume <= 0.0 {
            return vec![0.0; len];
        }

        let ratio = (CLICK_FLOOR_GAIN / volume).min(1.0);
        let freq = click.frequency as f64;
        (0..len)
            .map(|i| {
                let t = i as f64 / self.sample_rate;
                let gain = volume * ratio.powf(t / CLICK_DURATION);
                let phase = 2.0 * core::f64::consts::PI * freq * t;
                (phase.sin() * gain) as f32
            })
            .collect()
    }
}

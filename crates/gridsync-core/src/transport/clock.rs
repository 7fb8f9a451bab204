//! Hardware clock sources and the anchored playback clock.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::lockfree::AtomicDouble;

/// Monotonic seconds from the audio device (or a stand-in).
pub trait AudioClockSource: Send + Sync {
    fn now(&self) -> f64;
}

/// `Instant`-based source, seconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClockSource for MonotonicClock {
    #[inline]
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Externally driven source for offline hosts and deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicDouble,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: AtomicDouble::new(start),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl AudioClockSource for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Why the clock was last re-anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorReason {
    Reset,
    Play,
    Pause,
    Stop,
    Seek,
    LoopWrap,
    Speed,
}

/// One immutable anchoring of audio time to hardware time.
///
/// `audio = audio_anchor + (hw - hardware_anchor) * speed_percent / 100`
/// while running; frozen at `audio_anchor` otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    pub hardware_anchor: f64,
    pub audio_anchor: f64,
    pub speed_percent: f64,
    pub running: bool,
    /// Incremented on every re-anchor.
    pub epoch: u64,
    pub reason: AnchorReason,
}

impl ClockState {
    #[inline]
    pub fn rate(&self) -> f64 {
        self.speed_percent / 100.0
    }

    #[inline]
    pub fn audio_at(&self, hardware_now: f64) -> f64 {
        if self.running {
            self.audio_anchor + (hardware_now - self.hardware_anchor) * self.rate()
        } else {
            self.audio_anchor
        }
    }

    /// Hardware time at which `audio_time` will play. `None` while stopped.
    #[inline]
    pub fn hardware_at(&self, audio_time: f64) -> Option<f64> {
        self.running
            .then(|| self.hardware_anchor + (audio_time - self.audio_anchor) / self.rate())
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            hardware_anchor: 0.0,
            audio_anchor: 0.0,
            speed_percent: 100.0,
            running: false,
            epoch: 0,
            reason: AnchorReason::Reset,
        }
    }
}

/// The session's reference clock.
///
/// Every mutation publishes a fresh [`ClockState`]; nothing is accumulated
/// tick by tick, so long sessions don't drift.
#[derive(Debug)]
pub struct PlaybackClock {
    state: ArcSwap<ClockState>,
}

impl PlaybackClock {
    pub fn new(speed_percent: f64) -> Self {
        Self {
            state: ArcSwap::from_pointee(ClockState {
                speed_percent,
                ..ClockState::default()
            }),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<ClockState> {
        self.state.load_full()
    }

    #[inline]
    pub fn now(&self, hardware_now: f64) -> f64 {
        self.state.load().audio_at(hardware_now)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.load().running
    }

    #[inline]
    pub fn speed_percent(&self) -> f64 {
        self.state.load().speed_percent
    }

    /// Re-anchor at `audio_time`, keeping the running flag and speed.
    pub fn reset(&self, hardware_now: f64, audio_time: f64, reason: AnchorReason) {
        self.update(|old| ClockState {
            hardware_anchor: hardware_now,
            audio_anchor: audio_time,
            reason,
            ..*old
        });
    }

    /// Begin advancing from the current audio time.
    pub fn start(&self, hardware_now: f64) {
        self.update(|old| ClockState {
            hardware_anchor: hardware_now,
            audio_anchor: old.audio_at(hardware_now),
            running: true,
            reason: AnchorReason::Play,
            ..*old
        });
    }

    /// Freeze at the current audio time.
    pub fn pause(&self, hardware_now: f64) {
        self.update(|old| ClockState {
            hardware_anchor: hardware_now,
            audio_anchor: old.audio_at(hardware_now),
            running: false,
            reason: AnchorReason::Pause,
            ..*old
        });
    }

    /// Freeze at `audio_time`.
    pub fn stop(&self, hardware_now: f64, audio_time: f64) {
        self.update(|old| ClockState {
            hardware_anchor: hardware_now,
            audio_anchor: audio_time,
            running: false,
            reason: AnchorReason::Stop,
            ..*old
        });
    }

    /// Change speed without applying it to already-elapsed time.
    pub fn set_speed(&self, hardware_now: f64, speed_percent: f64) {
        self.update(|old| ClockState {
            hardware_anchor: hardware_now,
            audio_anchor: old.audio_at(hardware_now),
            speed_percent,
            reason: AnchorReason::Speed,
            ..*old
        });
    }

    fn update(&self, f: impl Fn(&ClockState) -> ClockState) {
        self.state.rcu(|old| {
            let mut next = f(&**old);
            next.epoch = old.epoch.wrapping_add(1);
            next
        });
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(100.0)
    }
}

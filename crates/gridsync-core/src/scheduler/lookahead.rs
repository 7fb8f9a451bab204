use super::ScheduledBeatSet;
use crate::config::SessionConfig;
use crate::tempo::{BeatPosition, TempoSnapshot};
use crate::transport::{AnchorReason, ClockState};

/// Upper bound on beats emitted by a single tick.
const MAX_BEATS_PER_TICK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
}

/// Everything a tick reads, captured once so the whole tick sees one
/// consistent clock and tempo map.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleWindow<'a> {
    pub clock: &'a ClockState,
    pub tempo: &'a TempoSnapshot,
    /// Beats at or past this grid time are held back.
    pub grid_limit: f64,
}

/// A beat placed on the hardware timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBeat {
    /// Hardware-clock seconds at which the beat sounds.
    pub time: f64,
    pub beat_index: i64,
    pub grid_time: f64,
    pub audio_time: f64,
    pub position: BeatPosition,
}

/// Places beats on the hardware clock ahead of time.
///
/// Each tick schedules every beat whose hardware time falls inside
/// `[now, now + lookahead)`. The next beat is always re-derived from its own
/// grid time through the warp and the clock, so curves and speed changes are
/// honored beat by beat.
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    state: SchedulerState,
    lookahead: f64,
    late_tolerance: f64,
    next_beat: i64,
    next_event_time: Option<f64>,
    epoch: u64,
    tempo_version: u64,
    scheduled: ScheduledBeatSet,
    dropped_late: u64,
}

impl LookaheadScheduler {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: SchedulerState::Idle,
            lookahead: config.lookahead.as_secs_f64(),
            late_tolerance: config.late_tolerance.as_secs_f64(),
            next_beat: 0,
            next_event_time: None,
            epoch: 0,
            tempo_version: 0,
            scheduled: ScheduledBeatSet::new(
                config.scheduled_beat_capacity,
                config.scheduled_beat_retain,
            ),
            dropped_late: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn scheduled(&self) -> &ScheduledBeatSet {
        &self.scheduled
    }

    /// Ordinal of the next beat to be scheduled.
    #[inline]
    pub fn next_beat(&self) -> i64 {
        self.next_beat
    }

    /// Hardware time of the next beat, if it is schedulable.
    #[inline]
    pub fn next_event_time(&self) -> Option<f64> {
        self.next_event_time
    }

    /// Beats skipped because their time had already passed.
    #[inline]
    pub fn dropped_late(&self) -> u64 {
        self.dropped_late
    }

    pub fn start(&mut self, hardware_now: f64, window: &ScheduleWindow<'_>) {
        self.state = SchedulerState::Running;
        self.scheduled.clear();
        self.align(hardware_now, window);
    }

    pub fn stop(&mut self) {
        self.state = SchedulerState::Idle;
        self.scheduled.clear();
        self.next_event_time = None;
    }

    /// Follow a clock re-anchor or tempo edit.
    ///
    /// A speed change keeps the scheduled set so a beat already in flight is
    /// not emitted twice; every other discontinuity starts clean.
    pub fn resync(&mut self, hardware_now: f64, window: &ScheduleWindow<'_>) {
        let speed_only = window.clock.reason == AnchorReason::Speed
            && window.tempo.version() == self.tempo_version;
        if !speed_only {
            self.scheduled.clear();
        }
        if self.is_running() {
            self.align(hardware_now, window);
        } else {
            self.epoch = window.clock.epoch;
            self.tempo_version = window.tempo.version();
        }
    }

    fn align(&mut self, hardware_now: f64, window: &ScheduleWindow<'_>) {
        self.epoch = window.clock.epoch;
        self.tempo_version = window.tempo.version();

        let audio = window.clock.audio_at(hardware_now);
        let grid = window.tempo.audio_to_grid(audio);
        self.next_beat = window.tempo.resolver().next_beat_index(grid);
        self.next_event_time = event_time(self.next_beat, window);
    }

    /// Schedule every beat due before `hardware_now + lookahead`.
    ///
    /// `on_beat` is called once per newly scheduled beat. Returns how many
    /// beats were scheduled.
    pub fn tick(
        &mut self,
        hardware_now: f64,
        window: &ScheduleWindow<'_>,
        mut on_beat: impl FnMut(&ScheduledBeat),
    ) -> usize {
        if !self.is_running() {
            return 0;
        }
        if window.clock.epoch != self.epoch || window.tempo.version() != self.tempo_version {
            self.resync(hardware_now, window);
        }

        let horizon = hardware_now + self.lookahead;
        let mut emitted = 0;
        let mut next = event_time(self.next_beat, window);

        for _ in 0..MAX_BEATS_PER_TICK {
            let Some(t) = next else { break };
            if t >= horizon {
                break;
            }

            if t < hardware_now - self.late_tolerance {
                let missed = self.next_beat;
                self.align(hardware_now, window);
                self.next_beat = self.next_beat.max(missed + 1);
                let dropped = (self.next_beat - missed) as u64;
                self.dropped_late += dropped;
                tracing::warn!(
                    beat = missed,
                    dropped,
                    lateness_ms = (hardware_now - t) * 1000.0,
                    "dropping late beats"
                );
            } else {
                if self.schedule_one_beat(t, window, &mut on_beat) {
                    emitted += 1;
                }
                self.next_beat += 1;
            }
            next = event_time(self.next_beat, window);
        }

        self.next_event_time = next;
        emitted
    }

    /// Emit the beat sounding at hardware time `t` unless it was already emitted.
    fn schedule_one_beat(
        &mut self,
        t: f64,
        window: &ScheduleWindow<'_>,
        on_beat: &mut impl FnMut(&ScheduledBeat),
    ) -> bool {
        let audio_time = window.clock.audio_at(t);
        let grid_time = window.tempo.audio_to_grid(audio_time);
        let beat_index = window.tempo.resolver().beats_at(grid_time).round() as i64;

        if self.scheduled.contains(beat_index) {
            return false;
        }

        let beat = ScheduledBeat {
            time: t,
            beat_index,
            grid_time,
            audio_time,
            position: window.tempo.resolver().position_of_beat(beat_index),
        };
        on_beat(&beat);
        self.scheduled.insert(beat_index);
        true
    }
}

/// Hardware time of `beat`, or `None` if it is past the limit or the clock is stopped.
fn event_time(beat: i64, window: &ScheduleWindow<'_>) -> Option<f64> {
    let grid = window.tempo.resolver().grid_at_beat(beat as f64);
    if grid >= window.grid_limit {
        return None;
    }
    window.clock.hardware_at(window.tempo.grid_to_audio(grid))
}

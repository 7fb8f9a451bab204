//! A playback session: commands from the host, ticks from the periodic tasks.
//!
//! The session owns no threads. The host (or `gridsync::PlaybackEngine`) calls
//! [`Session::tick_scheduler`] and [`Session::tick_sync`] periodically and
//! issues transport commands from its control path.
//!
//! Locking: control commands serialize on the transport FSM lock. The
//! scheduler and track locks are only ever held one at a time and never
//! while waiting on the FSM lock.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::click::{ClickSettings, ClickSink, MetronomeMode};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::lockfree::AtomicDouble;
use crate::scheduler::{LookaheadScheduler, ScheduleWindow};
use crate::song::Song;
use crate::sync::{MultiTrackSynchronizer, TrackHandle, TrackId, TrackStatus};
use crate::tempo::{TempoChange, TempoMap, TempoSnapshot, TimeSignature};
use crate::transport::{
    AnchorReason, AudioClockSource, ClockState, LoopAction, LoopController, LoopRange,
    MotionState, PlaybackClock, TransitionResult, TransportEvent, TransportFsm,
};

/// What the host displays. Published on every sync tick and command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub motion: MotionState,
    pub is_playing: bool,
    pub grid_time: f64,
    pub audio_time: f64,
    pub bar: u64,
    pub beat_number: u32,
    pub beat_index: i64,
    pub is_strong_beat: bool,
    pub time_signature: TimeSignature,
    pub tempo: f64,
    pub speed_percent: f64,
    pub loop_enabled: bool,
}

pub struct Session {
    config: SessionConfig,
    source: Arc<dyn AudioClockSource>,
    clock: PlaybackClock,
    control: Mutex<TransportFsm>,
    motion: AtomicU8,
    tempo_map: Mutex<TempoMap>,
    tempo: ArcSwap<TempoSnapshot>,
    loop_range: ArcSwap<LoopRange>,
    duration: AtomicDouble,
    scheduler: Mutex<LookaheadScheduler>,
    tracks: Mutex<MultiTrackSynchronizer>,
    click: Arc<ClickSettings>,
    click_sink: Option<Arc<dyn ClickSink>>,
    published: ArcSwap<PlaybackState>,
    subscribers: Mutex<Vec<Sender<PlaybackState>>>,
}

impl Session {
    pub fn new(config: SessionConfig, source: Arc<dyn AudioClockSource>) -> Result<Self> {
        config.validate()?;

        let mut tempo_map = TempoMap::default();
        tempo_map.set_warp_enabled(config.warp_enabled);
        let snapshot = tempo_map.snapshot();
        let initial = initial_state(&snapshot);

        Ok(Self {
            clock: PlaybackClock::default(),
            control: Mutex::new(TransportFsm::new()),
            motion: AtomicU8::new(MotionState::Stopped as u8),
            tempo: ArcSwap::new(snapshot),
            tempo_map: Mutex::new(tempo_map),
            loop_range: ArcSwap::from_pointee(LoopRange::disabled()),
            duration: AtomicDouble::new(f64::INFINITY),
            scheduler: Mutex::new(LookaheadScheduler::new(&config)),
            tracks: Mutex::new(MultiTrackSynchronizer::new(
                config.drift_threshold.as_secs_f64(),
                config.rate_epsilon,
            )),
            click: Arc::new(ClickSettings::new()),
            click_sink: None,
            published: ArcSwap::from_pointee(initial),
            subscribers: Mutex::new(Vec::new()),
            config,
            source,
        })
    }

    pub fn with_click_sink(mut self, sink: Arc<dyn ClickSink>) -> Self {
        self.click_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    fn hardware_now(&self) -> f64 {
        self.source.now()
    }

    // ---- song and tempo ----

    /// Stop, then replace base tempo, tempo changes, and duration.
    pub fn load_song(&self, song: &Song) -> Result<()> {
        if song.duration.is_nan() || song.duration < 0.0 {
            return Err(Error::InvalidDuration(song.duration));
        }
        let mut control = self.control.lock();
        {
            let mut map = self.tempo_map.lock();
            map.set_changes(&song.tempo_changes)?;
            map.set_base_tempo(song.tempo);
            self.tempo.store(map.snapshot());
        }
        self.duration.set(song.duration);
        self.halt(&mut control, TransportEvent::Stop);
        tracing::debug!(
            tempo = song.tempo,
            duration = song.duration,
            changes = song.tempo_changes.len(),
            "song loaded"
        );
        self.publish(self.current_state());
        Ok(())
    }

    pub fn set_tempo_changes(&self, changes: &[TempoChange]) -> Result<()> {
        self.edit_tempo(|map| map.set_changes(changes))
    }

    pub fn set_base_tempo(&self, bpm: f64) {
        // Infallible edit.
        let _ = self.edit_tempo(|map| {
            map.set_base_tempo(bpm);
            Ok(())
        });
    }

    pub fn set_warp_enabled(&self, enabled: bool) {
        let _ = self.edit_tempo(|map| {
            map.set_warp_enabled(enabled);
            Ok(())
        });
    }

    fn edit_tempo(&self, f: impl FnOnce(&mut TempoMap) -> Result<()>) -> Result<()> {
        let _control = self.control.lock();
        {
            let mut map = self.tempo_map.lock();
            f(&mut map)?;
            self.tempo.store(map.snapshot());
        }
        self.resync_scheduler(self.hardware_now());
        self.publish(self.current_state());
        Ok(())
    }

    pub fn tempo_snapshot(&self) -> Arc<TempoSnapshot> {
        self.tempo.load_full()
    }

    pub fn duration(&self) -> f64 {
        self.duration.get()
    }

    // ---- tracks ----

    /// Register a track. It joins playback immediately if the session is playing.
    pub fn add_track(&self, handle: Box<dyn TrackHandle>) -> TrackId {
        let _control = self.control.lock();
        let mut tracks = self.tracks.lock();
        let id = tracks.add(handle);
        let clock = self.clock.snapshot();
        if clock.running {
            let audio = clock.audio_at(self.hardware_now());
            // Failures are recorded on the track's status.
            let _ = tracks.start_one(id, audio, clock.rate());
        }
        id
    }

    pub fn remove_track(&self, id: TrackId) -> Result<Box<dyn TrackHandle>> {
        let _control = self.control.lock();
        let mut handle = self.tracks.lock().remove(id)?;
        if let Err(err) = handle.pause() {
            tracing::debug!(track = %id, error = %err, "pause on removal failed");
        }
        Ok(handle)
    }

    pub fn track_status(&self, id: TrackId) -> Result<TrackStatus> {
        self.tracks.lock().status(id)
    }

    pub fn track_statuses(&self) -> Vec<TrackStatus> {
        self.tracks.lock().statuses()
    }

    // ---- transport ----

    pub fn play(&self) {
        {
            let mut control = self.control.lock();
            let TransitionResult::MotionChanged { from, to } =
                control.transition(TransportEvent::Play)
            else {
                return;
            };
            self.motion.store(to as u8, Ordering::Release);
            let hw = self.hardware_now();
            self.clock.start(hw);

            let clock = self.clock.snapshot();
            let audio = clock.audio_at(hw);
            self.tracks.lock().start_all(audio, clock.rate());
            {
                let tempo = self.tempo.load_full();
                let window = self.window(&clock, &tempo);
                self.scheduler.lock().start(hw, &window);
            }
            tracing::debug!(?from, audio, "play");
            self.publish(self.current_state());
        }
        // A beat on the start position is due now.
        self.tick_scheduler();
    }

    pub fn pause(&self) {
        let mut control = self.control.lock();
        self.halt(&mut control, TransportEvent::Pause);
        self.publish(self.current_state());
    }

    /// Stop and return to the top.
    pub fn stop(&self) {
        let mut control = self.control.lock();
        self.halt(&mut control, TransportEvent::Stop);
        self.publish(self.current_state());
    }

    pub fn toggle_play_pause(&self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Shared by pause, stop, and end of media. Stopping always rewinds,
    /// even when the transport was already stopped at a sought position.
    fn halt(&self, control: &mut TransportFsm, event: TransportEvent) {
        let changed = match control.transition(event) {
            TransitionResult::MotionChanged { to, .. } => {
                self.motion.store(to as u8, Ordering::Release);
                true
            }
            TransitionResult::None => false,
        };
        let rewind = control.motion() == MotionState::Stopped
            && matches!(event, TransportEvent::Stop | TransportEvent::EndOfMedia);
        if !changed && !rewind {
            return;
        }

        let hw = self.hardware_now();
        self.scheduler.lock().stop();

        let mut tracks = self.tracks.lock();
        tracks.pause_all();
        if rewind {
            self.clock.stop(hw, 0.0);
            tracks.seek_all(0.0);
        } else {
            self.clock.pause(hw);
        }
    }

    /// Jump to `grid_time`, clamped to the song.
    pub fn seek(&self, grid_time: f64) {
        {
            let _control = self.control.lock();
            let tempo = self.tempo.load_full();
            let grid = clamp_grid(grid_time, self.end_grid(&tempo));
            let audio = tempo.grid_to_audio(grid);

            let hw = self.hardware_now();
            self.clock.reset(hw, audio, AnchorReason::Seek);
            self.resync_scheduler(hw);
            self.tracks.lock().seek_all(audio);
            tracing::debug!(grid, audio, "seek");

            let clock = self.clock.snapshot();
            self.publish(self.state_at(grid, audio, &clock, &tempo));
        }
        self.tick_scheduler();
    }

    /// Playback speed in percent, clamped to the configured range.
    pub fn set_speed(&self, percent: f64) {
        let _control = self.control.lock();
        let percent = self.config.clamp_speed(percent);
        let hw = self.hardware_now();
        self.clock.set_speed(hw, percent);
        self.resync_scheduler(hw);
        self.publish(self.current_state());
    }

    pub fn set_loop(&self, range: LoopRange) -> Result<()> {
        range.validate()?;
        self.loop_range.store(Arc::new(range));
        tracing::debug!(?range, "loop range set");
        self.publish(self.current_state());
        Ok(())
    }

    pub fn loop_range(&self) -> LoopRange {
        **self.loop_range.load()
    }

    // ---- metronome ----

    pub fn click_settings(&self) -> &Arc<ClickSettings> {
        &self.click
    }

    pub fn set_metronome_enabled(&self, enabled: bool) {
        self.click.set_enabled(enabled);
    }

    pub fn set_metronome_volume(&self, volume: f32) {
        self.click.set_volume(volume);
    }

    pub fn set_metronome_mode(&self, mode: MetronomeMode) {
        self.click.set_mode(mode);
    }

    // ---- periodic work ----

    /// Scheduler task body. Returns how many beats were scheduled.
    pub fn tick_scheduler(&self) -> usize {
        if !self.is_playing() {
            return 0;
        }
        let hw = self.hardware_now();
        let mut scheduler = self.scheduler.lock();
        let clock = self.clock.snapshot();
        let tempo = self.tempo.load_full();
        let window = self.window(&clock, &tempo);

        let click = &self.click;
        let sink = self.click_sink.as_deref();
        scheduler.tick(hw, &window, |beat| {
            if !click.is_enabled() {
                return;
            }
            if let (Some(sink), Some(event)) = (sink, click.click_for(beat)) {
                sink.schedule(event);
            }
        })
    }

    /// Sync task body: loop / end-of-media handling, drift correction, and
    /// state publication.
    pub fn tick_sync(&self) -> PlaybackState {
        let hw = self.hardware_now();
        let clock = self.clock.snapshot();
        if !clock.running {
            let state = self.current_state();
            self.publish(state);
            return state;
        }

        let tempo = self.tempo.load_full();
        let audio = clock.audio_at(hw);
        let controller = LoopController::new(&self.loop_range.load(), &tempo, self.duration());

        let state = match controller.check(audio) {
            LoopAction::Continue => {
                self.tracks.lock().tick(audio, clock.rate());
                self.state_at(tempo.audio_to_grid(audio), audio, &clock, &tempo)
            }
            LoopAction::Wrap {
                audio_time,
                grid_time,
            } => {
                let state = {
                    let _control = self.control.lock();
                    if self.clock.snapshot().epoch != clock.epoch {
                        // A command re-anchored the clock since this tick started.
                        return self.current_state();
                    }
                    self.clock.reset(hw, audio_time, AnchorReason::LoopWrap);
                    self.resync_scheduler(hw);
                    self.tracks.lock().seek_all(audio_time);
                    tracing::debug!(from = audio, to = audio_time, "loop wrap");

                    let clock = self.clock.snapshot();
                    self.state_at(grid_time, audio_time, &clock, &tempo)
                };
                self.tick_scheduler();
                state
            }
            LoopAction::EndOfMedia => {
                let mut control = self.control.lock();
                if self.clock.snapshot().epoch != clock.epoch {
                    return self.current_state();
                }
                self.halt(&mut control, TransportEvent::EndOfMedia);
                tracing::info!(audio, "end of media");
                self.current_state()
            }
        };

        self.publish(state);
        state
    }

    // ---- state ----

    #[inline]
    pub fn motion(&self) -> MotionState {
        MotionState::from(self.motion.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.motion() == MotionState::Playing
    }

    /// Last published state.
    pub fn state(&self) -> PlaybackState {
        **self.published.load()
    }

    /// Live audio time from the clock.
    pub fn audio_time(&self) -> f64 {
        self.clock.now(self.hardware_now())
    }

    /// Live grid time from the clock.
    pub fn grid_time(&self) -> f64 {
        self.tempo.load().audio_to_grid(self.audio_time())
    }

    pub fn speed_percent(&self) -> f64 {
        self.clock.speed_percent()
    }

    pub fn clock_state(&self) -> ClockState {
        *self.clock.snapshot()
    }

    pub fn scheduled_beat_count(&self) -> usize {
        self.scheduler.lock().scheduled().len()
    }

    pub fn dropped_late_beats(&self) -> u64 {
        self.scheduler.lock().dropped_late()
    }

    /// A bounded feed of published states. Slow receivers miss updates.
    pub fn subscribe(&self, capacity: usize) -> Receiver<PlaybackState> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    // ---- internals ----

    fn window<'a>(&self, clock: &'a ClockState, tempo: &'a TempoSnapshot) -> ScheduleWindow<'a> {
        let controller = LoopController::new(&self.loop_range.load(), tempo, self.duration());
        ScheduleWindow {
            clock,
            tempo,
            grid_limit: controller.grid_limit(),
        }
    }

    fn resync_scheduler(&self, hw: f64) {
        let mut scheduler = self.scheduler.lock();
        let clock = self.clock.snapshot();
        let tempo = self.tempo.load_full();
        let window = self.window(&clock, &tempo);
        scheduler.resync(hw, &window);
    }

    fn end_grid(&self, tempo: &TempoSnapshot) -> f64 {
        let duration = self.duration();
        if duration.is_finite() {
            tempo.audio_to_grid(duration)
        } else {
            f64::INFINITY
        }
    }

    fn current_state(&self) -> PlaybackState {
        let clock = self.clock.snapshot();
        let tempo = self.tempo.load_full();
        let audio = clock.audio_at(self.hardware_now());
        self.state_at(tempo.audio_to_grid(audio), audio, &clock, &tempo)
    }

    fn state_at(
        &self,
        grid_time: f64,
        audio_time: f64,
        clock: &ClockState,
        tempo: &TempoSnapshot,
    ) -> PlaybackState {
        let position = tempo.position(grid_time);
        let motion = self.motion();
        PlaybackState {
            motion,
            is_playing: motion == MotionState::Playing,
            grid_time,
            audio_time,
            bar: position.bar,
            beat_number: position.beat_number,
            beat_index: position.beat_index,
            is_strong_beat: position.is_strong_beat,
            time_signature: position.time_signature,
            tempo: tempo.resolver().tempo_at(grid_time),
            speed_percent: clock.speed_percent,
            loop_enabled: self.loop_range.load().enabled,
        }
    }

    fn publish(&self, state: PlaybackState) {
        self.published.store(Arc::new(state));
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !matches!(tx.try_send(state), Err(TrySendError::Disconnected(_))));
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("motion", &self.motion())
            .field("clock", &self.clock.snapshot())
            .field("loop_range", &self.loop_range())
            .field("duration", &self.duration())
            .finish_non_exhaustive()
    }
}

fn clamp_grid(grid_time: f64, end: f64) -> f64 {
    if grid_time.is_nan() {
        0.0
    } else {
        grid_time.clamp(0.0, end)
    }
}

fn initial_state(tempo: &TempoSnapshot) -> PlaybackState {
    let position = tempo.position(0.0);
    PlaybackState {
        motion: MotionState::Stopped,
        is_playing: false,
        grid_time: 0.0,
        audio_time: 0.0,
        bar: position.bar,
        beat_number: position.beat_number,
        beat_index: position.beat_index,
        is_strong_beat: position.is_strong_beat,
        time_signature: position.time_signature,
        tempo: tempo.resolver().tempo_at(0.0),
        speed_percent: 100.0,
        loop_enabled: false,
    }
}

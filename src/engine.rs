//! PlaybackEngine: a session plus the periodic tasks that drive it.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::backend::{BackendFactory, MainLoopBackend, SchedulerBackend, TickFn};
use crate::config::EngineConfig;
use crate::core::{
    LoopRange, MotionState, PlaybackState, Session, Song, TempoChange, TrackHandle, TrackId,
    TrackStatus,
};
use crate::handle::MetronomeHandle;
use crate::Result;

/// One periodic task and the backend running it.
struct Task {
    name: &'static str,
    interval: Duration,
    backend: Mutex<Box<dyn SchedulerBackend>>,
}

/// Owns a [`Session`] and runs its scheduler and sync ticks while playing.
///
/// Tasks start on `play` and stop on `pause`/`stop`. They also end by
/// themselves when the session stops at end of media.
///
/// # Example
///
/// ```ignore
/// use gridsync::prelude::*;
///
/// let engine = PlaybackEngine::builder()
///     .song(Song::new(96.0, 240.0))
///     .click_queue(64)
///     .build()?;
///
/// engine.metronome().enabled(true).volume(0.8);
/// engine.play()?;
/// ```
pub struct PlaybackEngine {
    session: Arc<Session>,
    config: EngineConfig,
    scheduler: Task,
    sync: Task,
    click_events: Option<Receiver<gridsync_core::ClickEvent>>,
}

impl PlaybackEngine {
    pub fn builder() -> crate::PlaybackEngineBuilder {
        crate::PlaybackEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        session: Arc<Session>,
        config: EngineConfig,
        factory: BackendFactory,
        click_events: Option<Receiver<gridsync_core::ClickEvent>>,
    ) -> Self {
        Self {
            scheduler: Task {
                name: "scheduler",
                interval: config.session.scheduler_interval,
                backend: Mutex::new(factory()),
            },
            sync: Task {
                name: "sync",
                interval: config.session.sync_interval,
                backend: Mutex::new(factory()),
            },
            session,
            config,
            click_events,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receiver for scheduled clicks, when built with `click_queue`.
    pub fn click_events(&self) -> Option<&Receiver<gridsync_core::ClickEvent>> {
        self.click_events.as_ref()
    }

    // ---- transport ----

    pub fn play(&self) -> Result<()> {
        self.session.play();
        if self.session.is_playing() {
            self.start_tasks()?;
        }
        Ok(())
    }

    pub fn pause(&self) {
        self.session.pause();
        self.stop_tasks();
    }

    pub fn stop(&self) {
        self.session.stop();
        self.stop_tasks();
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        if self.session.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn seek(&self, grid_time: f64) {
        self.session.seek(grid_time);
    }

    pub fn set_speed(&self, percent: f64) {
        self.session.set_speed(percent);
    }

    pub fn set_loop(&self, range: LoopRange) -> Result<()> {
        Ok(self.session.set_loop(range)?)
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    pub fn motion(&self) -> MotionState {
        self.session.motion()
    }

    // ---- song and tempo ----

    pub fn load_song(&self, song: &Song) -> Result<()> {
        self.session.load_song(song)?;
        self.stop_tasks();
        Ok(())
    }

    pub fn set_tempo_changes(&self, changes: &[TempoChange]) -> Result<()> {
        Ok(self.session.set_tempo_changes(changes)?)
    }

    pub fn set_base_tempo(&self, bpm: f64) {
        self.session.set_base_tempo(bpm);
    }

    pub fn set_warp_enabled(&self, enabled: bool) {
        self.session.set_warp_enabled(enabled);
    }

    // ---- tracks ----

    pub fn add_track(&self, handle: Box<dyn TrackHandle>) -> TrackId {
        self.session.add_track(handle)
    }

    pub fn remove_track(&self, id: TrackId) -> Result<Box<dyn TrackHandle>> {
        Ok(self.session.remove_track(id)?)
    }

    pub fn track_status(&self, id: TrackId) -> Result<TrackStatus> {
        Ok(self.session.track_status(id)?)
    }

    // ---- metronome / state ----

    pub fn metronome(&self) -> MetronomeHandle {
        MetronomeHandle::new(Arc::clone(self.session.click_settings()))
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state()
    }

    pub fn subscribe(&self, capacity: usize) -> Receiver<PlaybackState> {
        self.session.subscribe(capacity)
    }

    // ---- tasks ----

    /// Drive main-loop tasks. Call from the host loop; thread tasks ignore it.
    ///
    /// Returns how many tasks ticked.
    pub fn pump(&self) -> usize {
        let now = Instant::now();
        [&self.scheduler, &self.sync]
            .into_iter()
            .filter(|task| task.backend.lock().pump(now))
            .count()
    }

    /// Backend names for the scheduler and sync tasks.
    pub fn backend_names(&self) -> (&'static str, &'static str) {
        (
            self.scheduler.backend.lock().name(),
            self.sync.backend.lock().name(),
        )
    }

    pub fn tasks_running(&self) -> bool {
        self.scheduler.backend.lock().is_running() || self.sync.backend.lock().is_running()
    }

    fn start_tasks(&self) -> Result<()> {
        let session = Arc::clone(&self.session);
        let scheduler_tick: TickFn = Arc::new(move || {
            session.tick_scheduler();
            keep_going(&session)
        });
        start_task(&self.scheduler, scheduler_tick)?;

        let session = Arc::clone(&self.session);
        let sync_tick: TickFn = Arc::new(move || {
            session.tick_sync();
            keep_going(&session)
        });
        start_task(&self.sync, sync_tick)
    }

    fn stop_tasks(&self) {
        self.scheduler.backend.lock().stop();
        self.sync.backend.lock().stop();
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("session", &self.session)
            .field("backends", &self.backend_names())
            .finish_non_exhaustive()
    }
}

fn keep_going(session: &Session) -> ControlFlow<()> {
    if session.is_playing() {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(())
    }
}

/// Start `task`, falling back to the main loop if its backend refuses.
fn start_task(task: &Task, tick: TickFn) -> Result<()> {
    let mut backend = task.backend.lock();
    match backend.start(task.name, task.interval, Arc::clone(&tick)) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::warn!(
                task = task.name,
                backend = backend.name(),
                error = %err,
                "scheduler backend failed to start, falling back to main loop"
            );
            let mut fallback: Box<dyn SchedulerBackend> = Box::new(MainLoopBackend::new());
            fallback.start(task.name, task.interval, tick)?;
            *backend = fallback;
            Ok(())
        }
    }
}

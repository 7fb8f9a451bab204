//! Builder for configuring and constructing a `PlaybackEngine`.

use std::sync::Arc;

use crate::backend::{BackendFactory, BackendKind, SchedulerBackend};
use crate::config::EngineConfig;
use crate::core::{
    AudioClockSource, ClickEvent, ClickSink, MonotonicClock, Session, Song, TrackHandle,
};
use crate::{PlaybackEngine, Result};

/// Without a clock source the engine reads a monotonic system clock. Without
/// a click sink or click queue, scheduled beats are tracked but not delivered.
///
/// # Example
///
/// ```ignore
/// use gridsync::prelude::*;
///
/// let engine = PlaybackEngine::builder()
///     .backend(BackendKind::MainLoop)
///     .song(song)
///     .track(Box::new(stem))
///     .build()?;
///
/// loop {
///     engine.pump();
///     // ... host work ...
/// }
/// ```
#[derive(Default)]
pub struct PlaybackEngineBuilder {
    config: EngineConfig,
    clock_source: Option<Arc<dyn AudioClockSource>>,
    click_sink: Option<Arc<dyn ClickSink>>,
    click_queue: Option<usize>,
    backend_factory: Option<BackendFactory>,
    song: Option<Song>,
    tracks: Vec<Box<dyn TrackHandle>>,
}

impl PlaybackEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: [`BackendKind::Thread`]
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.config.backend = kind;
        self
    }

    /// Supply the backend for each task instead of using `BackendKind`.
    pub fn scheduler_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SchedulerBackend> + Send + Sync + 'static,
    {
        self.backend_factory = Some(Arc::new(factory));
        self
    }

    /// The hardware clock that click times are expressed in.
    pub fn clock_source(mut self, source: Arc<dyn AudioClockSource>) -> Self {
        self.clock_source = Some(source);
        self
    }

    pub fn click_sink(mut self, sink: Arc<dyn ClickSink>) -> Self {
        self.click_sink = Some(sink);
        self
    }

    /// Deliver clicks on a bounded queue, read with `engine.click_events()`.
    /// Replaces any `click_sink`.
    pub fn click_queue(mut self, capacity: usize) -> Self {
        self.click_queue = Some(capacity.max(1));
        self
    }

    pub fn song(mut self, song: Song) -> Self {
        self.song = Some(song);
        self
    }

    pub fn track(mut self, handle: Box<dyn TrackHandle>) -> Self {
        self.tracks.push(handle);
        self
    }

    pub fn build(self) -> Result<PlaybackEngine> {
        self.config.validate()?;

        let source: Arc<dyn AudioClockSource> = match self.clock_source {
            Some(source) => source,
            None => Arc::new(MonotonicClock::new()),
        };
        let mut session = Session::new(self.config.session.clone(), source)?;

        let mut click_events = None;
        let sink = match self.click_queue {
            Some(capacity) => {
                let (tx, rx) = crossbeam_channel::bounded::<ClickEvent>(capacity);
                click_events = Some(rx);
                Some(Arc::new(tx) as Arc<dyn ClickSink>)
            }
            None => self.click_sink,
        };
        if let Some(sink) = sink {
            session = session.with_click_sink(sink);
        }

        if let Some(song) = &self.song {
            session.load_song(song)?;
        }
        for track in self.tracks {
            session.add_track(track);
        }

        let factory: BackendFactory = match self.backend_factory {
            Some(factory) => factory,
            None => {
                let kind = self.config.backend;
                let high_priority = self.config.high_priority_timers;
                Arc::new(move || kind.create(high_priority))
            }
        };
        tracing::debug!(backend = ?self.config.backend, "playback engine built");

        Ok(PlaybackEngine::from_parts(
            Arc::new(session),
            self.config,
            factory,
            click_events,
        ))
    }
}

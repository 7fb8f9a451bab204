//! # gridsync - Multi-track Playback Synchronization
//!
//! Keeps a set of audio tracks, a warped tempo grid, and a lookahead
//! metronome on one reference clock.
//!
//! ## Architecture
//!
//! gridsync is an umbrella crate over:
//! - **gridsync-core** - the timing kernel (WarpMap, TempoResolver, Meter,
//!   PlaybackClock, LookaheadScheduler, MultiTrackSynchronizer, Session)
//! - **backend** - periodic task runners (timer thread, host main loop)
//! - **engine** - [`PlaybackEngine`], which starts and stops the tasks with
//!   the transport
//!
//! ## Quick Start
//!
//! ```ignore
//! use gridsync::prelude::*;
//!
//! let song = Song::new(120.0, 200.0).with_tempo_changes(vec![
//!     TempoChange::new(32.0, 90.0).with_time_signature(TimeSignature::new(6, 8)),
//! ]);
//!
//! let engine = PlaybackEngine::builder()
//!     .song(song)
//!     .click_queue(64)
//!     .build()?;
//!
//! engine.metronome().enabled(true).accented();
//! engine.play()?;
//!
//! for click in engine.click_events().unwrap() {
//!     // hand `click.time` and `click.frequency` to the audio device
//! }
//! ```

/// Re-export of gridsync-core for direct access
pub use gridsync_core as core;

pub use gridsync_core::{
    Accent, AnchorReason, AudioClockSource, BeatInfo, BeatPosition, ClickEvent, ClickSettings,
    ClickSink, ClickVoice, ClockState, CurveKind, LoopAction, LoopController, LoopRange,
    LookaheadScheduler, ManualClock, Meter, MetronomeMode, MonotonicClock, MotionState,
    MultiTrackSynchronizer, PlaybackClock, PlaybackState, ScheduledBeat, Session, SessionConfig,
    Song, Subdivision, SyncReport, TempoChange, TempoCurve, TempoMap, TempoResolver,
    TempoSnapshot, TimeSignature, TrackError, TrackHandle, TrackId, TrackStatus, WarpMap,
};

pub mod error;
pub use error::{Error, Result};

pub mod backend;
pub use backend::{BackendKind, MainLoopBackend, SchedulerBackend, ThreadBackend, TickFn};

mod config;
pub use config::EngineConfig;

mod builder;
mod engine;
mod handle;

pub use builder::PlaybackEngineBuilder;
pub use engine::PlaybackEngine;
pub use handle::MetronomeHandle;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{BackendKind, EngineConfig, PlaybackEngine, PlaybackEngineBuilder};

    // Song data
    pub use crate::core::{CurveKind, Song, Subdivision, TempoChange, TimeSignature};

    // Transport
    pub use crate::core::{LoopRange, MotionState, PlaybackState};

    // Tracks and clicks
    pub use crate::core::{ClickEvent, MetronomeMode, TrackError, TrackHandle, TrackId};
}

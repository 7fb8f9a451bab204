//! Timing kernel for multi-track playback against a warped tempo grid.
//!
//! # Primary API
//!
//! - [`Session`]: transport commands plus the scheduler and sync tick bodies
//! - [`TempoMap`] / [`WarpMap`]: grid time <-> audio time
//! - [`TempoResolver`] / [`Meter`]: beats, bars, accents
//! - [`LookaheadScheduler`]: click scheduling against the hardware clock
//! - [`MultiTrackSynchronizer`]: drift correction across track handles
//!
//! # Example
//!
//! ```ignore
//! use gridsync_core::*;
//!
//! let session = Session::new(SessionConfig::default(), Arc::new(MonotonicClock::new()))?;
//! session.load_song(&Song::new(120.0, 180.0))?;
//! session.play();
//!
//! // From the periodic tasks:
//! session.tick_scheduler();
//! let state = session.tick_sync();
//! ```

pub mod error;
pub use error::{Error, Result, TrackError};

pub mod config;
pub use config::SessionConfig;

pub mod tempo;
pub use tempo::{
    clamp_tempo, BeatPosition, CurveKind, Subdivision, TempoChange, TempoCurve, TempoInfo,
    TempoMap, TempoResolver, TempoSnapshot, TimeSignature, WarpMap, WarpSegment,
    DEFAULT_TEMPO_BPM, MAX_TEMPO_BPM, MIN_TEMPO_BPM,
};

pub mod meter;
pub use meter::{Accent, BeatInfo, Meter};

pub mod transport;
pub use transport::{
    AnchorReason, AudioClockSource, ClockState, LoopAction, LoopController, LoopRange,
    ManualClock, MonotonicClock, MotionState, PlaybackClock, TransportEvent, TransportFsm,
};

pub mod scheduler;
pub use scheduler::{
    LookaheadScheduler, ScheduleWindow, ScheduledBeat, ScheduledBeatSet, SchedulerState,
};

pub mod click;
pub use click::{ClickEvent, ClickSettings, ClickSink, ClickVoice, MetronomeMode};

pub mod sync;
pub use sync::{MultiTrackSynchronizer, SyncReport, TrackHandle, TrackId, TrackStatus};

pub mod song;
pub use song::Song;

mod session;
pub use session::{PlaybackState, Session};

pub mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};

pub use std::sync::Arc;

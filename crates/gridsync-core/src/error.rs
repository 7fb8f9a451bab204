//! Error types for gridsync-core.

use thiserror::Error;

use crate::sync::TrackId;

/// Error type for gridsync-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid time signature: {0:?}. Expected \"N/D\" with D a power of two")]
    InvalidTimeSignature(String),

    #[error("Invalid subdivision pattern: {0:?}")]
    InvalidSubdivision(String),

    #[error("Invalid tempo change at {time}: {reason}")]
    InvalidTempoChange { time: f64, reason: &'static str },

    #[error("Invalid song duration: {0}")]
    InvalidDuration(f64),

    #[error("Invalid loop range: start={start}, end={end}")]
    InvalidLoopRange { start: f64, end: f64 },

    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("Track {id}: {source}")]
    Track {
        id: TrackId,
        #[source]
        source: TrackError,
    },
}

/// Failure reported by a single track's audio handle.
///
/// Track errors never stop the clock; the synchronizer records them per track.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error("media error: {0}")]
    Media(String),

    #[error("track not ready")]
    NotReady,

    #[error("track detached from output")]
    Detached,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

//! Integration test modules for gridsync
//!
//! - engine: builder, backends, fallback, task lifecycle
//! - transport: play/pause/stop/seek/speed/loop/end of media
//! - warp: grid <-> audio mapping and the song data contract
//! - scheduler: lookahead clicks, meters, tempo edits, late beats
//! - sync: drift correction and per-track fault isolation

pub mod scheduler;
pub mod sync;
pub mod transport;
pub mod warp;

//! Keeps N independently playing audio sources aligned to the playback clock.

use core::fmt;

use crate::error::{Error, Result, TrackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl TrackId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

/// One playing audio source, as exposed by the host's audio backend.
///
/// Times are audio seconds in the source's own file.
pub trait TrackHandle: Send {
    fn native_time(&self) -> core::result::Result<f64, TrackError>;
    fn set_native_time(&mut self, seconds: f64) -> core::result::Result<(), TrackError>;
    fn playback_rate(&self) -> core::result::Result<f64, TrackError>;
    fn set_playback_rate(&mut self, rate: f64) -> core::result::Result<(), TrackError>;
    fn play(&mut self) -> core::result::Result<(), TrackError>;
    fn pause(&mut self) -> core::result::Result<(), TrackError>;
}

/// Health of one track as seen by the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackStatus {
    pub id: TrackId,
    pub faults: u64,
    pub last_error: Option<TrackError>,
    /// Hard position corrections applied so far.
    pub corrections: u64,
}

/// What one synchronizer pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub position_corrections: usize,
    pub rate_updates: usize,
    pub faults: usize,
}

struct TrackSlot {
    id: TrackId,
    handle: Box<dyn TrackHandle>,
    faults: u64,
    last_error: Option<TrackError>,
    corrections: u64,
}

impl TrackSlot {
    fn record(&mut self, op: &'static str, err: TrackError) {
        tracing::warn!(track = %self.id, op, error = %err, "track sync failed");
        self.faults += 1;
        self.last_error = Some(err);
    }

    fn status(&self) -> TrackStatus {
        TrackStatus {
            id: self.id,
            faults: self.faults,
            last_error: self.last_error.clone(),
            corrections: self.corrections,
        }
    }
}

/// Nudges every track toward the clock's audio time.
///
/// Position and rate are corrected independently. A failing track is
/// recorded and skipped; it never stops the others.
pub struct MultiTrackSynchronizer {
    tracks: Vec<TrackSlot>,
    next_id: u64,
    drift_threshold: f64,
    rate_epsilon: f64,
}

impl MultiTrackSynchronizer {
    /// `drift_threshold` in seconds.
    pub fn new(drift_threshold: f64, rate_epsilon: f64) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            drift_threshold,
            rate_epsilon,
        }
    }

    pub fn add(&mut self, handle: Box<dyn TrackHandle>) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.tracks.push(TrackSlot {
            id,
            handle,
            faults: 0,
            last_error: None,
            corrections: 0,
        });
        id
    }

    pub fn remove(&mut self, id: TrackId) -> Result<Box<dyn TrackHandle>> {
        let idx = self
            .tracks
            .iter()
            .position(|slot| slot.id == id)
            .ok_or(Error::UnknownTrack(id))?;
        Ok(self.tracks.remove(idx).handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|slot| slot.id).collect()
    }

    pub fn status(&self, id: TrackId) -> Result<TrackStatus> {
        self.tracks
            .iter()
            .find(|slot| slot.id == id)
            .map(TrackSlot::status)
            .ok_or(Error::UnknownTrack(id))
    }

    pub fn statuses(&self) -> Vec<TrackStatus> {
        self.tracks.iter().map(TrackSlot::status).collect()
    }

    /// One correction pass toward `audio_time` at `rate`.
    pub fn tick(&mut self, audio_time: f64, rate: f64) -> SyncReport {
        let mut report = SyncReport::default();

        for slot in &mut self.tracks {
            match slot.handle.native_time() {
                Ok(native) => {
                    let drift = (native - audio_time).abs();
                    if drift > self.drift_threshold {
                        match slot.handle.set_native_time(audio_time) {
                            Ok(()) => {
                                tracing::debug!(
                                    track = %slot.id,
                                    drift_ms = drift * 1000.0,
                                    "hard drift correction"
                                );
                                slot.corrections += 1;
                                report.position_corrections += 1;
                            }
                            Err(err) => {
                                slot.record("set_native_time", err);
                                report.faults += 1;
                                continue;
                            }
                        }
                    }
                }
                Err(err) => {
                    slot.record("native_time", err);
                    report.faults += 1;
                    continue;
                }
            }

            let result = slot.handle.playback_rate().and_then(|current| {
                if (current - rate).abs() > self.rate_epsilon {
                    slot.handle.set_playback_rate(rate).map(|()| true)
                } else {
                    Ok(false)
                }
            });
            match result {
                Ok(true) => report.rate_updates += 1,
                Ok(false) => {}
                Err(err) => {
                    slot.record("playback_rate", err);
                    report.faults += 1;
                }
            }
        }

        report
    }

    /// Hard-set every track to `audio_time`.
    pub fn seek_all(&mut self, audio_time: f64) -> SyncReport {
        self.for_each("seek", |handle| handle.set_native_time(audio_time))
    }

    /// Position, rate, then play.
    pub fn start_all(&mut self, audio_time: f64, rate: f64) -> SyncReport {
        self.for_each("play", |handle| {
            handle.set_native_time(audio_time)?;
            handle.set_playback_rate(rate)?;
            handle.play()
        })
    }

    pub fn pause_all(&mut self) -> SyncReport {
        self.for_each("pause", |handle| handle.pause())
    }

    /// Bring a single track into line with the others.
    pub fn start_one(&mut self, id: TrackId, audio_time: f64, rate: f64) -> Result<()> {
        let slot = self
            .tracks
            .iter_mut()
            .find(|slot| slot.id == id)
            .ok_or(Error::UnknownTrack(id))?;
        let result = slot
            .handle
            .set_native_time(audio_time)
            .and_then(|()| slot.handle.set_playback_rate(rate))
            .and_then(|()| slot.handle.play());
        result.map_err(|err| {
            slot.record("play", err.clone());
            Error::Track { id, source: err }
        })
    }

    fn for_each(
        &mut self,
        op: &'static str,
        mut f: impl FnMut(&mut dyn TrackHandle) -> core::result::Result<(), TrackError>,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for slot in &mut self.tracks {
            if let Err(err) = f(slot.handle.as_mut()) {
                slot.record(op, err);
                report.faults += 1;
            }
        }
        report
    }
}

impl fmt::Debug for MultiTrackSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiTrackSynchronizer")
            .field("tracks", &self.ids())
            .field("drift_threshold", &self.drift_threshold)
            .field("rate_epsilon", &self.rate_epsilon)
            .finish()
    }
}

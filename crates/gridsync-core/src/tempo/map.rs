//! Tempo map writer and the immutable snapshots it publishes.

use std::sync::Arc;

use super::{
    clamp_tempo, normalize_changes, with_origin, BeatPosition, TempoChange, TempoInfo,
    TempoResolver, WarpMap, DEFAULT_TEMPO_BPM,
};
use crate::error::Result;
use crate::song::Song;

/// Read-only view of the tempo map at one version.
///
/// Readers hold an `Arc<TempoSnapshot>` for the duration of a tick; edits
/// build a new snapshot instead of mutating this one.
#[derive(Debug, Clone)]
pub struct TempoSnapshot {
    version: u64,
    base_tempo: f64,
    warp: WarpMap,
    resolver: TempoResolver,
}

impl TempoSnapshot {
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    #[inline]
    pub fn warp(&self) -> &WarpMap {
        &self.warp
    }

    #[inline]
    pub fn resolver(&self) -> &TempoResolver {
        &self.resolver
    }

    #[inline]
    pub fn grid_to_audio(&self, grid_time: f64) -> f64 {
        self.warp.grid_to_audio(grid_time)
    }

    #[inline]
    pub fn audio_to_grid(&self, audio_time: f64) -> f64 {
        self.warp.audio_to_grid(audio_time)
    }

    #[inline]
    pub fn at(&self, grid_time: f64) -> TempoInfo<'_> {
        self.resolver.at(grid_time)
    }

    #[inline]
    pub fn position(&self, grid_time: f64) -> BeatPosition {
        self.resolver.position(grid_time)
    }
}

/// Owns the authored tempo changes and rebuilds the snapshot on every edit.
#[derive(Debug, Clone)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
    base_tempo: f64,
    warp_enabled: bool,
    version: u64,
    snapshot: Arc<TempoSnapshot>,
}

impl TempoMap {
    pub fn new(base_tempo: f64) -> Self {
        let base_tempo = clamp_tempo(base_tempo);
        let snapshot = Arc::new(build_snapshot(&[], base_tempo, true, 0));
        Self {
            changes: Vec::new(),
            base_tempo,
            warp_enabled: true,
            version: 0,
            snapshot,
        }
    }

    pub fn from_song(song: &Song) -> Result<Self> {
        let mut map = Self::new(song.tempo);
        map.set_changes(&song.tempo_changes)?;
        Ok(map)
    }

    pub fn snapshot(&self) -> Arc<TempoSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Replace the change list. The map is left untouched on error.
    pub fn set_changes(&mut self, changes: &[TempoChange]) -> Result<()> {
        self.changes = normalize_changes(changes)?;
        self.rebuild_snapshot();
        Ok(())
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    pub fn set_base_tempo(&mut self, bpm: f64) {
        self.base_tempo = clamp_tempo(bpm);
        self.rebuild_snapshot();
    }

    pub fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    pub fn set_warp_enabled(&mut self, enabled: bool) {
        self.warp_enabled = enabled;
        self.rebuild_snapshot();
    }

    pub fn warp_enabled(&self) -> bool {
        self.warp_enabled
    }

    /// Incremented on every rebuild.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn rebuild_snapshot(&mut self) {
        self.version += 1;
        self.snapshot = Arc::new(build_snapshot(
            &self.changes,
            self.base_tempo,
            self.warp_enabled,
            self.version,
        ));
    }
}

fn build_snapshot(
    changes: &[TempoChange],
    base_tempo: f64,
    warp_enabled: bool,
    version: u64,
) -> TempoSnapshot {
    let effective = with_origin(changes.to_vec(), base_tempo);
    TempoSnapshot {
        version,
        base_tempo,
        warp: WarpMap::from_effective(&effective, base_tempo).with_enabled(warp_enabled),
        resolver: TempoResolver::from_effective(&effective),
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO_BPM)
    }
}

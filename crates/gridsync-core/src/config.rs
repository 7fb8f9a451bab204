//! Session timing configuration.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Timing parameters for a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How far ahead of the hardware clock beats are scheduled.
    pub lookahead: Duration,
    /// Period of the scheduler task.
    pub scheduler_interval: Duration,
    /// Period of the sync/state-publication task.
    pub sync_interval: Duration,
    /// Track drift above this is hard-corrected.
    pub drift_threshold: Duration,
    /// Track rate difference above this is corrected.
    pub rate_epsilon: f64,
    /// Beats later than this are dropped instead of fired.
    pub late_tolerance: Duration,
    pub scheduled_beat_capacity: usize,
    /// Entries kept when the scheduled-beat set is pruned.
    pub scheduled_beat_retain: usize,
    pub min_speed_percent: f64,
    pub max_speed_percent: f64,
    pub warp_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lookahead: Duration::from_millis(200),
            scheduler_interval: Duration::from_millis(25),
            sync_interval: Duration::from_millis(16),
            drift_threshold: Duration::from_millis(20),
            rate_epsilon: 0.01,
            late_tolerance: Duration::from_millis(2),
            scheduled_beat_capacity: 100,
            scheduled_beat_retain: 50,
            min_speed_percent: 50.0,
            max_speed_percent: 150.0,
            warp_enabled: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scheduler_interval.is_zero() || self.sync_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "task intervals must be non-zero".to_string(),
            ));
        }
        if self.lookahead <= self.scheduler_interval * 2 {
            return Err(Error::InvalidConfig(format!(
                "lookahead {:?} must exceed twice the scheduler interval {:?}",
                self.lookahead, self.scheduler_interval
            )));
        }
        if !(self.rate_epsilon.is_finite() && self.rate_epsilon >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "rate_epsilon {} must be finite and non-negative",
                self.rate_epsilon
            )));
        }
        if self.scheduled_beat_retain == 0
            || self.scheduled_beat_retain > self.scheduled_beat_capacity
        {
            return Err(Error::InvalidConfig(format!(
                "scheduled_beat_retain {} out of range (1-{})",
                self.scheduled_beat_retain, self.scheduled_beat_capacity
            )));
        }
        if !(self.min_speed_percent > 0.0
            && self.min_speed_percent <= 100.0
            && self.max_speed_percent >= 100.0
            && self.max_speed_percent.is_finite())
        {
            return Err(Error::InvalidConfig(format!(
                "speed range {}-{}% must contain 100%",
                self.min_speed_percent, self.max_speed_percent
            )));
        }
        Ok(())
    }

    /// Clamp a speed percentage into the configured range.
    pub fn clamp_speed(&self, percent: f64) -> f64 {
        if percent.is_finite() {
            percent.clamp(self.min_speed_percent, self.max_speed_percent)
        } else {
            100.0
        }
    }
}

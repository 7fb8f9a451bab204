//! Lookahead beat scheduling against the hardware clock.

mod beat_set;
mod lookahead;

pub use beat_set::ScheduledBeatSet;
pub use lookahead::{LookaheadScheduler, ScheduleWindow, ScheduledBeat, SchedulerState};

mod clock;
mod fsm;
mod looping;

pub use clock::{
    AnchorReason, AudioClockSource, ClockState, ManualClock, MonotonicClock, PlaybackClock,
};
pub use fsm::{MotionState, TransitionResult, TransportEvent, TransportFsm};
pub use looping::{LoopAction, LoopController, LoopRange};

//! Transport state machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MotionState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl From<u8> for MotionState {
    fn from(value: u8) -> Self {
        match value {
            1 => MotionState::Playing,
            2 => MotionState::Paused,
            _ => MotionState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    /// Playback reached the end of the media with no loop active.
    EndOfMedia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    None,
    MotionChanged {
        from: MotionState,
        to: MotionState,
    },
}

#[derive(Debug, Default)]
pub struct TransportFsm {
    motion: MotionState,
}

impl TransportFsm {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn motion(&self) -> MotionState {
        self.motion
    }

    pub fn transition(&mut self, event: TransportEvent) -> TransitionResult {
        use MotionState::*;
        use TransportEvent::*;

        let next = match (event, self.motion) {
            (Play, Stopped | Paused) => Playing,
            (Pause, Playing) => Paused,
            (TogglePlayPause, Playing) => Paused,
            (TogglePlayPause, Stopped | Paused) => Playing,
            (Stop, Playing | Paused) => Stopped,
            (EndOfMedia, Playing) => Stopped,
            _ => return TransitionResult::None,
        };

        let from = self.motion;
        self.motion = next;
        TransitionResult::MotionChanged { from, to: next }
    }
}

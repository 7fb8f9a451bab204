//! Atomic cells for values the control path writes and the timer threads
//! read: metronome settings, the manual test clock, media duration.
//!
//! Each cell is padded to its own cache line, so the scheduler reading the
//! click volume never contends with a test thread advancing the clock.

use atomic_float::{AtomicF32, AtomicF64};
use std::sync::atomic::{AtomicBool, Ordering};

macro_rules! atomic_cell {
    ($(#[$meta:meta])* $name:ident($atomic:ty) -> $value:ty = $zero:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[repr(align(64))]
        pub struct $name {
            value: $atomic,
        }

        impl $name {
            pub fn new(value: $value) -> Self {
                Self {
                    value: <$atomic>::new(value),
                }
            }

            #[inline]
            pub fn get(&self) -> $value {
                self.value.load(Ordering::Acquire)
            }

            #[inline]
            pub fn set(&self, value: $value) {
                self.value.store(value, Ordering::Release);
            }

            /// Store `value`, returning what it replaced.
            #[inline]
            pub fn replace(&self, value: $value) -> $value {
                self.value.swap(value, Ordering::AcqRel)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new($zero)
            }
        }
    };
}

atomic_cell! {
    /// Click gain and pitch.
    AtomicFloat(AtomicF32) -> f32 = 0.0
}

atomic_cell! {
    /// Seconds: hardware time, media duration.
    AtomicDouble(AtomicF64) -> f64 = 0.0
}

atomic_cell! {
    AtomicFlag(AtomicBool) -> bool = false
}

//! A wrapping millisecond clock.
//!
//! Deadlines are kept as 32 bit millisecond ticks. The tick counter wraps
//! around roughly every 49.7 days which the timeout scheduler in
//! [`timeout`][super::timeout] takes care of.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::{Duration, Instant};

//------------ Tick ------------------------------------------------------------

/// A point in time as milliseconds since some base, wrapping at 2^32.
pub type Tick = u32;

/// The tick value in the middle of the range.
///
/// Ticks below this are in the first half of the range.
pub const HALF_TICK: Tick = Tick::MAX / 2;

/// The longest duration that can be expressed in ticks without confusing
/// the wraparound detection.
pub const MAX_TICKS: Tick = Tick::MAX / 4;

/// Converts a duration into ticks, capped at [`MAX_TICKS`].
pub fn duration_to_ticks(duration: Duration) -> Tick {
    match Tick::try_from(duration.as_millis()) {
        Ok(ticks) => ticks.min(MAX_TICKS),
        Err(_) => MAX_TICKS,
    }
}

//------------ Clock -----------------------------------------------------------

/// A clock producing wrapping millisecond ticks.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    /// The instant tick `initial` corresponds to.
    base: Instant,

    /// The tick value at `base`.
    initial: Tick,
}

impl Clock {
    /// Creates a new clock that reads `initial` right now.
    pub fn new(initial: Tick) -> Self {
        Clock {
            base: Instant::now(),
            initial,
        }
    }

    /// Returns the current tick.
    pub fn now(&self) -> Tick {
        // Truncating the milliseconds is the wraparound.
        (self.base.elapsed().as_millis() as Tick).wrapping_add(self.initial)
    }
}

//============ Tests =========================================================

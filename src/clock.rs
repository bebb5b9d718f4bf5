//! Millisecond clock shared by the debouncer and the inactivity scheduler.
//!
//! Timestamps are `u32` milliseconds that wrap after ~49.7 days, the same
//! shape as a microcontroller `millis()` counter.  Every consumer compares
//! timestamps with [`elapsed_ms`] (wrapping subtraction), never with `<`.

use std::time::Instant;

/// Source of monotonic millisecond timestamps.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch, wrapping at `u32::MAX`.
    fn now_ms(&self) -> u32;
}

/// Milliseconds from `earlier` to `now`, correct across one wraparound.
pub fn elapsed_ms(now: u32, earlier: u32) -> u32 {
    now.wrapping_sub(earlier)
}

/// [`Clock`] backed by [`Instant`], truncated to `u32`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound.
        self.start.elapsed().as_millis() as u32
    }
}

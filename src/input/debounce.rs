//! Debounce engine: raw per-channel samples → confirmed press/release events.
//!
//! Each [`Channel`] remembers the last raw level it saw, the last level it
//! confirmed, and when the raw level last changed.  A change is confirmed
//! only once the raw level has held steady for the whole debounce window;
//! every flip inside the window restarts it.
//!
//! Timing uses wall-clock deltas ([`elapsed_ms`]), so the engine is correct
//! under irregular polling and across `u32` wraparound.

use crate::clock::elapsed_ms;
use crate::config::NUM_BUTTONS;

use super::{ButtonEvent, ButtonId, InputPins, Level, Transition};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Debounce state of one button line.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    index: usize,
    last_observed: Level,
    confirmed: Level,
    since: u32,
}

impl Channel {
    fn new(index: usize) -> Self {
        Self {
            index,
            last_observed: Level::IDLE,
            confirmed: Level::IDLE,
            since: 0,
        }
    }

    /// Zero-based channel index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Last level confirmed as stable.
    pub fn confirmed(&self) -> Level {
        self.confirmed
    }

    /// Feed one raw sample taken at `now`.
    ///
    /// Returns the transition when this sample completes a debounce window.
    pub fn sample(&mut self, raw: Level, now: u32, window_ms: u32) -> Option<Transition> {
        if raw != self.last_observed {
            self.last_observed = raw;
            self.since = now;
            return None;
        }

        if raw == self.confirmed || elapsed_ms(now, self.since) < window_ms {
            return None;
        }

        self.confirmed = raw;
        Some(if raw == Level::ACTIVE {
            Transition::Pressed
        } else {
            Transition::Released
        })
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Fixed arena of [`NUM_BUTTONS`] channels sharing one debounce window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    channels: [Channel; NUM_BUTTONS],
    window_ms: u32,
}

impl Debouncer {
    /// Create a debouncer; every channel starts idle (HIGH, released).
    pub fn new(window_ms: u32) -> Self {
        Self {
            channels: std::array::from_fn(Channel::new),
            window_ms,
        }
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Feed a single sample for channel `index`.
    pub fn sample(&mut self, index: usize, raw: Level, now: u32) -> Option<ButtonEvent> {
        let window_ms = self.window_ms;
        let channel = self.channels.get_mut(index)?;
        let transition = channel.sample(raw, now, window_ms)?;
        let button = ButtonId::from_index(index)?;
        Some(ButtonEvent { button, transition })
    }

    /// Sample every channel once and return the confirmed transitions in
    /// channel order.
    pub fn poll(&mut self, pins: &mut dyn InputPins, now: u32) -> Vec<ButtonEvent> {
        (0..NUM_BUTTONS)
            .filter_map(|index| {
                let raw = pins.read(index);
                self.sample(index, raw, now)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Button input: pin levels, button identities and the debounce engine.
//!
//! # Design
//!
//! ```text
//! InputPins::read(i)  ──raw Level──▶  Debouncer::poll(now)  ──▶ ButtonEvent
//! ```
//!
//! Buttons are wired active-low: the line idles HIGH through a pull-up and a
//! press grounds it.  [`Level::Low`] is therefore the pressed level.
//!
//! [`InputPins`] is the hardware seam.  The host build implements it with
//! [`KeyboardPins`], which maps configured keys to the six buttons.

pub mod debounce;
pub mod keyboard;

pub use debounce::{Channel, Debouncer};
pub use keyboard::{parse_key, KeyboardPins};

use std::fmt;

use crate::config::NUM_BUTTONS;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Electrical level of a button line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// The level a pressed (grounded) button reads at.
    pub const ACTIVE: Level = Level::Low;
    /// The level an idle button reads at through its pull-up.
    pub const IDLE: Level = Level::High;
}

// ---------------------------------------------------------------------------
// ButtonId
// ---------------------------------------------------------------------------

/// A button number in `1..=NUM_BUTTONS`, as printed on the enclosure and
/// used by the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(u8);

impl ButtonId {
    /// Returns `None` when `number` is outside `1..=NUM_BUTTONS`.
    ///
    /// ```
    /// use soundboard::input::ButtonId;
    ///
    /// assert!(ButtonId::new(1).is_some());
    /// assert!(ButtonId::new(6).is_some());
    /// assert!(ButtonId::new(0).is_none());
    /// assert!(ButtonId::new(7).is_none());
    /// ```
    pub fn new(number: u8) -> Option<Self> {
        (1..=NUM_BUTTONS as u8)
            .contains(&number)
            .then_some(Self(number))
    }

    /// Button for a zero-based channel index.
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::new)
    }

    /// Parse a button number sent by a client (`"3"`, `" 3 "`).
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::new)
    }

    /// All buttons in order.
    pub fn all() -> impl Iterator<Item = ButtonId> {
        (1..=NUM_BUTTONS as u8).map(ButtonId)
    }

    /// One-based button number.
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based channel index.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Name of this button's clip slot in the clip store.
    pub fn clip_name(self) -> String {
        format!("button{}.mp3", self.0)
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "button {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ButtonEvent
// ---------------------------------------------------------------------------

/// Direction of a confirmed level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pressed,
    Released,
}

/// A debounced press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub transition: Transition,
}

// ---------------------------------------------------------------------------
// InputPins
// ---------------------------------------------------------------------------

/// Raw, undebounced access to the button lines.
pub trait InputPins {
    /// Current level of channel `index` (`0..NUM_BUTTONS`).
    fn read(&mut self, index: usize) -> Level;
}

//! Keyboard stand-in for the button lines, backed by `rdev`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`KeyboardPins`] owns that thread and a table of "held" flags, one per
//! button.  The listener flips a flag on key press / release; the tick loop
//! reads the flags through [`InputPins`] exactly as it would sample GPIO
//! lines, so the debouncer sees the same raw-level stream either way.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Dropping
//! [`KeyboardPins`] sets a stop flag so the callback ignores further events,
//! but the OS thread stays blocked in the rdev event loop until the process
//! exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::config::NUM_BUTTONS;

use super::{InputPins, Level};

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from the config into an [`rdev::Key`].
///
/// Supports digits, F1–F12, single ASCII letters and a few named keys.
///
/// ```
/// use soundboard::input::parse_key;
///
/// assert_eq!(parse_key("1"),  Some(rdev::Key::Num1));
/// assert_eq!(parse_key("F6"), Some(rdev::Key::F6));
/// assert_eq!(parse_key("q"),  Some(rdev::Key::KeyQ));
/// assert_eq!(parse_key("xyz"), None);
/// ```
pub fn parse_key(key_str: &str) -> Option<rdev::Key> {
    use rdev::Key;

    let key = match key_str {
        "0" => Key::Num0,
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,

        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,

        "Space" => Key::Space,
        "Return" | "Enter" => Key::Return,

        other => return parse_letter(other),
    };
    Some(key)
}

fn parse_letter(key_str: &str) -> Option<rdev::Key> {
    use rdev::Key;

    let mut chars = key_str.chars();
    let c = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() {
        return None;
    }
    let key = match c {
        'a' => Key::KeyA,
        'b' => Key::KeyB,
        'c' => Key::KeyC,
        'd' => Key::KeyD,
        'e' => Key::KeyE,
        'f' => Key::KeyF,
        'g' => Key::KeyG,
        'h' => Key::KeyH,
        'i' => Key::KeyI,
        'j' => Key::KeyJ,
        'k' => Key::KeyK,
        'l' => Key::KeyL,
        'm' => Key::KeyM,
        'n' => Key::KeyN,
        'o' => Key::KeyO,
        'p' => Key::KeyP,
        'q' => Key::KeyQ,
        'r' => Key::KeyR,
        's' => Key::KeyS,
        't' => Key::KeyT,
        'u' => Key::KeyU,
        'v' => Key::KeyV,
        'w' => Key::KeyW,
        'x' => Key::KeyX,
        'y' => Key::KeyY,
        'z' => Key::KeyZ,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// KeyTable
// ---------------------------------------------------------------------------

/// Key → button map plus the shared "held" flags.
struct KeyTable {
    keys: [Option<rdev::Key>; NUM_BUTTONS],
    held: [AtomicBool; NUM_BUTTONS],
}

impl KeyTable {
    fn new(keys: [Option<rdev::Key>; NUM_BUTTONS]) -> Self {
        Self {
            keys,
            held: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    fn apply(&self, event: &rdev::EventType) {
        let (key, down) = match *event {
            rdev::EventType::KeyPress(k) => (k, true),
            rdev::EventType::KeyRelease(k) => (k, false),
            _ => return,
        };
        for (slot, held) in self.keys.iter().zip(&self.held) {
            if *slot == Some(key) {
                held.store(down, Ordering::Relaxed);
            }
        }
    }

    fn level(&self, index: usize) -> Level {
        match self.held.get(index) {
            Some(flag) if flag.load(Ordering::Relaxed) => Level::ACTIVE,
            _ => Level::IDLE,
        }
    }
}

// ---------------------------------------------------------------------------
// KeyboardPins
// ---------------------------------------------------------------------------

/// [`InputPins`] implementation fed by global keyboard events.
///
/// Construct one with [`KeyboardPins::start`].  Drop it to stop tracking.
pub struct KeyboardPins {
    table: Arc<KeyTable>,
    stop: Arc<AtomicBool>,
    _thread: Option<std::thread::JoinHandle<()>>,
}

impl KeyboardPins {
    /// Spawn the `keyboard-pins` listener thread.
    ///
    /// `keys` holds one key name per button; unknown names are logged and
    /// leave that button unmapped.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread.
    pub fn start(keys: &[String; NUM_BUTTONS]) -> Self {
        let mut pins = Self::unbound(keys);
        let table = Arc::clone(&pins.table);
        let stop = Arc::clone(&pins.stop);

        let thread = std::thread::Builder::new()
            .name("keyboard-pins".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    table.apply(&event.event_type);
                });

                if let Err(e) = result {
                    log::error!("keyboard-pins: rdev::listen exited with error: {:?}", e);
                }
            })
            .expect("failed to spawn keyboard-pins thread");

        pins._thread = Some(thread);
        pins
    }

    /// Build the key table without starting a listener thread.
    fn unbound(keys: &[String; NUM_BUTTONS]) -> Self {
        let mapped = std::array::from_fn(|i| {
            let key = parse_key(&keys[i]);
            if key.is_none() {
                log::warn!(
                    "keyboard-pins: unknown key {:?} for button {}, leaving it unmapped",
                    keys[i],
                    i + 1
                );
            }
            key
        });

        Self {
            table: Arc::new(KeyTable::new(mapped)),
            stop: Arc::new(AtomicBool::new(false)),
            _thread: None,
        }
    }
}

impl InputPins for KeyboardPins {
    fn read(&mut self, index: usize) -> Level {
        self.table.level(index)
    }
}

impl Drop for KeyboardPins {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn default_keys() -> [String; NUM_BUTTONS] {
        ["1", "2", "3", "4", "5", "6"].map(String::from)
    }

    #[test]
    fn parse_digits_and_function_keys() {
        assert_eq!(parse_key("1"), Some(rdev::Key::Num1));
        assert_eq!(parse_key("6"), Some(rdev::Key::Num6));
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
    }

    #[test]
    fn parse_letters_case_insensitive() {
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key("Ctrl+1"), None);
        assert_eq!(parse_key("é"), None);
    }

    #[test]
    fn held_key_reads_active_level() {
        let mut pins = KeyboardPins::unbound(&default_keys());
        assert_eq!(pins.read(2), Level::High);

        pins.table.apply(&rdev::EventType::KeyPress(rdev::Key::Num3));
        assert_eq!(pins.read(2), Level::Low);
        assert_eq!(pins.read(0), Level::High);

        pins.table.apply(&rdev::EventType::KeyRelease(rdev::Key::Num3));
        assert_eq!(pins.read(2), Level::High);
    }

    #[test]
    fn unmapped_keys_and_out_of_range_reads_are_idle() {
        let mut keys = default_keys();
        keys[0] = "nope".into();
        let mut pins = KeyboardPins::unbound(&keys);

        pins.table.apply(&rdev::EventType::KeyPress(rdev::Key::Num9));
        assert!((0..NUM_BUTTONS).all(|i| pins.read(i) == Level::High));
        assert_eq!(pins.read(NUM_BUTTONS + 3), Level::High);
    }
}

//! Wake-source planning and wake-cause reporting.
//!
//! Only RTC-capable GPIOs can wake the board from deep sleep.  Buttons are
//! idle LOW during sleep (pull-down enabled, pull-up disabled), so a press
//! drives the line HIGH and the ext1 "any high" trigger fires.

use crate::config::NUM_BUTTONS;
use crate::input::ButtonId;

/// GPIOs routed to the RTC domain.
pub const RTC_GPIOS: [u8; 18] = [
    0, 2, 4, 12, 13, 14, 15, 25, 26, 27, 32, 33, 34, 35, 36, 37, 38, 39,
];

pub fn is_rtc_capable(gpio: u8) -> bool {
    RTC_GPIOS.contains(&gpio)
}

// ---------------------------------------------------------------------------
// WakePlan
// ---------------------------------------------------------------------------

/// Which buttons will wake the board.  The trigger is always ext1 "any
/// high".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakePlan {
    /// Bit `n` set for each enrolled GPIO `n`.
    pub mask: u64,
    pub pull_up: bool,
    pub pull_down: bool,
    pub enrolled: Vec<(ButtonId, u8)>,
    /// Buttons wired to pins that cannot wake the board.
    pub skipped: Vec<(ButtonId, u8)>,
}

impl WakePlan {
    /// Enroll every button whose GPIO is RTC-capable.  Anything else is
    /// skipped with a hardware warning.
    pub fn for_pins(pins: &[u8; NUM_BUTTONS]) -> Self {
        let mut plan = Self {
            mask: 0,
            pull_up: false,
            pull_down: true,
            enrolled: Vec::new(),
            skipped: Vec::new(),
        };

        for (button, &gpio) in ButtonId::all().zip(pins) {
            if is_rtc_capable(gpio) {
                plan.mask |= 1u64 << gpio;
                plan.enrolled.push((button, gpio));
                log::info!("power: {button} (GPIO {gpio}) configured as wake source");
            } else {
                plan.skipped.push((button, gpio));
                log::warn!(
                    "power: GPIO {gpio} ({button}) is not RTC capable and cannot wake from deep sleep"
                );
            }
        }

        if plan.mask == 0 {
            log::warn!("power: no RTC-capable GPIO configured, only a reset will wake the device");
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }
}

// ---------------------------------------------------------------------------
// WakeCause
// ---------------------------------------------------------------------------

/// Reason the device started running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Single RTC_IO pin.
    Ext0,
    /// RTC_CNTL pin group; `status` has a bit per GPIO that triggered.
    Ext1 { status: u64 },
    Timer,
    Touchpad,
    Ulp,
    /// Not a wake from deep sleep.
    ColdBoot,
}

impl WakeCause {
    /// Buttons whose GPIO triggered an ext1 wake.
    pub fn buttons(&self, pins: &[u8; NUM_BUTTONS]) -> Vec<ButtonId> {
        let WakeCause::Ext1 { status } = *self else {
            return Vec::new();
        };
        ButtonId::all()
            .zip(pins)
            .filter(|(_, &gpio)| gpio < 64 && status & (1u64 << gpio) != 0)
            .map(|(button, _)| button)
            .collect()
    }

    /// Log the cause, naming the buttons that woke the board.
    pub fn report(&self, pins: &[u8; NUM_BUTTONS]) {
        match *self {
            WakeCause::Ext0 => log::info!("power: wakeup caused by external signal using RTC_IO"),
            WakeCause::Ext1 { .. } => {
                log::info!("power: wakeup caused by external signal using RTC_CNTL");
                for button in self.buttons(pins) {
                    log::info!("power: woken by {button}");
                }
            }
            WakeCause::Timer => log::info!("power: wakeup caused by timer"),
            WakeCause::Touchpad => log::info!("power: wakeup caused by touchpad"),
            WakeCause::Ulp => log::info!("power: wakeup caused by ULP program"),
            WakeCause::ColdBoot => log::info!("power: wakeup was not caused by deep sleep"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

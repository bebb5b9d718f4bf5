//! Inactivity scheduling and the deep-sleep seam.
//!
//! # Scheduler
//!
//! ```text
//!             record_activity()
//!        ┌─────────────────────────────┐
//!        ▼                             │
//!     Active ──elapsed ≥ timeout − warning──▶ Warning ──elapsed ≥ timeout──▶ Sleeping
//!                   (warn once, latch)                                       (terminal)
//! ```
//!
//! One timestamp, `last_activity`, is fed by button presses, control-plane
//! requests and ongoing playback.  [`InactivityScheduler::record_activity`]
//! is the only writer of that timestamp and of the warning latch.
//!
//! [`PowerControl`] is the hardware seam used once the scheduler decides to
//! sleep; [`WakePlan`] lists the buttons enrolled as wake sources.

pub mod host;
pub mod wake;

pub use host::HostPower;
pub use wake::{is_rtc_capable, WakeCause, WakePlan, RTC_GPIOS};

use crate::clock::elapsed_ms;

// ---------------------------------------------------------------------------
// PowerControl
// ---------------------------------------------------------------------------

/// Platform operations needed to suspend the device.
pub trait PowerControl {
    /// Flush pending output and turn the radio off.
    fn prepare_for_sleep(&mut self);

    /// Enroll the plan's pins as wake sources.
    fn enable_wake_sources(&mut self, plan: &WakePlan);

    /// Hand control to the sleep primitive.
    fn deep_sleep(&mut self);

    /// Why the device last woke up.
    fn wakeup_cause(&self) -> WakeCause;
}

// ---------------------------------------------------------------------------
// ActivityState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityState {
    pub last_activity: u32,
    pub sleep_enabled: bool,
    /// Latched once the pre-sleep warning has fired.
    pub warning_emitted: bool,
}

/// Outcome of one scheduler evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do this tick.
    Idle,
    /// The one-time warning fired; sleep follows in `remaining_ms`.
    Warn { remaining_ms: u32 },
    /// The timeout expired after `idle_ms` of inactivity.
    Sleep { idle_ms: u32 },
}

// ---------------------------------------------------------------------------
// InactivityScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InactivityScheduler {
    state: ActivityState,
    timeout_ms: u32,
    warning_ms: u32,
}

impl InactivityScheduler {
    /// `warning_ms` is clamped to `timeout_ms`.
    pub fn new(timeout_ms: u32, warning_ms: u32, sleep_enabled: bool, now: u32) -> Self {
        Self {
            state: ActivityState {
                last_activity: now,
                sleep_enabled,
                warning_emitted: false,
            },
            timeout_ms,
            warning_ms: warning_ms.min(timeout_ms),
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Reset the idle timer and clear the warning latch.
    pub fn record_activity(&mut self, now: u32) {
        self.state.last_activity = now;
        self.state.warning_emitted = false;
    }

    /// Suspend or resume the scheduler.  Resuming counts as activity.
    pub fn set_sleep_enabled(&mut self, enabled: bool, now: u32) {
        self.state.sleep_enabled = enabled;
        if enabled {
            self.record_activity(now);
        }
        log::info!(
            "power: automatic sleep {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn sleep_enabled(&self) -> bool {
        self.state.sleep_enabled
    }

    /// Milliseconds since the last recorded activity.
    pub fn elapsed(&self, now: u32) -> u32 {
        elapsed_ms(now, self.state.last_activity)
    }

    /// Decide what this tick means for power.
    pub fn evaluate(&mut self, now: u32, playing: bool) -> Decision {
        if !self.state.sleep_enabled {
            return Decision::Idle;
        }

        if playing {
            self.record_activity(now);
            return Decision::Idle;
        }

        let elapsed = self.elapsed(now);
        if elapsed >= self.timeout_ms {
            log::info!(
                "power: entering deep sleep after {} s of inactivity",
                elapsed / 1000
            );
            return Decision::Sleep { idle_ms: elapsed };
        }

        if elapsed >= self.timeout_ms - self.warning_ms && !self.state.warning_emitted {
            self.state.warning_emitted = true;
            let remaining_ms = self.timeout_ms - elapsed;
            log::warn!("power: will enter deep sleep in {} s", remaining_ms / 1000);
            return Decision::Warn { remaining_ms };
        }

        Decision::Idle
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

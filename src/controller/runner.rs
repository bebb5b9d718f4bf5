//! The orchestrating loop.
//!
//! # Tick order
//!
//! ```text
//! 1. Debouncer::poll      → Device::on_button        (press = play + activity)
//! 2. PlaybackManager::poll                            (end-of-clip teardown)
//! 3. activity pulse, then control requests → dispatch, ≤ MAX_REQUESTS_PER_TICK
//! 4. BatteryMonitor::poll                             (periodic report)
//! 5. InactivityScheduler::evaluate
//!      └─ Sleep → stop playback → close requests → prepare → enroll wake pins → deep_sleep
//! ```
//!
//! Debounced button events are always applied before control-plane actions
//! of the same tick, and all activity of a tick is recorded before the
//! sleep check.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::clock::Clock;
use crate::config::{ButtonConfig, NUM_BUTTONS};
use crate::control::{dispatch, ActivityPulse, ControlError, ControlRequest};
use crate::input::{Debouncer, InputPins};
use crate::power::{Decision, PowerControl, WakePlan};

use super::device::Device;
use super::state::{DeviceState, TickOutcome};

/// Upper bound on control requests serviced in one tick, so a burst of
/// HTTP traffic cannot starve the button scan.
pub const MAX_REQUESTS_PER_TICK: usize = 8;

pub struct Controller {
    device: Device,
    debouncer: Debouncer,
    pins: Box<dyn InputPins>,
    power: Box<dyn PowerControl>,
    clock: Box<dyn Clock>,
    requests: mpsc::Receiver<ControlRequest>,
    /// Raised for every HTTP request, including ones that never became an
    /// action.
    traffic: ActivityPulse,
    wake_pins: [u8; NUM_BUTTONS],
    state: DeviceState,
}

impl Controller {
    pub fn new(
        device: Device,
        buttons: &ButtonConfig,
        pins: Box<dyn InputPins>,
        power: Box<dyn PowerControl>,
        clock: Box<dyn Clock>,
        requests: mpsc::Receiver<ControlRequest>,
        traffic: ActivityPulse,
    ) -> Self {
        Self {
            device,
            debouncer: Debouncer::new(buttons.debounce_ms),
            pins,
            power,
            clock,
            requests,
            traffic,
            wake_pins: buttons.gpio_pins,
            state: DeviceState::Running,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Log why the board is running, naming any buttons that woke it.
    pub fn report_wakeup(&self) {
        self.power.wakeup_cause().report(&self.wake_pins);
    }

    /// Run one pass of the loop.  After sleep has been entered this is a
    /// no-op returning [`TickOutcome::Slept`].
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_running() {
            return TickOutcome::Slept;
        }
        let now = self.clock.now_ms();

        for event in self.debouncer.poll(self.pins.as_mut(), now) {
            self.device.on_button(event, now);
        }

        if self.device.playback.poll().is_some() {
            self.device.scheduler.record_activity(now);
        }

        if self.traffic.take() {
            self.device.scheduler.record_activity(now);
        }
        self.service_requests(now);

        self.device.battery.poll(now);

        match self
            .device
            .scheduler
            .evaluate(now, self.device.playback.is_playing())
        {
            Decision::Sleep { .. } => {
                self.enter_sleep();
                TickOutcome::Slept
            }
            Decision::Warn { .. } | Decision::Idle => TickOutcome::Continue,
        }
    }

    /// Tick every `period` until the device goes to sleep.
    pub fn run(mut self, period: Duration) -> DeviceState {
        log::info!("controller: running, tick every {} ms", period.as_millis());
        while self.tick() == TickOutcome::Continue {
            std::thread::sleep(period);
        }
        log::info!("controller: loop ended ({})", self.state.label());
        self.state
    }

    fn service_requests(&mut self, now: u32) {
        for _ in 0..MAX_REQUESTS_PER_TICK {
            let req = match self.requests.try_recv() {
                Ok(req) => req,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return,
            };
            let name = req.action.name();
            let result = dispatch(&mut self.device, req.action, now);
            if let Err(e) = &result {
                log::warn!("controller: {name} failed: {e}");
            }
            if req.reply.send(result).is_err() {
                log::debug!("controller: {name} requester went away");
            }
        }
    }

    /// Terminal transition.  Nothing here can be cancelled once started.
    fn enter_sleep(&mut self) {
        self.device.playback.stop();

        self.requests.close();
        while let Ok(req) = self.requests.try_recv() {
            let _ = req.reply.send(Err(ControlError::Unavailable));
        }

        self.power.prepare_for_sleep();
        let plan = WakePlan::for_pins(&self.wake_pins);
        self.power.enable_wake_sources(&plan);
        self.state = DeviceState::Sleeping;
        self.power.deep_sleep();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! [`PowerControl`] for a desktop host.
//!
//! There is no sleep primitive on a workstation: "radio off" stops the HTTP
//! server through a `watch` channel, the wake plan is only logged, and the
//! controller loop ends once `deep_sleep` returns.

use tokio::sync::watch;

use super::{PowerControl, WakeCause, WakePlan};

pub struct HostPower {
    radio_off: watch::Sender<bool>,
}

impl HostPower {
    /// Returns the controller and the receiver the HTTP server waits on.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (radio_off, rx) = watch::channel(false);
        (Self { radio_off }, rx)
    }
}

impl PowerControl for HostPower {
    fn prepare_for_sleep(&mut self) {
        log::info!("power: preparing for deep sleep");
        log::logger().flush();
        // No receiver left means the server is already down.
        let _ = self.radio_off.send(true);
    }

    fn enable_wake_sources(&mut self, plan: &WakePlan) {
        if !plan.is_empty() {
            log::info!(
                "power: configured ext1 wakeup (any high) with mask 0x{:x}, {} button(s)",
                plan.mask,
                plan.enrolled.len()
            );
        }
    }

    fn deep_sleep(&mut self) {
        log::info!("power: entering deep sleep now");
        log::logger().flush();
    }

    fn wakeup_cause(&self) -> WakeCause {
        WakeCause::ColdBoot
    }
}

//! Everything the tick loop and the dispatcher mutate.
//!
//! [`Device`] is owned by the controller thread; nothing here is shared or
//! locked.  Button events and control-plane actions reach it only through
//! [`Device::on_button`] and [`crate::control::dispatch`].

use crate::battery::{AdcReader, BatteryMonitor};
use crate::config::DeviceConfig;
use crate::input::{ButtonEvent, Transition};
use crate::playback::{AudioBackend, PlayOrigin, PlaybackManager, Volume};
use crate::power::InactivityScheduler;
use crate::storage::{ClipStore, UploadManager};

pub struct Device {
    pub playback: PlaybackManager,
    pub scheduler: InactivityScheduler,
    pub store: Box<dyn ClipStore>,
    pub uploads: UploadManager,
    pub battery: BatteryMonitor,
}

impl Device {
    /// Assemble a device from its configuration and platform adapters.
    /// `now` seeds the inactivity and battery timers.
    pub fn new(
        config: &DeviceConfig,
        store: Box<dyn ClipStore>,
        backend: Box<dyn AudioBackend>,
        adc: Box<dyn AdcReader>,
        now: u32,
    ) -> Self {
        Self {
            playback: PlaybackManager::new(backend, Volume::new(config.audio.default_gain)),
            scheduler: InactivityScheduler::new(
                config.power.sleep_timeout_ms,
                config.power.sleep_warning_ms,
                config.power.sleep_enabled,
                now,
            ),
            store,
            uploads: UploadManager::new(config.storage.max_file_size),
            battery: BatteryMonitor::new(
                adc,
                config.battery.adc_to_volt,
                config.battery.report_interval_ms,
                now,
            ),
        }
    }

    /// React to a debounced button event.
    ///
    /// A press counts as activity and (re)starts that button's clip;
    /// releases are only logged.
    pub fn on_button(&mut self, event: ButtonEvent, now: u32) {
        match event.transition {
            Transition::Pressed => {
                log::info!("controller: {} pressed", event.button);
                self.scheduler.record_activity(now);
                let clip = event.button.clip_name();
                if let Err(e) = self.playback.play(
                    self.store.as_ref(),
                    &clip,
                    PlayOrigin::Button(event.button),
                ) {
                    log::warn!("controller: {} could not play: {e}", event.button);
                }
            }
            Transition::Released => {
                log::debug!("controller: {} released", event.button);
            }
        }
    }

    /// Default-configured device wired to the recording mock backend.
    #[cfg(test)]
    pub fn with_mock(
        store: Box<dyn ClipStore>,
        backend: crate::playback::testing::MockBackend,
        max_upload: usize,
    ) -> Self {
        let mut config = DeviceConfig::default();
        config.storage.max_file_size = max_upload;
        Self::new(
            &config,
            store,
            Box::new(backend),
            Box::new(crate::battery::FixedAdc(config.battery.simulated_raw)),
            0,
        )
    }
}

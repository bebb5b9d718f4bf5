//! Battery voltage from a raw ADC sample.
//!
//! `voltage = raw * adc_to_volt`, where `adc_to_volt` folds in the ADC
//! reference and the divider ratio.  The reading is served on demand to the
//! control plane and logged every `report_interval_ms` by the tick loop.

use crate::clock::elapsed_ms;

/// Source of raw ADC counts.
pub trait AdcReader {
    fn read_raw(&mut self) -> u16;
}

/// ADC stand-in that always returns the same count.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdc(pub u16);

impl AdcReader for FixedAdc {
    fn read_raw(&mut self) -> u16 {
        self.0
    }
}

pub struct BatteryMonitor {
    adc: Box<dyn AdcReader>,
    adc_to_volt: f32,
    report_interval_ms: u32,
    last_report: u32,
}

impl BatteryMonitor {
    pub fn new(
        adc: Box<dyn AdcReader>,
        adc_to_volt: f32,
        report_interval_ms: u32,
        now: u32,
    ) -> Self {
        Self {
            adc,
            adc_to_volt,
            report_interval_ms,
            last_report: now,
        }
    }

    /// Sample the ADC and convert to volts.
    pub fn voltage(&mut self) -> f32 {
        f32::from(self.adc.read_raw()) * self.adc_to_volt
    }

    /// Log the voltage once per report interval.  Returns the reading when a
    /// report was due.
    pub fn poll(&mut self, now: u32) -> Option<f32> {
        if self.report_interval_ms == 0
            || elapsed_ms(now, self.last_report) < self.report_interval_ms
        {
            return None;
        }
        self.last_report = now;
        let volts = self.voltage();
        log::info!("battery: {volts:.2} V");
        Some(volts)
    }
}

//! Device settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to each
//! subsystem at start-up.  Defaults mirror the constants the board shipped
//! with (pin map, 50 ms debounce, 5 minute sleep timeout, 500 KB clip cap).

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Number of physical buttons (and clip slots) on the board.
pub const NUM_BUTTONS: usize = 6;

// ---------------------------------------------------------------------------
// ButtonConfig
// ---------------------------------------------------------------------------

/// Button wiring and debounce settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// GPIO number wired to each button, in button order (button 1 first).
    ///
    /// Only used to build the deep-sleep wake mask; on the host build the
    /// buttons are read from the keyboard instead.
    pub gpio_pins: [u8; NUM_BUTTONS],
    /// Keyboard key standing in for each button on the host build.
    pub keys: [String; NUM_BUTTONS],
    /// Minimum time (ms) a raw level must be stable before it is confirmed.
    pub debounce_ms: u32,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            gpio_pins: [13, 14, 27, 26, 25, 32],
            keys: ["1", "2", "3", "4", "5", "6"].map(String::from),
            debounce_ms: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Audio output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output gain applied at boot (0.0 – 1.0).  Not persisted when changed
    /// at runtime.
    pub default_gain: f32,
    /// Length of the sample FIFO between the decoder and the output stream.
    pub buffer_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_gain: 0.5,
            buffer_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// PowerConfig
// ---------------------------------------------------------------------------

/// Inactivity / deep-sleep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Whether the device may enter deep sleep at all.
    pub sleep_enabled: bool,
    /// Idle time (ms) after which the device enters deep sleep.
    pub sleep_timeout_ms: u32,
    /// Length (ms) of the warning window that precedes sleep entry.
    pub sleep_warning_ms: u32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            sleep_enabled: true,
            sleep_timeout_ms: 300_000,
            sleep_warning_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Clip storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `buttonN.mp3`.  `None` means the platform data dir.
    pub clips_dir: Option<PathBuf>,
    /// Largest clip (bytes) accepted by an upload.
    pub max_file_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            clips_dir: None,
            max_file_size: 500_000,
        }
    }
}

impl StorageConfig {
    /// The configured clip directory, falling back to the platform default.
    pub fn resolved_clips_dir(&self) -> PathBuf {
        self.clips_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().clips_dir)
    }
}

// ---------------------------------------------------------------------------
// HttpConfig
// ---------------------------------------------------------------------------

/// HTTP control plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Socket address the control plane listens on.
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// BatteryConfig
// ---------------------------------------------------------------------------

/// Battery sense settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Volts per ADC count (divider ratio folded in).
    pub adc_to_volt: f32,
    /// How often (ms) the battery voltage is written to the log.
    pub report_interval_ms: u32,
    /// Raw ADC value reported by the host stand-in for the battery pin.
    pub simulated_raw: u16,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            adc_to_volt: 7.285 / 4096.0,
            report_interval_ms: 10_000,
            simulated_raw: 2_300,
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level device configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use soundboard::config::DeviceConfig;
///
/// // Load (returns Default when file is missing)
/// let config = DeviceConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Button wiring and debounce.
    pub buttons: ButtonConfig,
    /// Audio output.
    pub audio: AudioConfig,
    /// Inactivity / deep sleep.
    pub power: PowerConfig,
    /// Clip storage.
    pub storage: StorageConfig,
    /// HTTP control plane.
    pub http: HttpConfig,
    /// Battery sense.
    pub battery: BatteryConfig,
    /// Period (ms) of the orchestrating loop.
    pub tick_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            buttons: ButtonConfig::default(),
            audio: AudioConfig::default(),
            power: PowerConfig::default(),
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
            battery: BatteryConfig::default(),
            tick_ms: 5,
        }
    }
}

impl DeviceConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(DeviceConfig::default())` when the file does not exist
    /// yet, so a fresh board boots with factory settings.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to an explicit path, creating parent directories
    /// as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the scheduler and loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.power.sleep_timeout_ms == 0 {
            bail!("power.sleep_timeout_ms must be greater than zero");
        }
        if self.power.sleep_warning_ms > self.power.sleep_timeout_ms {
            bail!(
                "power.sleep_warning_ms ({}) exceeds power.sleep_timeout_ms ({})",
                self.power.sleep_warning_ms,
                self.power.sleep_timeout_ms
            );
        }
        if self.tick_ms == 0 {
            bail!("tick_ms must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.audio.default_gain) {
            bail!(
                "audio.default_gain must be within 0.0..=1.0, got {}",
                self.audio.default_gain
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_board_constants() {
        let cfg = DeviceConfig::default();

        assert_eq!(cfg.buttons.gpio_pins, [13, 14, 27, 26, 25, 32]);
        assert_eq!(cfg.buttons.debounce_ms, 50);
        assert_eq!(cfg.buttons.keys[0], "1");
        assert_eq!(cfg.audio.default_gain, 0.5);
        assert_eq!(cfg.power.sleep_timeout_ms, 300_000);
        assert_eq!(cfg.power.sleep_warning_ms, 30_000);
        assert!(cfg.power.sleep_enabled);
        assert_eq!(cfg.storage.max_file_size, 500_000);
        assert_eq!(cfg.battery.report_interval_ms, 10_000);
        assert!((cfg.battery.adc_to_volt - 7.285 / 4096.0).abs() < f32::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = DeviceConfig::load_from(&path).expect("should not error");
        assert_eq!(config.power.sleep_timeout_ms, 300_000);
        assert_eq!(config.http.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = DeviceConfig::default();
        cfg.power.sleep_timeout_ms = 60_000;
        cfg.power.sleep_warning_ms = 5_000;
        cfg.storage.clips_dir = Some(PathBuf::from("/tmp/clips"));
        cfg.buttons.keys[5] = "F6".into();
        cfg.http.bind_addr = "127.0.0.1:9000".into();

        cfg.save_to(&path).expect("save");
        let loaded = DeviceConfig::load_from(&path).expect("load");

        assert_eq!(loaded.power.sleep_timeout_ms, 60_000);
        assert_eq!(loaded.power.sleep_warning_ms, 5_000);
        assert_eq!(loaded.storage.clips_dir, Some(PathBuf::from("/tmp/clips")));
        assert_eq!(loaded.buttons.keys[5], "F6");
        assert_eq!(loaded.http.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[power]\nsleep_enabled = false\n").expect("write");

        let loaded = DeviceConfig::load_from(&path).expect("load");
        assert!(!loaded.power.sleep_enabled);
        assert_eq!(loaded.power.sleep_timeout_ms, 300_000);
        assert_eq!(loaded.buttons.debounce_ms, 50);
    }

    #[test]
    fn validate_rejects_warning_longer_than_timeout() {
        let mut cfg = DeviceConfig::default();
        cfg.power.sleep_warning_ms = cfg.power.sleep_timeout_ms + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_tick() {
        let mut cfg = DeviceConfig::default();
        cfg.tick_ms = 0;
        assert!(cfg.validate().is_err());
    }
}

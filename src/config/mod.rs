//! Configuration module for the soundboard controller.
//!
//! Provides `DeviceConfig` (top-level settings), sub-configs for each
//! subsystem, `AppPaths` for cross-platform directories, and TOML
//! persistence via `DeviceConfig::load` / `DeviceConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AudioConfig, BatteryConfig, ButtonConfig, DeviceConfig, HttpConfig, PowerConfig,
    StorageConfig, NUM_BUTTONS,
};

//! Where the soundboard keeps its settings and clips on a desktop host.
//!
//! On Linux that is `~/.config/soundboard/settings.toml` and
//! `~/.local/share/soundboard/audio/button<N>.mp3`; other platforms use
//! their own config and local-data roots.  `--config` and `--clips-dir`
//! override both.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Stands in for the flash filesystem: one `button<N>.mp3` per slot.
    pub clips_dir: PathBuf,
}

const APP_DIR: &str = "soundboard";

fn app_root(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

impl AppPaths {
    /// A platform without a known root gets paths under `./soundboard`.
    pub fn new() -> Self {
        let config_dir = app_root(dirs::config_dir());
        Self {
            settings_file: config_dir.join("settings.toml"),
            clips_dir: app_root(dirs::data_local_dir()).join("audio"),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clips_live_apart_from_settings() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths.clips_dir.ends_with("audio"));
        assert!(!paths.clips_dir.starts_with(&paths.settings_file));
    }
}

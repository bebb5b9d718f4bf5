//! Application entry point for the soundboard controller.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`DeviceConfig`] (defaults on first run) and apply CLI overrides.
//! 3. Open the clip directory.
//! 4. Create the tokio runtime and start the HTTP control plane on it.
//! 5. Build the [`Controller`] on the main thread with the host adapters.
//! 6. Report the wake cause and run the tick loop until deep sleep.
//! 7. Wait for the HTTP server to wind down and exit.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use soundboard::{
    audio::HostAudio,
    battery::FixedAdc,
    clock::{Clock, MonotonicClock},
    config::{AppPaths, DeviceConfig},
    control,
    controller::{Controller, Device},
    input::KeyboardPins,
    power::HostPower,
    storage::FsClipStore,
};

/// Control-plane requests that may queue while the loop is busy.
const REQUEST_QUEUE: usize = 32;

#[derive(Debug, Parser)]
#[command(name = "soundboard", version, about = "Six-button soundboard controller")]
struct Args {
    /// Path to settings.toml (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding button1.mp3 … button6.mp3.
    #[arg(long)]
    clips_dir: Option<PathBuf>,

    /// Address for the HTTP control plane, e.g. 127.0.0.1:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Never enter deep sleep.
    #[arg(long)]
    no_sleep: bool,

    /// Write the default configuration to the config path and exit.
    #[arg(long)]
    write_default_config: bool,
}

impl Args {
    /// Command-line flags win over the settings file.
    fn apply_to(&self, config: &mut DeviceConfig) {
        if let Some(dir) = &self.clips_dir {
            config.storage.clips_dir = Some(dir.clone());
        }
        if let Some(bind) = &self.bind {
            config.http.bind_addr = bind.clone();
        }
        if self.no_sleep {
            config.power.sleep_enabled = false;
        }
    }
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    log::info!("soundboard starting up");

    // 2. Config
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);

    if args.write_default_config {
        DeviceConfig::default()
            .save_to(&config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        log::info!("wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let mut config = DeviceConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    args.apply_to(&mut config);
    config.validate()?;

    // 3. Clip store
    let clips_dir = config.storage.resolved_clips_dir();
    let store = FsClipStore::open(&clips_dir)
        .with_context(|| format!("opening clip directory {}", clips_dir.display()))?;
    log::info!("clips in {}", store.root().display());

    // 4. Runtime + HTTP control plane
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    let (handle, requests) = control::channel(REQUEST_QUEUE);
    let (power, radio_off) = HostPower::new();

    let listener = rt
        .block_on(TcpListener::bind(&config.http.bind_addr))
        .with_context(|| format!("binding {}", config.http.bind_addr))?;
    let traffic = handle.activity().clone();
    let server = rt.spawn(control::serve(
        listener,
        handle,
        config.storage.max_file_size,
        radio_off,
    ));

    // 5. Controller
    let clock = MonotonicClock::new();
    let device = Device::new(
        &config,
        Box::new(store),
        Box::new(HostAudio::new(config.audio.buffer_ms)),
        Box::new(FixedAdc(config.battery.simulated_raw)),
        clock.now_ms(),
    );
    let controller = Controller::new(
        device,
        &config.buttons,
        Box::new(KeyboardPins::start(&config.buttons.keys)),
        Box::new(power),
        Box::new(clock),
        requests,
        traffic,
    );

    // 6. Run until sleep
    controller.report_wakeup();
    let state = controller.run(Duration::from_millis(config.tick_ms));
    log::info!("device is {}", state.label());

    // 7. Shutdown
    match rt.block_on(server) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("HTTP server exited with error: {e}"),
        Err(e) => log::warn!("HTTP server task failed: {e}"),
    }
    rt.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

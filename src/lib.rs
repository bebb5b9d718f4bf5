//! Six-button soundboard controller.
//!
//! Debounced buttons play per-button MP3 clips, an HTTP control plane
//! manages clips and volume, and an inactivity scheduler puts the device
//! into deep sleep.  The core is a single-threaded tick loop
//! ([`controller::Controller`]) written against platform traits; host
//! adapters let the binary run on a development machine.

pub mod audio;
pub mod battery;
pub mod clock;
pub mod config;
pub mod control;
pub mod controller;
pub mod input;
pub mod playback;
pub mod power;
pub mod storage;

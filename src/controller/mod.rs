//! Device ownership and the orchestrating loop.
//!
//! [`Device`] bundles the state every subsystem mutates; [`Controller`]
//! owns it together with the platform adapters and runs the tick loop.

pub mod device;
pub mod runner;
pub mod state;

pub use device::Device;
pub use runner::{Controller, MAX_REQUESTS_PER_TICK};
pub use state::{DeviceState, TickOutcome};

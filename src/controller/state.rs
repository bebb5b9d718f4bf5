//! Controller lifecycle state.

/// Lifecycle of the controller for one power cycle.
///
/// ```text
/// Running ──inactivity timeout──▶ Sleeping   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    Running,
    Sleeping,
}

impl DeviceState {
    /// ```
    /// use soundboard::controller::DeviceState;
    ///
    /// assert!(DeviceState::Running.is_running());
    /// assert!(!DeviceState::Sleeping.is_running());
    /// ```
    pub fn is_running(&self) -> bool {
        matches!(self, DeviceState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceState::Running => "Running",
            DeviceState::Sleeping => "Sleeping",
        }
    }
}

/// What one tick did to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Sleep was entered during this tick; no further ticks run.
    Slept,
}

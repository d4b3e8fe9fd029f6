//! Controller configuration

use crossroad_core::{Roll, Timing};
use crossroad_transport::RadioConfig;

/// Controller configuration
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Name used in log spans
    pub label: String,
    /// Timer windows
    pub timing: Timing,
    /// Radio session, channel and power
    pub radio: RadioConfig,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Fixed first roll instead of a random one
    pub initial_roll: Option<Roll>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            label: "crossroad".into(),
            timing: Timing::default(),
            radio: RadioConfig::default(),
            seed: None,
            initial_roll: None,
        }
    }
}

impl ControllerConfig {
    /// Configuration for simulation: fast timers, deterministic RNG
    pub fn simulated(label: &str, seed: u64) -> Self {
        ControllerConfig {
            label: label.into(),
            timing: Timing::fast(),
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub fn with_initial_roll(mut self, roll: Roll) -> Self {
        self.initial_roll = Some(roll);
        self
    }
}

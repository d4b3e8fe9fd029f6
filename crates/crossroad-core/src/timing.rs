//! Protocol timing configuration

use std::time::Duration;

/// Timer windows used by the controllers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// How long the boss holds green
    pub green_duration: Duration,
    /// All-red clearance before handing green over
    pub all_red: Duration,
    /// Silence after which the peer is presumed gone
    pub heartbeat: Duration,
    /// Periodic transmission interval
    pub send_interval: Duration,
    /// Silence after the last emergency beacon before normal mode resumes
    pub sos_silence: Duration,
    /// Upper bound of the random delay before the first transmission
    pub startup_jitter: Duration,
}

impl Timing {
    /// Base wait window the other windows derive from
    pub const WAIT: Duration = Duration::from_millis(500);

    /// Scaled-down windows for tests and simulation
    pub fn fast() -> Self {
        Timing {
            green_duration: Duration::from_millis(1000),
            all_red: Duration::from_millis(100),
            heartbeat: Duration::from_millis(200),
            send_interval: Duration::from_millis(100),
            sos_silence: Duration::from_millis(50),
            startup_jitter: Duration::from_millis(200),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            green_duration: Duration::from_secs(10),
            all_red: Duration::from_secs(1),
            heartbeat: Self::WAIT * 4,
            send_interval: Duration::from_secs(1),
            sos_silence: Self::WAIT,
            startup_jitter: Self::WAIT * 4,
        }
    }
}

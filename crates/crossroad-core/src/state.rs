//! Per-node negotiation state
//!
//! One `NodeState` exists per controller for the lifetime of the process.
//! The receiver owns the negotiation fields, the phase controller owns the
//! timed light/role changes, and the emergency override owns `sos_mode` and
//! the saved outbound payload.

use std::time::Duration;

use crate::{Light, Payload, Role, Roll};

/// Complete negotiation state of one controller
#[derive(Clone, Debug)]
pub struct NodeState {
    /// Current negotiation role
    pub role: Role,
    /// Light this controller displays
    pub light: Light,
    /// Tie-break roll offered to the peer
    pub roll: Roll,
    /// Raised while this node holds green and the green timer should run
    pub green_on: bool,
    /// Raised while no valid frame has arrived within the heartbeat window
    pub disconnected: bool,
    /// Raised while an emergency beacon is being relayed
    pub sos_mode: bool,
    /// Green was just given up and the peer has not yet answered "red"
    pub handing_over: bool,
    /// Green time left to run; `None` means "not running"
    pub resume_timer: Option<Duration>,
    /// Payload the sender transmits
    pub outbound: Payload,
    /// Pre-emergency outbound payload, held only during emergency mode
    pub saved_outbound: Option<Payload>,
}

impl NodeState {
    /// Fresh state: undetermined, dark, disconnected, offering `roll`
    pub fn new(roll: Roll) -> Self {
        NodeState {
            role: Role::Undetermined,
            light: Light::Unset,
            roll,
            green_on: false,
            disconnected: true,
            sos_mode: false,
            handing_over: false,
            resume_timer: None,
            outbound: Payload::roll(roll),
            saved_outbound: None,
        }
    }

    /// Holding green as the boss
    #[inline]
    pub fn is_boss_at_green(&self) -> bool {
        self.role == Role::Boss && self.light == Light::Green
    }

    /// Green time to run next, resetting an unset timer to `full`
    pub fn green_time(&mut self, full: Duration) -> Duration {
        *self.resume_timer.get_or_insert(full)
    }

    /// Read-only copy for observers
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            role: self.role,
            light: self.light,
            roll: self.roll,
            green_on: self.green_on,
            disconnected: self.disconnected,
            sos_mode: self.sos_mode,
            outbound: self.outbound.clone(),
        }
    }
}

/// Point-in-time view of a controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub role: Role,
    pub light: Light,
    pub roll: Roll,
    pub green_on: bool,
    pub disconnected: bool,
    pub sos_mode: bool,
    pub outbound: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_fail_safe() {
        let roll = Roll::new(42).unwrap();
        let state = NodeState::new(roll);
        assert!(state.disconnected);
        assert!(!state.green_on);
        assert_eq!(state.role, Role::Undetermined);
        assert_eq!(state.outbound, Payload::Roll(42));
        assert!(state.saved_outbound.is_none());
    }

    #[test]
    fn test_green_time_defaults_to_full() {
        let mut state = NodeState::new(Roll::new(42).unwrap());
        let full = Duration::from_secs(10);
        assert_eq!(state.green_time(full), full);

        state.resume_timer = Some(Duration::from_secs(3));
        assert_eq!(state.green_time(full), Duration::from_secs(3));
    }
}

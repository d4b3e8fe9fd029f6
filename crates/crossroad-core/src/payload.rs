//! Message payloads exchanged between the two controllers

use std::fmt;

use crate::Roll;

/// Payload carried after the protocol tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// "You may go green" (sent by the controller giving up green)
    Green,
    /// "Stay red" (sent by the controller holding green)
    Red,
    /// Tie-break roll; inbound values are whatever the peer sent
    Roll(i32),
    /// Emergency relay echo
    Sos,
    /// Tagged frame whose payload matches nothing above
    Unrecognized,
}

impl Payload {
    /// Payload announcing this controller's own roll
    pub fn roll(roll: Roll) -> Self {
        Payload::Roll(i32::from(roll.value()))
    }

    /// Whether the payload may be placed in the outbound buffer
    pub fn is_transmittable(&self) -> bool {
        !matches!(self, Payload::Unrecognized)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Green => write!(f, "green"),
            Payload::Red => write!(f, "red"),
            Payload::Roll(n) => write!(f, "{}", n),
            Payload::Sos => write!(f, "SOS"),
            Payload::Unrecognized => write!(f, "?"),
        }
    }
}

//! Negotiation role and displayed light

use std::fmt;

/// Role a controller holds in the two-party negotiation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// No frame has settled the role yet
    #[default]
    Undetermined,
    /// Authorized (or attempting) to show green and own the green timer
    Boss,
    /// Yielding: shows red and defers to the peer's timing
    Listener,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Undetermined => write!(f, "undetermined"),
            Role::Boss => write!(f, "boss"),
            Role::Listener => write!(f, "listener"),
        }
    }
}

/// Light a controller believes it is displaying
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Light {
    #[default]
    Unset,
    Red,
    Green,
}

impl Light {
    #[inline]
    pub fn is_green(self) -> bool {
        self == Light::Green
    }
}

impl fmt::Display for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Light::Unset => write!(f, "unset"),
            Light::Red => write!(f, "red"),
            Light::Green => write!(f, "green"),
        }
    }
}

//! Tie-break rolls
//!
//! Each controller offers a random two-digit number when both claim the
//! same role. The higher roll wins green; equal rolls force a re-roll.

use std::fmt;

use rand::Rng;

/// Random tie-breaker in `[Roll::MIN, Roll::MAX]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Roll(u8);

impl Roll {
    /// Smallest roll a controller may draw
    pub const MIN: u8 = 10;
    /// Largest roll a controller may draw
    pub const MAX: u8 = 98;

    /// Build a roll, rejecting values outside the drawable range
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Roll(value))
    }

    /// Draw a roll uniformly from the drawable range
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Roll(rng.gen_range(Self::MIN..=Self::MAX))
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Compare against a roll number received from the peer
    pub fn cmp_peer(self, peer: i32) -> std::cmp::Ordering {
        i32::from(self.0).cmp(&peer)
    }
}

impl fmt::Debug for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Roll({})", self.0)
    }
}

impl fmt::Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

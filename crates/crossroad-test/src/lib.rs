//! Crossroad Test Harness - two controllers over a hostile air
//!
//! This crate provides:
//! - A lossy, jittery radio channel model
//! - An intersection simulator wiring two controllers through it
//! - Observation of what both approaches actually show

pub mod chaos;
pub mod simulator;

pub use chaos::*;
pub use simulator::*;

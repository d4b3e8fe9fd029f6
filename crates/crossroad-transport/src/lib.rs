//! Crossroad Transport Layer - radio and link collaborators
//!
//! This crate provides:
//! - The `Radio` / `Link` interfaces the controllers talk through
//! - A UDP radio for controllers on an IP network
//! - An in-memory radio for simulation and tests

pub mod link;
pub mod memory;
pub mod udp;

pub use link::*;
pub use memory::*;
pub use udp::*;

//! Crossroad Core - Fundamental types shared by both controllers
//!
//! This crate defines the types every other crate builds on:
//! - Negotiation roles and displayed lights
//! - Tie-break rolls
//! - Message payloads
//! - Lamp actuation interface
//! - Timing configuration and the per-node state record

pub mod error;
pub mod lamp;
pub mod payload;
pub mod role;
pub mod roll;
pub mod state;
pub mod timing;

pub use error::*;
pub use lamp::*;
pub use payload::*;
pub use role::*;
pub use roll::*;
pub use state::*;
pub use timing::*;

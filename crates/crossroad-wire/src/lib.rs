//! Crossroad Wire Protocol - Fixed-size radio frame
//!
//! Every frame is 20 bytes:
//! - Bytes 0-1: reserved (link layer)
//! - Bytes 2-3: protocol tag `"yi"`
//! - Bytes 4..: ASCII payload, NUL terminated
//! - Last 2 bytes: reserved for the link layer trailer
//!
//! Emergency vehicles transmit an untagged beacon with `"SOS"` at byte 2.

pub mod buffer;
pub mod frame;

pub use buffer::*;
pub use frame::*;

//! Error types for the crossroad controllers

use thiserror::Error;

/// Core crossroad errors
///
/// Only startup failures and transport faults surface as errors. Everything
/// that can go wrong on the air (noise, loss, ties) is absorbed into protocol
/// state instead.
#[derive(Error, Debug)]
pub enum CrossroadError {
    // Startup errors
    #[error("Out of memory: could not allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Link unavailable: {0}")]
    LinkUnavailable(String),

    #[error("Radio configuration rejected: {0}")]
    RadioConfig(String),

    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Result type for crossroad operations
pub type CrossroadResult<T> = Result<T, CrossroadError>;

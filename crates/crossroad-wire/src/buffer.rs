//! Fixed-size frame buffers
//!
//! Buffers are allocated once at startup. Allocation failure is reported
//! instead of aborting so the supervisor can log it and halt cleanly.

use crossroad_core::{CrossroadError, CrossroadResult};

/// Heap buffer of a fixed length
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuf {
    bytes: Vec<u8>,
}

impl FrameBuf {
    /// Allocate a zeroed buffer of exactly `size` bytes
    pub fn allocate(size: usize) -> CrossroadResult<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| CrossroadError::OutOfMemory { requested: size })?;
        bytes.resize(size, 0);
        Ok(FrameBuf { bytes })
    }

    /// Overwrite the buffer with `src`, zero-filling any remainder
    pub fn load(&mut self, src: &[u8]) {
        let n = src.len().min(self.bytes.len());
        self.bytes[..n].copy_from_slice(&src[..n]);
        self.bytes[n..].fill(0);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

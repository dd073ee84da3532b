//! Append-only byte accumulator for response bodies.
//!
//! # Design
//! Transports hand the body over in fragments (typically ~16 KiB, but
//! small and irregular chunks are common). Growing by exactly the chunk
//! size would reallocate on every call, so when the free capacity is too
//! small the buffer grows by `max(chunk * 2, GROWTH_STEP)` past the
//! current size. Allocation goes through `try_reserve_exact`, so running
//! out of memory is reported as a `CapacityError` instead of aborting the
//! process or silently truncating the body.

use std::cmp;

use crate::error::CapacityError;

/// Minimum number of bytes added to the backing store on each growth.
pub const GROWTH_STEP: usize = 1024;

/// Growable byte buffer with a size distinct from its capacity.
///
/// `len() <= capacity()` holds after every call, and bytes are kept in
/// the order they were appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrowableByteBuffer {
    data: Vec<u8>,
}

impl GrowableByteBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Append `chunk` to the logical end, growing the backing store if the
    /// remaining free capacity is smaller than the chunk.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), CapacityError> {
        let free = self.data.capacity() - self.data.len();
        if free < chunk.len() {
            let grow_by = cmp::max(chunk.len().saturating_mul(2), GROWTH_STEP);
            self.data.try_reserve_exact(grow_by)?;
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Allocated storage in bytes.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Drop all valid bytes but keep the allocation for reuse.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for GrowableByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

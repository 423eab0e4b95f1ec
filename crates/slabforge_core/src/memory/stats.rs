//! # Pool Statistics

use serde::Serialize;

/// Point-in-time snapshot of a pool's accounting.
///
/// `available + outstanding == capacity` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Bytes per block, after clamping.
    pub element_size: usize,
    /// Blocks per chunk (the whole capacity for a fixed pool).
    pub chunk_size: usize,
    /// Blocks currently backed by memory.
    pub capacity: usize,
    /// Blocks on the free list.
    pub available: usize,
    /// Blocks handed out to callers.
    pub outstanding: usize,
    /// Backing allocations held.
    pub chunk_count: usize,
    /// Bytes of backing memory held.
    pub reserved_bytes: usize,
}

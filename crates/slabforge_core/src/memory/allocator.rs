//! # Block Allocator Trait
//!
//! The `malloc`/`free` contract shared by both raw pool variants. Component
//! storage and handle tables consume pools through this trait, so they can
//! be configured with either variant at startup.

use std::ptr::NonNull;

use super::stats::PoolStats;
use crate::error::PoolResult;

/// A source of fixed-size raw blocks.
///
/// Returned blocks are raw storage; no constructor runs. Blocks stay valid
/// until freed or until the allocator is dropped.
pub trait BlockAllocator {
    /// Hands out one block.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` when no block can be provided.
    fn malloc(&mut self) -> PoolResult<NonNull<u8>>;

    /// Returns a block previously handed out by `malloc`.
    ///
    /// # Errors
    ///
    /// `PoolError::ForeignPointerRejected` or `PoolError::DoubleFree`; the
    /// allocator is left unchanged in both cases.
    fn free(&mut self, block: NonNull<u8>) -> PoolResult<()>;

    /// Accounting snapshot.
    fn stats(&self) -> PoolStats;

    /// Blocks currently handed out.
    fn size(&self) -> usize {
        self.stats().outstanding
    }

    /// Blocks currently backed by memory.
    fn capacity(&self) -> usize {
        self.stats().capacity
    }

    /// Blocks ready to be handed out without growing.
    fn available(&self) -> usize {
        self.stats().available
    }

    /// Bytes per block.
    fn element_size(&self) -> usize {
        self.stats().element_size
    }

    /// Blocks per growth unit (or total capacity for a fixed pool).
    fn chunk_size(&self) -> usize {
        self.stats().chunk_size
    }
}

//! # Ownership Validation
//!
//! Maps a raw pointer back to the block that owns it. This is what keeps a
//! pool from accepting memory it never handed out.
//!
//! Resolution is a linear scan over the chunk sequence, O(chunk count). The
//! chunk count stays small next to the block count, and callers holding a
//! [`BlockIndex`] skip the scan entirely.

use super::chunk::Chunk;
use super::free_list::BlockIndex;

/// Resolves pointers against a chunk sequence with fixed geometry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OwnershipValidator {
    element_size: usize,
    chunk_size: usize,
}

impl OwnershipValidator {
    pub(crate) const fn new(element_size: usize, chunk_size: usize) -> Self {
        Self {
            element_size,
            chunk_size,
        }
    }

    /// Returns the global index of the block starting at `ptr`.
    ///
    /// `None` if no chunk contains `ptr`, or if `ptr` points inside a block
    /// rather than at its first byte.
    pub(crate) fn resolve(&self, chunks: &[Chunk], ptr: *const u8) -> Option<BlockIndex> {
        let (chunk_index, offset) = chunks
            .iter()
            .enumerate()
            .find_map(|(chunk_index, chunk)| Some((chunk_index, chunk.offset_of(ptr)?)))?;

        if offset % self.element_size != 0 {
            return None;
        }

        Some(BlockIndex::new(
            chunk_index * self.chunk_size + offset / self.element_size,
        ))
    }
}

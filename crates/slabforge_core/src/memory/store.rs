//! # Block Store
//!
//! Chunks, free list and pointer resolution shared by the raw pools. The
//! store keeps the books; each pool decides when a chunk is added.

use std::ptr::NonNull;

use bytemuck::Pod;
use tracing::{debug, warn};

use super::chunk::Chunk;
use super::free_list::{BlockIndex, FreeList, FreeListIter};
use super::ownership::OwnershipValidator;
use super::stats::PoolStats;
use crate::error::{PoolError, PoolResult};

/// Blocks of `element_size` bytes laid out `chunk_size` per chunk.
#[derive(Debug)]
pub(crate) struct BlockStore {
    /// Backing chunks, append-only until `clear`.
    chunks: Vec<Chunk>,
    /// Occupancy and free chain of every block.
    free_list: FreeList,
    element_size: usize,
    chunk_size: usize,
    /// Alignment of every chunk base.
    align: usize,
    validator: OwnershipValidator,
}

impl BlockStore {
    pub(crate) const fn new(element_size: usize, chunk_size: usize, align: usize) -> Self {
        Self {
            chunks: Vec::new(),
            free_list: FreeList::new(),
            element_size,
            chunk_size,
            align,
            validator: OwnershipValidator::new(element_size, chunk_size),
        }
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.capacity().saturating_sub(self.available())
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.free_list.capacity()
    }

    #[inline]
    pub(crate) const fn available(&self) -> usize {
        self.free_list.available()
    }

    #[inline]
    pub(crate) const fn element_size(&self) -> usize {
        self.element_size
    }

    #[inline]
    pub(crate) const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub(crate) const fn head(&self) -> Option<BlockIndex> {
        self.free_list.head()
    }

    /// Bytes in one chunk, or `None` if that overflows.
    #[inline]
    pub(crate) fn chunk_bytes(&self) -> Option<usize> {
        self.element_size.checked_mul(self.chunk_size)
    }

    /// Acquires one chunk and threads its blocks onto the free list.
    ///
    /// The slot table, the chunk sequence and the chunk itself are all
    /// allocated before anything is modified, so `None` leaves the store
    /// exactly as it was.
    pub(crate) fn grow(&mut self) -> Option<BlockIndex> {
        let bytes = self.chunk_bytes()?;
        if !self.free_list.try_reserve(self.chunk_size) || self.chunks.try_reserve(1).is_err() {
            return None;
        }
        let chunk = Chunk::allocate(bytes, self.align)?;
        self.chunks.push(chunk);

        let head = self.free_list.extend(self.chunk_size);
        debug!(
            chunk = self.chunks.len() - 1,
            bytes,
            capacity = self.capacity(),
            "pool grew by one chunk"
        );
        head
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<BlockIndex> {
        self.free_list.pop()
    }

    pub(crate) fn free(&mut self, block: NonNull<u8>) -> PoolResult<()> {
        let Some(index) = self.index_of(block.as_ptr()) else {
            warn!("tried to free a block which does not belong to this pool");
            return Err(PoolError::ForeignPointerRejected);
        };
        self.release(index)
    }

    pub(crate) fn release(&mut self, index: BlockIndex) -> PoolResult<()> {
        self.free_list.push(index).map_err(|err| {
            warn!(index = index.get(), %err, "rejected block release");
            err
        })
    }

    #[inline]
    pub(crate) fn release_unchecked(&mut self, index: BlockIndex) {
        self.free_list.push_unchecked(index);
    }

    pub(crate) fn index_of(&self, ptr: *const u8) -> Option<BlockIndex> {
        self.validator.resolve(&self.chunks, ptr)
    }

    pub(crate) fn address(&self, index: BlockIndex) -> Option<NonNull<u8>> {
        (index.get() < self.capacity()).then(|| self.block_address(index))
    }

    /// Address of a block known to be in range.
    #[inline]
    pub(crate) fn block_address(&self, index: BlockIndex) -> NonNull<u8> {
        self.chunks[index.chunk(self.chunk_size)]
            .at(index.byte_offset(self.chunk_size, self.element_size))
    }

    #[inline]
    pub(crate) fn is_occupied(&self, index: BlockIndex) -> bool {
        self.free_list.is_occupied(index)
    }

    pub(crate) fn block(&self, index: BlockIndex) -> Option<&[u8]> {
        if !self.is_occupied(index) {
            return None;
        }
        let chunk = &self.chunks[index.chunk(self.chunk_size)];
        Some(chunk.bytes(
            index.byte_offset(self.chunk_size, self.element_size),
            self.element_size,
        ))
    }

    pub(crate) fn block_mut(&mut self, index: BlockIndex) -> Option<&mut [u8]> {
        if !self.is_occupied(index) {
            return None;
        }
        let offset = index.byte_offset(self.chunk_size, self.element_size);
        let chunk = &mut self.chunks[index.chunk(self.chunk_size)];
        Some(chunk.bytes_mut(offset, self.element_size))
    }

    pub(crate) fn write_pod<T: Pod>(&mut self, index: BlockIndex, value: &T) -> PoolResult<()> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() > self.element_size {
            return Err(PoolError::InvalidConfig(format!(
                "{} byte value does not fit in a {} byte block",
                bytes.len(),
                self.element_size
            )));
        }
        let block = self
            .block_mut(index)
            .ok_or(PoolError::ForeignPointerRejected)?;
        block[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn read_pod<T: Pod>(&self, index: BlockIndex) -> Option<T> {
        let block = self.block(index)?;
        let size = std::mem::size_of::<T>();
        (size <= block.len()).then(|| bytemuck::pod_read_unaligned(&block[..size]))
    }

    pub(crate) fn occupied(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.free_list.occupied()
    }

    pub(crate) fn free_list(&self) -> FreeListIter<'_> {
        self.free_list.iter()
    }

    /// Free-list invariants, plus one slot per block of every chunk.
    pub(crate) fn is_consistent(&self) -> bool {
        self.free_list.is_consistent()
            && self.free_list.capacity() == self.chunks.len() * self.chunk_size
    }

    /// Marks every block free again, keeping the chunks.
    pub(crate) fn reset(&mut self) {
        self.free_list.reset();
    }

    /// Returns every chunk to the system.
    pub(crate) fn clear(&mut self) {
        self.chunks.clear();
        self.free_list.clear();
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            element_size: self.element_size,
            chunk_size: self.chunk_size,
            capacity: self.capacity(),
            available: self.available(),
            outstanding: self.size(),
            chunk_count: self.chunks.len(),
            reserved_bytes: self.chunks.iter().map(Chunk::size).sum(),
        }
    }
}

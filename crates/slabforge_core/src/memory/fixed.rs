//! # Fixed-Capacity Pool
//!
//! Fixed-size block allocator over one pre-allocated buffer. Never grows.
//!
//! Two release policies are offered side by side:
//! - [`FixedCapacityPool::free`] checks the address range, block boundary
//!   and occupancy before touching the free list.
//! - [`FixedCapacityPool::free_trusted`] skips those checks for call sites
//!   that already know the block is theirs and outstanding.

use std::ptr::NonNull;

use bytemuck::Pod;
use tracing::warn;

use super::allocator::BlockAllocator;
use super::free_list::{BlockIndex, FreeListIter};
use super::stats::PoolStats;
use super::store::BlockStore;
use super::{clamp_element_size, BLOCK_ALIGN};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// A pool of `capacity` fixed-size blocks in a single buffer.
///
/// All memory is allocated upfront. Once every block is handed out,
/// `malloc` reports `Exhausted` until something is freed.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per owner or serialize access
/// externally.
///
/// # Example
///
/// ```rust
/// use slabforge_core::{FixedCapacityPool, PoolError};
///
/// let mut pool = FixedCapacityPool::new(64, 2).unwrap();
/// let _a = pool.malloc().unwrap();
/// let _b = pool.malloc().unwrap();
/// assert!(matches!(pool.malloc(), Err(PoolError::Exhausted { .. })));
/// ```
#[derive(Debug)]
pub struct FixedCapacityPool {
    /// Exactly one chunk of `capacity` blocks.
    store: BlockStore,
}

impl FixedCapacityPool {
    /// Creates a pool and allocates its whole buffer.
    ///
    /// # Arguments
    ///
    /// * `element_size` - Bytes per block, clamped up to `MIN_ELEMENT_SIZE`
    /// * `capacity` - Total number of blocks
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if `capacity` is zero
    /// - `PoolError::Exhausted` if the buffer or its bookkeeping cannot be
    ///   allocated
    pub fn new(element_size: usize, capacity: usize) -> PoolResult<Self> {
        Self::build(clamp_element_size(element_size), capacity, BLOCK_ALIGN)
    }

    /// Creates a pool whose blocks are all aligned to `align`.
    ///
    /// `element_size` is clamped, then rounded up to a multiple of `align`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if `capacity` is zero or `align` is not
    ///   a power of two
    /// - `PoolError::Exhausted` if the buffer cannot be allocated
    pub fn with_alignment(element_size: usize, capacity: usize, align: usize) -> PoolResult<Self> {
        if !align.is_power_of_two() {
            return Err(PoolError::InvalidConfig(format!(
                "alignment {align} is not a power of two"
            )));
        }

        let element_size = clamp_element_size(element_size)
            .checked_next_multiple_of(align)
            .ok_or(PoolError::Exhausted {
                requested_bytes: usize::MAX,
            })?;
        Self::build(element_size, capacity, align.max(BLOCK_ALIGN))
    }

    /// Creates a pool from a loaded configuration.
    ///
    /// `chunk_size` is the total capacity for this variant.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus `InvalidConfig` if the configuration
    /// does not validate.
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        Self::new(config.element_size, config.chunk_size)
    }

    fn build(element_size: usize, capacity: usize, align: usize) -> PoolResult<Self> {
        if capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }

        let mut store = BlockStore::new(element_size, capacity, align);
        if store.grow().is_none() {
            let requested_bytes = store.chunk_bytes().unwrap_or(usize::MAX);
            warn!(requested_bytes, "failed to allocate fixed pool buffer");
            return Err(PoolError::Exhausted { requested_bytes });
        }

        Ok(Self { store })
    }

    /// Returns the number of blocks currently handed out.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Returns the total number of blocks.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Returns the number of free blocks.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.store.available()
    }

    /// Returns the size of each block in bytes.
    #[inline]
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.store.element_size()
    }

    /// Returns the number of blocks in the buffer (same as `capacity`).
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.store.chunk_size()
    }

    /// Returns the block the next allocation will hand out, if any.
    #[inline]
    #[must_use]
    pub const fn free_head(&self) -> Option<BlockIndex> {
        self.store.head()
    }

    /// Hands out one block.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if every block is in use.
    pub fn malloc(&mut self) -> PoolResult<NonNull<u8>> {
        let index = self.allocate()?;
        Ok(self.block_ptr(index))
    }

    /// Hands out one block by index.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if every block is in use.
    pub fn allocate(&mut self) -> PoolResult<BlockIndex> {
        self.store.pop().ok_or_else(|| {
            warn!(capacity = self.capacity(), "fixed pool exhausted");
            PoolError::Exhausted {
                requested_bytes: self.element_size(),
            }
        })
    }

    /// Returns a block handed out by [`malloc`](Self::malloc), after
    /// checking that this pool owns it and that it is outstanding.
    ///
    /// # Errors
    ///
    /// - `PoolError::ForeignPointerRejected` if `block` is outside the
    ///   buffer or not at the start of a block
    /// - `PoolError::DoubleFree` if the block is already free
    ///
    /// The pool is unchanged on error.
    pub fn free(&mut self, block: NonNull<u8>) -> PoolResult<()> {
        self.store.free(block)
    }

    /// Returns a block without validating it.
    ///
    /// The index is derived from the address by plain arithmetic. The caller
    /// guarantees that `block` came from this pool's `malloc` and is still
    /// outstanding; the checks only run in debug builds. Breaking that
    /// contract corrupts the pool's accounting (blocks may become
    /// unreachable or be counted twice) but never hands the same block to
    /// two callers at once.
    ///
    /// # Panics
    ///
    /// Panics if `block` lies past the end of the buffer.
    pub fn free_trusted(&mut self, block: NonNull<u8>) {
        let base = self.block_ptr(BlockIndex::new(0));
        let offset = (block.as_ptr() as usize).wrapping_sub(base.as_ptr() as usize);
        let index = BlockIndex::new(offset / self.element_size());
        debug_assert_eq!(
            self.index_of(block.as_ptr()),
            Some(index),
            "trusted free of a block this pool does not own"
        );
        self.store.release_unchecked(index);
    }

    /// Returns a block by index.
    ///
    /// # Errors
    ///
    /// `PoolError::ForeignPointerRejected` if `index` is out of range,
    /// `PoolError::DoubleFree` if the block is already free.
    pub fn release(&mut self, index: BlockIndex) -> PoolResult<()> {
        self.store.release(index)
    }

    /// Finds the block starting at `ptr`, if this pool owns it.
    #[must_use]
    pub fn index_of(&self, ptr: *const u8) -> Option<BlockIndex> {
        self.store.index_of(ptr)
    }

    /// Returns the address of block `index`, or `None` past the capacity.
    #[must_use]
    pub fn address(&self, index: BlockIndex) -> Option<NonNull<u8>> {
        self.store.address(index)
    }

    /// Address of a block known to be in range.
    #[inline]
    pub(crate) fn block_ptr(&self, index: BlockIndex) -> NonNull<u8> {
        self.store.block_address(index)
    }

    /// Returns `true` if block `index` is currently handed out.
    #[inline]
    #[must_use]
    pub fn is_occupied(&self, index: BlockIndex) -> bool {
        self.store.is_occupied(index)
    }

    /// Views the bytes of an occupied block.
    #[must_use]
    pub fn block(&self, index: BlockIndex) -> Option<&[u8]> {
        self.store.block(index)
    }

    /// Mutably views the bytes of an occupied block.
    pub fn block_mut(&mut self, index: BlockIndex) -> Option<&mut [u8]> {
        self.store.block_mut(index)
    }

    /// Copies a plain-old-data value into the start of an occupied block.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if `T` is larger than a block,
    /// `PoolError::ForeignPointerRejected` if the block is not occupied.
    pub fn write_pod<T: Pod>(&mut self, index: BlockIndex, value: &T) -> PoolResult<()> {
        self.store.write_pod(index, value)
    }

    /// Reads a plain-old-data value from the start of an occupied block.
    #[must_use]
    pub fn read_pod<T: Pod>(&self, index: BlockIndex) -> Option<T> {
        self.store.read_pod(index)
    }

    /// Iterates over handed-out blocks in address order.
    pub fn occupied(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.store.occupied()
    }

    /// Walks the free list from its head.
    #[must_use]
    pub fn free_list(&self) -> FreeListIter<'_> {
        self.store.free_list()
    }

    /// Checks the free-list invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.store.is_consistent()
    }

    /// Marks every block free again without releasing the buffer.
    ///
    /// Every block handed out so far becomes invalid.
    pub fn reset(&mut self) {
        self.store.reset();
    }

    /// Returns an accounting snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.store.stats()
    }
}

impl BlockAllocator for FixedCapacityPool {
    fn malloc(&mut self) -> PoolResult<NonNull<u8>> {
        Self::malloc(self)
    }

    fn free(&mut self, block: NonNull<u8>) -> PoolResult<()> {
        Self::free(self, block)
    }

    fn stats(&self) -> PoolStats {
        Self::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion() {
        let mut pool = FixedCapacityPool::new(32, 2).unwrap();
        let a = pool.malloc().unwrap();
        let b = pool.malloc().unwrap();
        assert_ne!(a, b);

        assert_eq!(
            pool.malloc(),
            Err(PoolError::Exhausted { requested_bytes: 32 })
        );
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            FixedCapacityPool::new(32, 0),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_oversized_buffer_is_exhausted() {
        assert!(matches!(
            FixedCapacityPool::new(usize::MAX / 2, 4),
            Err(PoolError::Exhausted { .. })
        ));
    }

    #[test]
    fn test_alignment_rounding() {
        let pool = FixedCapacityPool::with_alignment(20, 4, 16).unwrap();
        assert_eq!(pool.element_size(), 32);
        for i in 0..4 {
            let address = pool.address(BlockIndex::new(i)).unwrap();
            assert_eq!(address.as_ptr() as usize % 16, 0);
        }

        assert!(matches!(
            FixedCapacityPool::with_alignment(20, 4, 12),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_free_and_reuse() {
        let mut pool = FixedCapacityPool::new(32, 2).unwrap();
        let a = pool.malloc().unwrap();
        let _b = pool.malloc().unwrap();

        pool.free(a).unwrap();
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.malloc().unwrap(), a);
    }

    #[test]
    fn test_free_rejects_foreign_and_double() {
        let mut pool = FixedCapacityPool::new(32, 2).unwrap();
        let a = pool.malloc().unwrap();

        let mut local = [0u8; 32];
        let foreign = NonNull::new(local.as_mut_ptr()).unwrap();
        assert_eq!(pool.free(foreign), Err(PoolError::ForeignPointerRejected));

        pool.free(a).unwrap();
        assert_eq!(pool.free(a), Err(PoolError::DoubleFree { index: 0 }));
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_free_trusted() {
        let mut pool = FixedCapacityPool::new(32, 3).unwrap();
        let _a = pool.malloc().unwrap();
        let b = pool.malloc().unwrap();

        pool.free_trusted(b);
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.free_head(), Some(BlockIndex::new(1)));
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_oversized_bookkeeping_is_exhausted() {
        assert!(matches!(
            FixedCapacityPool::new(8, usize::MAX / 16 + 1),
            Err(PoolError::Exhausted { .. })
        ));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_trusted_double_free_never_aliases() {
        let mut pool = FixedCapacityPool::new(16, 4).unwrap();
        let a = pool.malloc().unwrap();
        let b = pool.malloc().unwrap();

        pool.free_trusted(a);
        pool.free_trusted(a);

        let mut handed_out = vec![b];
        while let Ok(block) = pool.malloc() {
            assert!(!handed_out.contains(&block), "block handed out twice");
            handed_out.push(block);
        }
        assert!(handed_out.len() <= pool.capacity());
    }

    #[test]
    fn test_reset() {
        let mut pool = FixedCapacityPool::new(32, 3).unwrap();
        pool.malloc().unwrap();
        pool.malloc().unwrap();

        pool.reset();
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.occupied().count(), 0);
        let chain: Vec<usize> = pool.free_list().map(BlockIndex::get).collect();
        assert_eq!(chain, vec![0, 1, 2]);
    }

    #[test]
    fn test_pod_round_trip() {
        let mut pool = FixedCapacityPool::new(8, 2).unwrap();
        let index = pool.allocate().unwrap();

        pool.write_pod(index, &0xDEAD_BEEF_u32).unwrap();
        assert_eq!(pool.read_pod::<u32>(index), Some(0xDEAD_BEEF));
        assert!(pool.read_pod::<u32>(BlockIndex::new(1)).is_none());
    }

    #[test]
    fn test_stats() {
        let mut pool = FixedCapacityPool::new(32, 4).unwrap();
        pool.malloc().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.reserved_bytes, 128);
        assert_eq!(stats.available + stats.outstanding, stats.capacity);
    }
}

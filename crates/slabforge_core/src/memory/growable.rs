//! # Growable Pool
//!
//! Fixed-size block allocator that grows one chunk at a time.
//!
//! ```text
//! chunks[0]: [ 0 ][ 1 ][ 2 ][ 3 ]
//! chunks[1]: [ 4 ][ 5 ][ 6 ][ 7 ]     block i -> chunks[i / 4] + (i % 4) * element_size
//! ```
//!
//! Chunks are only ever appended, so an index stays valid for the pool's
//! whole lifetime.

use std::ptr::NonNull;

use bytemuck::Pod;
use tracing::{debug, warn};

use super::allocator::BlockAllocator;
use super::free_list::{BlockIndex, FreeListIter};
use super::stats::PoolStats;
use super::store::BlockStore;
use super::{clamp_element_size, BLOCK_ALIGN};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// A pool of fixed-size blocks backed by an unbounded sequence of chunks.
///
/// No memory is taken from the system until the first allocation. When the
/// free list runs dry, exactly one new chunk of `chunk_size` blocks is added.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per owner or serialize access
/// externally.
///
/// # Example
///
/// ```rust
/// use slabforge_core::GrowablePool;
///
/// let mut pool = GrowablePool::new(32, 64).unwrap();
///
/// let block = pool.malloc().unwrap();
/// assert_eq!(pool.size(), 1);
///
/// pool.free(block).unwrap();
/// assert_eq!(pool.size(), 0);
/// ```
#[derive(Debug)]
pub struct GrowablePool {
    /// Chunks, free list and pointer resolution.
    store: BlockStore,
}

impl GrowablePool {
    /// Creates an empty pool.
    ///
    /// # Arguments
    ///
    /// * `element_size` - Bytes per block, clamped up to `MIN_ELEMENT_SIZE`
    /// * `chunk_size` - Blocks added per growth step
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if `chunk_size` is zero.
    pub fn new(element_size: usize, chunk_size: usize) -> PoolResult<Self> {
        if chunk_size == 0 {
            return Err(PoolError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            store: BlockStore::new(clamp_element_size(element_size), chunk_size, BLOCK_ALIGN),
        })
    }

    /// Creates an empty pool from a loaded configuration.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if the configuration does not validate.
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        Self::new(config.element_size, config.chunk_size)
    }

    /// Returns the number of blocks currently handed out.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Returns the number of blocks currently backed by memory.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Returns the number of blocks ready to be handed out without growing.
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

    /// Returns the number of blocks per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.store.chunk_size()
    }

    /// Returns the number of chunks acquired so far.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.store.chunk_count()
    }

    /// Returns the block the next allocation will hand out, if any.
    #[inline]
    #[must_use]
    pub const fn free_head(&self) -> Option<BlockIndex> {
        self.store.head()
    }

    /// Hands out one block, growing the pool if needed.
    ///
    /// The memory is raw storage; no constructor runs. A freshly grown chunk
    /// is zeroed, a recycled block keeps whatever its last user wrote.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if the system refused a new chunk.
    pub fn malloc(&mut self) -> PoolResult<NonNull<u8>> {
        let index = self.allocate()?;
        Ok(self.store.block_address(index))
    }

    /// Hands out one block by index, growing the pool if needed.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if the system refused a new chunk.
    pub fn allocate(&mut self) -> PoolResult<BlockIndex> {
        if self.store.head().is_none() && self.grow().is_none() {
            let requested_bytes = self.store.chunk_bytes().unwrap_or(usize::MAX);
            warn!(
                requested_bytes,
                "failed to allocate memory from system to grow pool"
            );
            return Err(PoolError::Exhausted { requested_bytes });
        }

        self.store.pop().ok_or(PoolError::Exhausted {
            requested_bytes: self.element_size(),
        })
    }

    /// Acquires one more chunk and threads its blocks onto the free list.
    ///
    /// Returns the index of the chunk's first block, which becomes the new
    /// free-list head, or `None` if the allocation failed. A failed grow
    /// leaves the pool unchanged.
    pub fn grow(&mut self) -> Option<BlockIndex> {
        self.store.grow()
    }

    /// Returns a block handed out by [`malloc`](Self::malloc).
    ///
    /// The owning chunk is found by scanning the chunk sequence.
    ///
    /// # Errors
    ///
    /// - `PoolError::ForeignPointerRejected` if no chunk owns `block` or it
    ///   does not point at the start of a block
    /// - `PoolError::DoubleFree` if the block is already free
    ///
    /// The pool is unchanged on error.
    pub fn free(&mut self, block: NonNull<u8>) -> PoolResult<()> {
        self.store.free(block)
    }

    /// Returns a block by index. O(1), no chunk scan.
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

    /// Checks the free-list and capacity invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.store.is_consistent()
    }

    /// Returns every chunk to the system and resets all counters.
    ///
    /// Every block handed out so far becomes invalid.
    pub fn release_all(&mut self) {
        debug!(
            chunks = self.chunk_count(),
            outstanding = self.size(),
            "releasing all pool memory"
        );
        self.store.clear();
    }

    /// Returns an accounting snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.store.stats()
    }
}

impl BlockAllocator for GrowablePool {
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
    fn test_new_pool_is_empty() {
        let pool = GrowablePool::new(16, 4).unwrap();
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.chunk_count(), 0);
        assert_eq!(pool.free_head(), None);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            GrowablePool::new(16, 0),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_element_size_clamped() {
        let pool = GrowablePool::new(1, 4).unwrap();
        assert_eq!(pool.element_size(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_growth_trigger() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        for _ in 0..4 {
            pool.malloc().unwrap();
        }
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(pool.capacity(), 4);

        pool.malloc().unwrap();
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.size(), 5);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_grow_returns_first_index_of_chunk() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        assert_eq!(pool.grow(), Some(BlockIndex::new(0)));
        assert_eq!(pool.grow(), Some(BlockIndex::new(4)));
        assert_eq!(pool.free_head(), Some(BlockIndex::new(4)));
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_growth_failure_is_exhausted() {
        let mut pool = GrowablePool::new(usize::MAX / 2, 4).unwrap();
        assert_eq!(pool.grow(), None);
        assert!(matches!(pool.malloc(), Err(PoolError::Exhausted { .. })));
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn test_failed_grow_keeps_pool_usable() {
        // A chunk of 2^60 eight-byte blocks needs a slot table larger than
        // `isize::MAX`, so the reservation fails before any chunk is taken.
        let mut pool = GrowablePool::new(8, usize::MAX / 16 + 1).unwrap();

        assert_eq!(pool.grow(), None);
        assert!(matches!(pool.malloc(), Err(PoolError::Exhausted { .. })));
        assert!(matches!(pool.allocate(), Err(PoolError::Exhausted { .. })));
        assert_eq!(pool.chunk_count(), 0);
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.free_head(), None);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_recycle_most_recent_first() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let _a = pool.malloc().unwrap();
        let p = pool.malloc().unwrap();

        pool.free(p).unwrap();
        let q = pool.malloc().unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn test_addresses_follow_chunk_layout() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let first = pool.malloc().unwrap();
        let second = pool.malloc().unwrap();

        assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, 16);
        assert_eq!(pool.index_of(second.as_ptr()), Some(BlockIndex::new(1)));
        assert_eq!(pool.address(BlockIndex::new(1)), Some(second));
        assert_eq!(pool.address(BlockIndex::new(4)), None);
    }

    #[test]
    fn test_free_foreign_pointer() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        pool.malloc().unwrap();
        let available = pool.available();

        let mut local = 0u64;
        let foreign = NonNull::from(&mut local).cast::<u8>();
        assert_eq!(pool.free(foreign), Err(PoolError::ForeignPointerRejected));
        assert_eq!(pool.available(), available);
    }

    #[test]
    fn test_free_interior_pointer_rejected() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let block = pool.malloc().unwrap();
        let interior = pool.address(BlockIndex::new(0)).unwrap().as_ptr().wrapping_add(3);

        assert_eq!(pool.index_of(interior), None);
        pool.free(block).unwrap();
    }

    #[test]
    fn test_double_free_rejected() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let block = pool.malloc().unwrap();
        pool.free(block).unwrap();

        assert_eq!(pool.free(block), Err(PoolError::DoubleFree { index: 0 }));
        assert_eq!(pool.available(), 4);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_release_by_index() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let index = pool.allocate().unwrap();
        assert!(pool.is_occupied(index));

        pool.release(index).unwrap();
        assert!(!pool.is_occupied(index));
        assert_eq!(
            pool.release(BlockIndex::new(99)),
            Err(PoolError::ForeignPointerRejected)
        );
    }

    #[test]
    fn test_pod_round_trip() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let index = pool.allocate().unwrap();

        pool.write_pod(index, &[1.5f32, 2.5, 3.5]).unwrap();
        assert_eq!(pool.read_pod::<[f32; 3]>(index), Some([1.5, 2.5, 3.5]));
        assert!(pool.read_pod::<[u64; 3]>(index).is_none());
        assert!(matches!(
            pool.write_pod(index, &[0u64; 3]),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_block_views_only_occupied() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        let index = pool.allocate().unwrap();
        pool.block_mut(index).unwrap()[0] = 0xAB;
        assert_eq!(pool.block(index).unwrap()[0], 0xAB);

        assert!(pool.block(BlockIndex::new(1)).is_none());
        pool.release(index).unwrap();
        assert!(pool.block(index).is_none());
    }

    #[test]
    fn test_release_all() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        for _ in 0..6 {
            pool.malloc().unwrap();
        }

        pool.release_all();
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.chunk_count(), 0);
        assert_eq!(pool.free_head(), None);

        // Reusable after teardown.
        pool.malloc().unwrap();
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_stats() {
        let mut pool = GrowablePool::new(16, 4).unwrap();
        pool.malloc().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.outstanding, 1);
        assert_eq!(stats.available, 3);
        assert_eq!(stats.reserved_bytes, 64);
    }
}

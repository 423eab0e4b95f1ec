//! # Free List
//!
//! Bookkeeping shared by every pool variant: one tagged slot per block.
//!
//! ```text
//! head ──> [3] Free{next: 1} ──> [1] Free{next: 4} ──> [4] Free{next: None}
//!          [0] Occupied   [2] Occupied
//! ```
//!
//! The chain lives in a side table instead of inside the blocks, so the
//! pools never reinterpret bytes a caller may still be looking at.

use crate::error::{PoolError, PoolResult};

/// Global position of a block across all chunks of a pool.
///
/// Index `i` lives in chunk `i / chunk_size` at byte offset
/// `(i % chunk_size) * element_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex(usize);

impl BlockIndex {
    /// Creates an index from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Returns the chunk holding this block.
    #[inline]
    #[must_use]
    pub const fn chunk(self, chunk_size: usize) -> usize {
        self.0 / chunk_size
    }

    /// Returns the byte offset of this block inside its chunk.
    #[inline]
    #[must_use]
    pub const fn byte_offset(self, chunk_size: usize, element_size: usize) -> usize {
        (self.0 % chunk_size) * element_size
    }
}

/// State of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    /// On the free list; `next` is the following free block.
    Free { next: Option<BlockIndex> },
    /// Handed out to a caller.
    Occupied,
}

/// Singly-linked chain of free blocks plus the occupancy of every block.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    slots: Vec<Slot>,
    head: Option<BlockIndex>,
    available: usize,
}

impl FreeList {
    /// Creates an empty list with no blocks.
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            available: 0,
        }
    }

    /// Number of blocks tracked (free or not).
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) const fn available(&self) -> usize {
        self.available
    }

    #[inline]
    pub(crate) const fn head(&self) -> Option<BlockIndex> {
        self.head
    }

    /// Makes room for `count` more slots without touching the list.
    ///
    /// Returns `false` if the slot table cannot grow.
    pub(crate) fn try_reserve(&mut self, count: usize) -> bool {
        self.slots.try_reserve(count).is_ok()
    }

    /// Appends `count` free blocks and makes the first of them the new head.
    ///
    /// Block `k` links to `k + 1`; the last one links to the previous head.
    /// Returns the first new index, or `None` when `count` is zero or the
    /// slot table cannot grow. The list is unchanged on `None`.
    pub(crate) fn extend(&mut self, count: usize) -> Option<BlockIndex> {
        if count == 0 || !self.try_reserve(count) {
            return None;
        }

        let first = self.slots.len();
        for k in 1..count {
            self.slots.push(Slot::Free {
                next: Some(BlockIndex(first + k)),
            });
        }
        self.slots.push(Slot::Free { next: self.head });

        self.head = Some(BlockIndex(first));
        self.available += count;
        self.head
    }

    /// Detaches the head block and marks it occupied.
    pub(crate) fn pop(&mut self) -> Option<BlockIndex> {
        let index = self.head?;
        let Slot::Free { next } = self.slots[index.0] else {
            // Only reachable after a bad `push_unchecked`.
            self.head = None;
            return None;
        };

        self.slots[index.0] = Slot::Occupied;
        self.head = next;
        self.available -= 1;
        Some(index)
    }

    /// Returns an occupied block to the head of the list.
    ///
    /// # Errors
    ///
    /// `ForeignPointerRejected` if the index is out of range,
    /// `DoubleFree` if the block is already free. Neither changes the list.
    pub(crate) fn push(&mut self, index: BlockIndex) -> PoolResult<()> {
        match self.slots.get(index.0) {
            None => Err(PoolError::ForeignPointerRejected),
            Some(Slot::Free { .. }) => Err(PoolError::DoubleFree { index: index.0 }),
            Some(Slot::Occupied) => {
                self.link(index);
                Ok(())
            }
        }
    }

    /// Returns a block to the list without checking its state.
    ///
    /// Pushing a block that is already free links it twice and breaks the
    /// chain; callers must guarantee the block is occupied.
    pub(crate) fn push_unchecked(&mut self, index: BlockIndex) {
        debug_assert!(self.is_occupied(index), "block {} is not occupied", index.0);
        self.link(index);
    }

    #[inline]
    fn link(&mut self, index: BlockIndex) {
        self.slots[index.0] = Slot::Free { next: self.head };
        self.head = Some(index);
        self.available += 1;
    }

    #[inline]
    pub(crate) fn is_occupied(&self, index: BlockIndex) -> bool {
        matches!(self.slots.get(index.0), Some(Slot::Occupied))
    }

    /// Occupied blocks in address order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Occupied))
            .map(|(index, _)| BlockIndex(index))
    }

    pub(crate) fn iter(&self) -> FreeListIter<'_> {
        FreeListIter {
            slots: &self.slots,
            cursor: self.head,
            remaining: self.slots.len(),
        }
    }

    /// Marks every block free again, re-threaded in address order.
    pub(crate) fn reset(&mut self) {
        let count = self.slots.len();
        self.clear();
        self.extend(count);
    }

    /// Forgets every block.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.head = None;
        self.available = 0;
    }

    /// Checks every free-list invariant.
    ///
    /// The chain from the head must end within `capacity` steps, visit each
    /// index at most once, touch only free slots, and its length must match
    /// both `available` and the number of free slots.
    pub(crate) fn is_consistent(&self) -> bool {
        let mut seen = vec![false; self.slots.len()];
        let mut length = 0;
        let mut cursor = self.head;

        while let Some(index) = cursor {
            match self.slots.get(index.0) {
                Some(Slot::Free { next }) if !seen[index.0] => {
                    seen[index.0] = true;
                    length += 1;
                    cursor = *next;
                }
                _ => return false,
            }
        }

        let free_slots = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Free { .. }))
            .count();

        length == self.available && free_slots == self.available
    }
}

/// Walks a pool's free list from its head.
///
/// Stops after `capacity` steps even if the chain were corrupted.
#[derive(Debug, Clone)]
pub struct FreeListIter<'a> {
    slots: &'a [Slot],
    cursor: Option<BlockIndex>,
    remaining: usize,
}

impl Iterator for FreeListIter<'_> {
    type Item = BlockIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        if self.remaining == 0 {
            self.cursor = None;
            return None;
        }

        self.remaining -= 1;
        self.cursor = match self.slots.get(index.0) {
            Some(Slot::Free { next }) => *next,
            _ => None,
        };
        Some(index)
    }
}

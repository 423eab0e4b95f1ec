//! # Memory Management
//!
//! Fixed-size block pools for churn-heavy allocation of same-sized objects.
//!
//! ## Design Philosophy
//!
//! Memory is acquired in large chunks and recycled block by block:
//! - O(1) `malloc`/`free` through a free list
//! - No fragmentation - every block has the same size
//! - Blocks of one pool sit next to each other for cache-friendly iteration
//!
//! ## Variants
//!
//! | Pool                | Growth          | `free` validation            |
//! |---------------------|-----------------|------------------------------|
//! | `GrowablePool`      | one chunk/time  | chunk scan + occupancy       |
//! | `FixedCapacityPool` | never           | range + occupancy, or trusted|
//! | `TypedPool<T>`      | never           | handle owner + occupancy     |

mod allocator;
mod chunk;
mod fixed;
mod free_list;
mod growable;
mod ownership;
mod stats;
mod store;
mod typed;

pub use allocator::BlockAllocator;
pub use fixed::FixedCapacityPool;
pub use free_list::{BlockIndex, FreeListIter};
pub use growable::GrowablePool;
pub use stats::PoolStats;
pub use typed::{TypedHandle, TypedPool};

/// Smallest block a pool hands out: the width of a block index.
pub const MIN_ELEMENT_SIZE: usize = std::mem::size_of::<usize>();

/// Alignment of every chunk base address.
pub(crate) const BLOCK_ALIGN: usize = std::mem::align_of::<usize>();

/// Clamps `element_size` up to [`MIN_ELEMENT_SIZE`].
#[inline]
pub(crate) const fn clamp_element_size(element_size: usize) -> usize {
    if element_size < MIN_ELEMENT_SIZE {
        MIN_ELEMENT_SIZE
    } else {
        element_size
    }
}

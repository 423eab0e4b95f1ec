//! # SLABFORGE Core
//!
//! Fixed-size block pool allocators designed for:
//! - O(1) amortized `malloc`/`free` under heavy churn
//! - Zero fragmentation (every block has the same size)
//! - Cache-friendly iteration over live blocks
//!
//! ## Pools
//!
//! 1. **`GrowablePool`** - adds one chunk whenever the free list runs dry
//! 2. **`FixedCapacityPool`** - one pre-allocated buffer, reports exhaustion
//! 3. **`TypedPool<T>`** - constructs and destructs `T` values in a fixed pool
//!
//! ## Example
//!
//! ```rust
//! use slabforge_core::{GrowablePool, PoolError};
//!
//! let mut pool = GrowablePool::new(64, 4).unwrap();
//! let blocks: Vec<_> = (0..5).map(|_| pool.malloc().unwrap()).collect();
//! assert_eq!(pool.capacity(), 8); // grew by exactly one chunk
//!
//! pool.free(blocks[0]).unwrap();
//! assert_eq!(pool.free(blocks[0]), Err(PoolError::DoubleFree { index: 0 }));
//! ```
//!
//! Pools are single-threaded by contract: none of them is `Send` or `Sync`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;

pub use config::{PoolConfig, PoolKind};
pub use error::{PoolError, PoolResult};
pub use memory::{
    BlockAllocator, BlockIndex, FixedCapacityPool, FreeListIter, GrowablePool, PoolStats,
    TypedHandle, TypedPool, MIN_ELEMENT_SIZE,
};

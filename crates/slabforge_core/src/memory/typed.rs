//! # Typed Pool
//!
//! Constructed objects on top of a [`FixedCapacityPool`].
//!
//! Construction is tied to acquiring a block and destruction to releasing
//! it. A [`TypedHandle`] cannot be copied and is consumed when its value is
//! destructed, so a destructor can neither be skipped (the pool drops every
//! live value when it goes away) nor run twice.

// SAFETY: This module places values of `T` into raw pool blocks.
// A block holds an initialized `T` exactly while it is occupied.
#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use super::fixed::FixedCapacityPool;
use super::free_list::BlockIndex;
use crate::error::{PoolError, PoolResult};

/// Source of pool identities, so handles cannot cross pools.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Owning handle to a value constructed in a [`TypedPool`].
///
/// Pass it back to [`TypedPool::destruct`] or [`TypedPool::take`]. A handle
/// that is simply dropped leaves its value in the pool until the pool
/// itself is dropped.
#[must_use = "dropping a handle keeps its value alive until the pool is dropped"]
pub struct TypedHandle<T> {
    index: BlockIndex,
    pool_id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedHandle<T> {
    /// Returns the block holding the value.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> BlockIndex {
        self.index
    }
}

impl<T> fmt::Debug for TypedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandle")
            .field("index", &self.index)
            .field("pool_id", &self.pool_id)
            .finish()
    }
}

/// A fixed-capacity pool of `T` values.
///
/// # Example
///
/// ```rust
/// use slabforge_core::TypedPool;
///
/// struct Particle { x: f32, life: f32 }
///
/// let mut pool: TypedPool<Particle> = TypedPool::new(1024).unwrap();
/// let handle = pool.construct(Particle { x: 0.0, life: 1.0 }).unwrap();
/// pool.get_mut(&handle).unwrap().x += 1.0;
///
/// pool.destruct(handle).unwrap();
/// assert!(pool.is_empty());
/// ```
pub struct TypedPool<T> {
    /// Raw blocks sized and aligned for `T`.
    blocks: FixedCapacityPool,
    /// Identity stamped into every handle.
    id: u64,
    /// The pool owns the `T` values it holds.
    _marker: PhantomData<T>,
}

/// Gives a reserved block back if construction unwinds.
struct Reservation<'a> {
    blocks: &'a mut FixedCapacityPool,
    index: BlockIndex,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let block = self.blocks.block_ptr(self.index);
        self.blocks.free_trusted(block);
    }
}

impl<T> TypedPool<T> {
    /// Creates a pool with room for `capacity` values.
    ///
    /// Blocks are `size_of::<T>()` bytes (clamped) and aligned for `T`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if `capacity` is zero
    /// - `PoolError::Exhausted` if the buffer cannot be allocated
    pub fn new(capacity: usize) -> PoolResult<Self> {
        let blocks = FixedCapacityPool::with_alignment(
            std::mem::size_of::<T>(),
            capacity,
            std::mem::align_of::<T>(),
        )?;

        Ok(Self {
            blocks,
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        })
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.size()
    }

    /// Returns `true` if no value is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of live values.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.capacity()
    }

    /// Returns the number of values that can still be constructed.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.blocks.available()
    }

    /// Moves `value` into the pool.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if the pool is full; `value` is dropped.
    pub fn construct(&mut self, value: T) -> PoolResult<TypedHandle<T>> {
        self.construct_with(|| value)
    }

    /// Builds a value directly in the pool.
    ///
    /// `init` is only called once a block has been reserved.
    ///
    /// # Errors
    ///
    /// `PoolError::Exhausted` if the pool is full; `init` is not called.
    pub fn construct_with<F>(&mut self, init: F) -> PoolResult<TypedHandle<T>>
    where
        F: FnOnce() -> T,
    {
        let index = self.blocks.allocate()?;
        let reservation = Reservation {
            blocks: &mut self.blocks,
            index,
        };

        let value = init();
        let ptr = reservation.blocks.block_ptr(index).cast::<T>();
        // SAFETY: the block is reserved for us, in bounds, sized and aligned
        // for `T` (see `new`), and holds no live value.
        unsafe { ptr.as_ptr().write(value) };
        std::mem::forget(reservation);

        Ok(TypedHandle {
            index,
            pool_id: self.id,
            _marker: PhantomData,
        })
    }

    /// Drops the value and returns its block to the pool.
    ///
    /// # Errors
    ///
    /// `PoolError::ForeignPointerRejected` if the handle belongs to another
    /// pool, `PoolError::DoubleFree` if its block is no longer occupied.
    pub fn destruct(&mut self, handle: TypedHandle<T>) -> PoolResult<()> {
        drop(self.take(handle)?);
        Ok(())
    }

    /// Moves the value out and returns its block to the pool.
    ///
    /// # Errors
    ///
    /// As [`destruct`](Self::destruct).
    pub fn take(&mut self, handle: TypedHandle<T>) -> PoolResult<T> {
        if handle.pool_id != self.id {
            warn!(index = handle.index.get(), "handle belongs to another pool");
            return Err(PoolError::ForeignPointerRejected);
        }

        self.blocks.release(handle.index)?;
        let ptr = self.slot(handle.index);
        // SAFETY: the block was occupied until the release above, so it holds
        // an initialized `T`. It is now free, so this is the only read.
        Ok(unsafe { ptr.as_ptr().read() })
    }

    /// Returns a reference to the value behind `handle`.
    #[must_use]
    pub fn get(&self, handle: &TypedHandle<T>) -> Option<&T> {
        self.as_ptr(handle)
            // SAFETY: occupied blocks hold an initialized `T`; `&self`
            // keeps the pool from changing while the reference lives.
            .map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns a mutable reference to the value behind `handle`.
    pub fn get_mut(&mut self, handle: &TypedHandle<T>) -> Option<&mut T> {
        self.as_ptr(handle)
            // SAFETY: as in `get`; `&mut self` makes the reference unique.
            .map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Returns a raw pointer to the value behind `handle`.
    ///
    /// `None` if the handle belongs to another pool.
    #[must_use]
    pub fn as_ptr(&self, handle: &TypedHandle<T>) -> Option<NonNull<T>> {
        (handle.pool_id == self.id && self.blocks.is_occupied(handle.index))
            .then(|| self.slot(handle.index))
    }

    /// Iterates over live values in address order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks
            .occupied()
            // SAFETY: occupied blocks hold an initialized `T`.
            .map(move |index| unsafe { self.slot(index).as_ref() })
    }

    /// Mutably iterates over live values in address order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let blocks = &self.blocks;
        blocks.occupied().map(move |index| {
            // SAFETY: occupied blocks hold an initialized `T`; each index is
            // yielded once and `&mut self` is held for the iterator's life.
            unsafe { &mut *blocks.block_ptr(index).cast::<T>().as_ptr() }
        })
    }

    #[inline]
    fn slot(&self, index: BlockIndex) -> NonNull<T> {
        self.blocks.block_ptr(index).cast::<T>()
    }
}

impl<T> Drop for TypedPool<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        for index in self.blocks.occupied() {
            // SAFETY: occupied blocks hold an initialized `T`, and the buffer
            // is released right after this loop.
            unsafe { self.slot(index).as_ptr().drop_in_place() };
        }
    }
}

impl<T> fmt::Debug for TypedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedPool")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

//! # Chunk
//!
//! One contiguous, zero-initialized backing allocation obtained straight from
//! the system allocator. A chunk is owned by exactly one pool and returned to
//! the system when dropped.

// SAFETY: This module wraps the raw system allocation behind a safe API.
// Every unsafe block states the bound it relies on.
#![allow(unsafe_code)]

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// A raw buffer of `size()` bytes.
#[derive(Debug)]
pub(crate) struct Chunk {
    base: NonNull<u8>,
    layout: Layout,
}

impl Chunk {
    /// Allocates `bytes` zeroed bytes aligned to `align`.
    ///
    /// Returns `None` for a zero size, an invalid layout, or when the system
    /// refuses the allocation.
    pub(crate) fn allocate(bytes: usize, align: usize) -> Option<Self> {
        if bytes == 0 {
            return None;
        }
        let layout = Layout::from_size_align(bytes, align).ok()?;

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).map(|base| Self { base, layout })
    }

    /// Size in bytes.
    #[inline]
    pub(crate) const fn size(&self) -> usize {
        self.layout.size()
    }

    /// Byte offset of `ptr` inside this chunk, if it points into it.
    #[inline]
    pub(crate) fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = (ptr as usize).checked_sub(self.base.as_ptr() as usize)?;
        (offset < self.size()).then_some(offset)
    }

    /// Pointer to the byte at `offset`.
    #[inline]
    pub(crate) fn at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset < self.size(), "offset {offset} outside chunk");
        // SAFETY: `offset` is inside the allocation, so the result is
        // in bounds and non-null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Views `len` bytes starting at `offset`.
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.size(), "range outside chunk");
        // SAFETY: the range is inside the allocation, which was zeroed on
        // creation and is therefore always initialized.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(offset), len) }
    }

    /// Mutably views `len` bytes starting at `offset`.
    pub(crate) fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.size(), "range outside chunk");
        // SAFETY: as in `bytes`; `&mut self` makes the view exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: `base` was returned by `alloc_zeroed` with this exact layout
        // and is released only here.
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_is_zeroed() {
        let chunk = Chunk::allocate(64, 8).unwrap();
        assert_eq!(chunk.size(), 64);
        assert!(chunk.bytes(0, 64).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_chunk_rejects_bad_layouts() {
        assert!(Chunk::allocate(0, 8).is_none());
        assert!(Chunk::allocate(64, 3).is_none());
        assert!(Chunk::allocate(usize::MAX, 8).is_none());
    }

    #[test]
    fn test_offset_of() {
        let chunk = Chunk::allocate(32, 8).unwrap();
        let base = chunk.at(0).as_ptr();

        assert_eq!(chunk.offset_of(base), Some(0));
        assert_eq!(chunk.offset_of(chunk.at(31).as_ptr()), Some(31));
        assert_eq!(chunk.offset_of(base.wrapping_add(32)), None);
        assert_eq!(chunk.offset_of(base.wrapping_sub(1)), None);
    }

    #[test]
    fn test_bytes_mut_writes_through() {
        let mut chunk = Chunk::allocate(16, 8).unwrap();
        chunk.bytes_mut(8, 4).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(chunk.bytes(8, 4), &[1, 2, 3, 4]);
    }
}

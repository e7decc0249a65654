//! Owned, zeroed, 16-byte aligned heap block backing every allocator.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{MemoryError, MemoryResult};

/// Alignment of every backing buffer
pub const BUFFER_ALIGN: usize = 16;

#[repr(C, align(16))]
struct MaxAlign([u8; 16]);

/// Heap block released on drop.
///
/// A zero-capacity buffer holds an aligned dangling pointer and never touches
/// the global allocator.
pub struct OwnedBuffer {
    ptr: NonNull<u8>,
    capacity: usize,
}

impl OwnedBuffer {
    /// Allocates `capacity` zeroed bytes.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        if capacity == 0 {
            return Ok(Self {
                ptr: NonNull::<MaxAlign>::dangling().cast(),
                capacity: 0,
            });
        }

        let layout = Layout::from_size_align(capacity, BUFFER_ALIGN)
            .map_err(|_| MemoryError::size_overflow("buffer layout"))?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| MemoryError::allocation_failed(capacity, BUFFER_ALIGN))?;

        Ok(Self { ptr, capacity })
    }

    /// Base address of the block
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Base address as an integer
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Size of the block in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `[begin, end)` address range
    #[inline]
    pub fn range(&self) -> core::ops::Range<usize> {
        self.addr()..self.addr() + self.capacity
    }

    /// Whether `addr` falls inside the block
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        self.range().contains(&addr)
    }

    /// Pointer `offset` bytes past the base.
    ///
    /// # Safety
    ///
    /// `offset` must be at most `capacity`.
    #[inline]
    pub unsafe fn at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.capacity);
        // SAFETY: caller keeps `offset` within (or one past) the block.
        unsafe { self.ptr.add(offset) }
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        // SAFETY: the same layout was validated and used for allocation in `new`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.capacity, BUFFER_ALIGN);
            alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

impl core::fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("capacity", &self.capacity)
            .finish()
    }
}

//! The allocator contract shared by every strategy

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

use super::{AllocatorId, AllocatorKind, Snapshot};
use crate::error::MemoryResult;
use crate::utils::copy_raw;

/// Default alignment for [`Allocator::allocate`]: one machine word
pub const DEFAULT_ALIGNMENT: usize = core::mem::size_of::<usize>();

/// Region/bump style allocator.
///
/// All methods take `&self`; strategies keep their cursors in `Cell`s so the
/// contract stays object safe and usable through `&dyn Allocator` or
/// `Rc<dyn Allocator>`. Instances are `!Sync`: one owner, one thread.
///
/// Individual allocations are never freed. Storage comes back only through
/// [`rewind`](Allocator::rewind), [`reset`](Allocator::reset) or
/// [`cleanup`](Allocator::cleanup). Those take `&self` like everything else,
/// so a container may still hold a shared borrow of the allocator when they
/// run; they are `unsafe` and the caller vouches that no live borrower uses
/// the reclaimed storage. [`ScopedAllocator`](crate::scope::ScopedAllocator)
/// and [`StackFrame`](super::StackFrame) provide the same rewind safely by
/// holding the allocator exclusively.
///
/// ```compile_fail,E0133
/// use sl_memory::allocator::{Allocator, LinearAllocator};
/// use sl_memory::collections::HashMap;
///
/// let linear = LinearAllocator::new(4096);
/// let mut map = HashMap::with_allocator(&linear);
/// map.insert(1_u64, 100_u64);
/// linear.reset(); // reclaims the map's slots: requires `unsafe`
/// assert_eq!(map.get(&1), Some(&100));
/// ```
pub trait Allocator {
    /// Identity used to validate snapshots
    fn id(&self) -> AllocatorId;

    /// Strategy of this allocator
    fn kind(&self) -> AllocatorKind;

    /// Allocate `size` bytes.
    ///
    /// `size` is rounded up to a multiple of `alignment` (`0` means no
    /// rounding) and the returned address is aligned to it. Returns `None`
    /// when the request cannot be satisfied.
    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>>;

    /// Allocate `size` bytes with [`DEFAULT_ALIGNMENT`]
    #[inline]
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_aligned(size, DEFAULT_ALIGNMENT)
    }

    /// Allocate fresh space for `new_size` bytes and copy
    /// `min(old_size, new_size)` bytes from `old`.
    ///
    /// The old block is not reclaimed. `None` for `old` behaves like
    /// [`allocate`](Allocator::allocate).
    ///
    /// # Safety
    ///
    /// When `old` is `Some`, it must be valid for reads of `old_size` bytes.
    unsafe fn reallocate(
        &self,
        old: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let new = self.allocate(new_size)?;
        if let Some(old) = old {
            let n = old_size.min(new_size);
            // SAFETY: `new` holds at least `new_size` bytes, `old` is readable
            // for `old_size` bytes per the caller's contract.
            unsafe { copy_raw(new, old, n) };
        }
        Some(new)
    }

    /// Capture the current logical position
    fn snapshot(&self) -> Snapshot;

    /// Restore a previously captured position.
    ///
    /// Fails without touching allocator state when the snapshot belongs to
    /// another instance, another strategy, or points outside this
    /// allocator's buffers.
    ///
    /// # Safety
    ///
    /// On success every block handed out after `snapshot` was taken is
    /// reused by later allocations. No pointer into those blocks, and no
    /// container (such as [`Array`](crate::collections::Array) or
    /// [`HashMap`](crate::collections::HashMap)) storing its data in them,
    /// may be used afterwards.
    unsafe fn try_rewind(&self, snapshot: &Snapshot) -> MemoryResult<()>;

    /// Restore a previously captured position.
    ///
    /// # Safety
    ///
    /// Same contract as [`try_rewind`](Allocator::try_rewind).
    ///
    /// # Panics
    ///
    /// A rejected snapshot is a contract violation and panics with the
    /// reason (aborting in release builds).
    unsafe fn rewind(&self, snapshot: &Snapshot) {
        // SAFETY: forwarded from the caller.
        if let Err(e) = unsafe { self.try_rewind(snapshot) } {
            crate::contract_violation!("{} allocator {} rejected rewind: {e}", self.kind(), self.id());
        }
    }

    /// Clear logical content, keeping every buffer for reuse
    ///
    /// # Safety
    ///
    /// Every block handed out so far is reused by later allocations; nothing
    /// may still point into this allocator.
    unsafe fn reset(&self);

    /// Release every buffer. Idempotent.
    ///
    /// # Safety
    ///
    /// The buffers are freed; nothing may still point into this allocator.
    unsafe fn cleanup(&self);

    /// Write a human-readable dump of the allocator state
    fn write_content(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Emit [`write_content`](Allocator::write_content) through the log
    fn display_content(&self) {
        let mut out = String::new();
        if self.write_content(&mut out).is_err() {
            return;
        }

        #[cfg(feature = "logging")]
        sl_log::info!(kind = %self.kind(), id = %self.id(), "\n{out}");

        #[cfg(not(feature = "logging"))]
        eprint!("{out}");
    }
}

/// Memory usage reporting
pub trait MemoryUsage {
    /// Bytes handed out since the last reset
    fn used_memory(&self) -> usize;

    /// Bytes currently backed by owned buffers
    fn total_memory(&self) -> usize;

    /// Bytes still available without growing
    fn available_memory(&self) -> usize {
        self.total_memory().saturating_sub(self.used_memory())
    }
}

/// Typed helpers on top of the byte-level contract.
///
/// Values placed through these helpers are never dropped; the allocator only
/// ever hands back raw storage.
pub trait AllocatorExt: Allocator {
    /// Allocate storage for `layout`
    #[inline]
    fn allocate_layout(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.allocate_aligned(layout.size(), layout.align())
    }

    /// Move `value` into allocator memory
    fn alloc_value<T>(&self, value: T) -> Option<NonNull<T>> {
        let ptr = self.allocate_layout(Layout::new::<T>())?.cast::<T>();
        // SAFETY: the block is sized and aligned for `T` and unaliased.
        unsafe { ptr.as_ptr().write(value) };
        Some(ptr)
    }

    /// Copy a slice into allocator memory
    fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Option<NonNull<[T]>> {
        let layout = Layout::for_value(src);
        let ptr = self.allocate_layout(layout)?.cast::<T>();
        // SAFETY: the block holds `src.len()` elements of `T` and cannot
        // overlap the borrowed source.
        unsafe { core::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len()) };
        Some(NonNull::slice_from_raw_parts(ptr, src.len()))
    }

    /// Copy a string into allocator memory
    fn alloc_str(&self, src: &str) -> Option<NonNull<str>> {
        let bytes = self.alloc_slice_copy(src.as_bytes())?;
        // SAFETY: the bytes were copied from a valid `str`.
        Some(unsafe { NonNull::new_unchecked(bytes.as_ptr() as *mut str) })
    }
}

impl<A: Allocator + ?Sized> AllocatorExt for A {}

//! Per-thread global allocator and the `temp_*` façade
//!
//! Each thread owns one allocator, created lazily as an [`ArenaAllocator`]
//! with the configured global region size. The `temp_*` functions are
//! shorthands for scratch allocations against it:
//!
//! ```
//! use sl_memory::global::{temp_alloc, temp_begin, temp_end};
//!
//! let mark = temp_begin();
//! let scratch = temp_alloc(256).expect("global arena grows on demand");
//! # let _ = scratch;
//! // SAFETY: `scratch` is not used past this point.
//! unsafe { temp_end(&mark) };
//! ```
//!
//! The global allocator is shared by everything on the thread, so the
//! functions that reclaim its storage are `unsafe`: the caller vouches that
//! nothing allocated from it is still in use.

use core::cell::RefCell;
use core::ptr::NonNull;
use std::rc::Rc;

#[cfg(feature = "logging")]
use sl_log::debug;

use crate::allocator::{Allocator, ArenaAllocator, Snapshot};
use crate::config;
use crate::utils::memory_duplicate;

thread_local! {
    static GLOBAL: RefCell<Option<Rc<dyn Allocator>>> = const { RefCell::new(None) };
}

fn default_allocator() -> Rc<dyn Allocator> {
    let region_size = config::current().global_region_size;
    #[cfg(feature = "logging")]
    debug!(region_size, "creating thread global arena");
    Rc::new(ArenaAllocator::new(region_size))
}

/// The calling thread's global allocator, created on first access
pub fn global_allocator() -> Rc<dyn Allocator> {
    GLOBAL.with(|slot| Rc::clone(slot.borrow_mut().get_or_insert_with(default_allocator)))
}

/// Run `f` against the calling thread's global allocator
pub fn with_global_allocator<R>(f: impl FnOnce(&dyn Allocator) -> R) -> R {
    let allocator = global_allocator();
    f(&*allocator)
}

/// Install `allocator` as the thread's global allocator.
///
/// The previous allocator is cleaned up first, unless it is the same
/// instance.
///
/// # Safety
///
/// Nothing allocated from the previous global allocator may be used
/// afterwards.
pub unsafe fn set_global_allocator(allocator: Rc<dyn Allocator>) {
    let previous = GLOBAL.with(|slot| slot.borrow_mut().take());
    if let Some(previous) = previous
        && !Rc::ptr_eq(&previous, &allocator)
    {
        #[cfg(feature = "logging")]
        debug!(
            old = %previous.id(),
            new = %allocator.id(),
            "replacing thread global allocator"
        );
        // SAFETY: forwarded from the caller.
        unsafe { previous.cleanup() };
    }
    GLOBAL.with(|slot| *slot.borrow_mut() = Some(allocator));
}

/// Release every buffer of the thread's global allocator.
///
/// The allocator stays installed and rebuilds its buffers on the next
/// allocation. Nothing is created when no global allocator exists yet.
///
/// # Safety
///
/// Nothing allocated from the global allocator may be used afterwards.
pub unsafe fn cleanup_global_allocator() {
    let current = GLOBAL.with(|slot| slot.borrow().clone());
    if let Some(allocator) = current {
        // SAFETY: forwarded from the caller.
        unsafe { allocator.cleanup() };
    }
}

/// Allocate `size` bytes with the configured default alignment
pub fn temp_alloc(size: usize) -> Option<NonNull<u8>> {
    temp_alloc_aligned(size, config::current().default_alignment)
}

/// Allocate `size` bytes aligned to `alignment`
pub fn temp_alloc_aligned(size: usize, alignment: usize) -> Option<NonNull<u8>> {
    with_global_allocator(|a| a.allocate_aligned(size, alignment))
}

/// Copy `bytes` into the global allocator, NUL-terminated
pub fn temp_copy(bytes: &[u8]) -> Option<NonNull<u8>> {
    with_global_allocator(|a| memory_duplicate(a, bytes))
}

/// Mark the current position of the global allocator
pub fn temp_begin() -> Snapshot {
    with_global_allocator(|a| a.snapshot())
}

/// Return the global allocator to `snapshot`.
///
/// # Safety
///
/// Nothing allocated from the global allocator after `snapshot` may be used
/// afterwards.
///
/// # Panics
///
/// When `snapshot` was not produced by the current global allocator.
pub unsafe fn temp_end(snapshot: &Snapshot) {
    // SAFETY: forwarded from the caller.
    with_global_allocator(|a| unsafe { a.rewind(snapshot) });
}

/// Reset the global allocator, keeping its buffers
///
/// # Safety
///
/// Nothing allocated from the global allocator may be used afterwards.
pub unsafe fn temp_reset() {
    // SAFETY: forwarded from the caller.
    with_global_allocator(|a| unsafe { a.reset() });
}

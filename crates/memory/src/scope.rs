//! RAII scoping for allocator positions

use core::fmt;
use std::rc::Rc;

use crate::allocator::{Allocator, Snapshot};
use crate::global::global_allocator;

enum Target<'a> {
    Borrowed(&'a dyn Allocator),
    Global(Rc<dyn Allocator>),
}

/// Guard that snapshots an allocator on creation and rewinds it on drop.
///
/// The guard borrows the allocator exclusively: everything allocated inside
/// the scope goes through [`allocator`](ScopedAllocator::allocator), whose
/// borrow ends before the rewind.
///
/// # Examples
///
/// ```
/// use sl_memory::allocator::{Allocator, LinearAllocator};
/// use sl_memory::scope::ScopedAllocator;
///
/// let mut linear = LinearAllocator::new(1024);
/// {
///     let scope = ScopedAllocator::new(&mut linear);
///     scope.allocator().allocate(128).expect("fits");
/// }
/// assert_eq!(linear.cursor(), 0);
/// ```
///
/// A container built inside the scope cannot outlive it:
///
/// ```compile_fail,E0505
/// use sl_memory::allocator::ArenaAllocator;
/// use sl_memory::collections::HashMap;
/// use sl_memory::scope::ScopedAllocator;
///
/// let mut arena = ArenaAllocator::new(4096);
/// let scope = ScopedAllocator::new(&mut arena);
/// let mut map = HashMap::with_allocator(scope.allocator());
/// map.insert(1_u32, 10_u32);
/// drop(scope);
/// assert_eq!(map.get(&1), Some(&10));
/// ```
#[must_use = "ScopedAllocator rewinds as soon as it is dropped"]
pub struct ScopedAllocator<'a> {
    target: Target<'a>,
    snapshot: Snapshot,
}

impl<'a> ScopedAllocator<'a> {
    /// Scope over an explicit allocator
    pub fn new(allocator: &'a mut dyn Allocator) -> Self {
        Self {
            snapshot: allocator.snapshot(),
            target: Target::Borrowed(allocator),
        }
    }

    /// Scope over the calling thread's global allocator.
    ///
    /// The allocator is held by the guard, so swapping the global allocator
    /// while the scope is open does not redirect the rewind.
    ///
    /// # Safety
    ///
    /// The global allocator is shared. Nothing allocated from it while the
    /// scope is open, through the scope or through
    /// [`global_allocator`], may be used after the scope closes.
    pub unsafe fn global() -> ScopedAllocator<'static> {
        let allocator = global_allocator();
        ScopedAllocator {
            snapshot: allocator.snapshot(),
            target: Target::Global(allocator),
        }
    }

    /// Open an inner scope that closes before this one
    pub fn nested(&mut self) -> ScopedAllocator<'_> {
        let allocator = self.allocator();
        ScopedAllocator {
            snapshot: allocator.snapshot(),
            target: Target::Borrowed(allocator),
        }
    }

    /// Allocator this scope rewinds
    pub fn allocator(&self) -> &dyn Allocator {
        match &self.target {
            Target::Borrowed(a) => *a,
            Target::Global(a) => &**a,
        }
    }

    /// Position restored on drop
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Close the scope now
    pub fn end(self) {
        drop(self);
    }
}

impl Drop for ScopedAllocator<'_> {
    fn drop(&mut self) {
        // SAFETY: borrows handed out by `allocator()` end before the guard
        // drops; the global target relies on the contract of `global()`.
        if std::thread::panicking() {
            // A second panic would abort; the unwinding error wins.
            let _ = unsafe { self.allocator().try_rewind(&self.snapshot) };
        } else {
            unsafe { self.allocator().rewind(&self.snapshot) };
        }
    }
}

impl fmt::Debug for ScopedAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedAllocator")
            .field("allocator", &self.allocator().id())
            .field("global", &matches!(self.target, Target::Global(_)))
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{ArenaAllocator, LinearAllocator, MemoryUsage, PoolAllocator};
    use crate::global::{cleanup_global_allocator, set_global_allocator};

    #[test]
    fn test_nested_scopes() {
        let mut arena = ArenaAllocator::new(64);
        arena.allocate(8).expect("fits");
        {
            let mut outer = ScopedAllocator::new(&mut arena);
            outer.allocator().allocate(40).expect("fits");
            let outer_mark = outer.allocator().snapshot();
            {
                let inner = outer.nested();
                inner.allocator().allocate(100).expect("new region");
                assert_ne!(inner.allocator().snapshot(), outer_mark);
            }
            assert_eq!(outer.allocator().snapshot(), outer_mark);
        }
        assert_eq!(arena.used_memory(), 8);
        assert_eq!(arena.region_count(), 2);
        assert_eq!(arena.current_region_index(), 0);
    }

    #[test]
    fn test_end_rewinds_once() {
        let mut pool = PoolAllocator::new(4, 16).expect("valid");
        let scope = ScopedAllocator::new(&mut pool);
        scope.allocator().allocate(16).expect("chunk");
        scope.end();
        assert_eq!(pool.free_chunks(), 4);

        // A later allocation is not undone by the ended scope.
        pool.allocate(16).expect("chunk");
        assert_eq!(pool.free_chunks(), 3);
    }

    #[test]
    fn test_global_scope_survives_cleanup() {
        let linear = Rc::new(LinearAllocator::new(64));
        // SAFETY: nothing points into the previous global allocator.
        unsafe { set_global_allocator(linear.clone()) };
        {
            // SAFETY: the block is never used.
            let scope = unsafe { ScopedAllocator::global() };
            scope.allocator().allocate(32).expect("fits");
            // SAFETY: as above.
            unsafe { cleanup_global_allocator() };
        }
        assert!(!linear.is_materialized());
    }

    #[test]
    fn test_global_scope_holds_its_allocator() {
        let first = Rc::new(LinearAllocator::new(64));
        // SAFETY: nothing points into the previous global allocator.
        unsafe { set_global_allocator(first.clone()) };
        first.allocate(8).expect("fits");

        // SAFETY: the scoped block is never used after the scope.
        let scope = unsafe { ScopedAllocator::global() };
        scope.allocator().allocate(16).expect("fits");
        assert_eq!(scope.allocator().id(), first.id());
        drop(scope);
        assert_eq!(first.cursor(), 8);
    }

    #[test]
    fn test_panicking_scope_does_not_double_panic() {
        let mut linear = LinearAllocator::new(64);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let scope = ScopedAllocator::new(&mut linear);
            scope.allocator().allocate(16).expect("fits");
            panic!("work failed");
        }));
        assert!(result.is_err());
        assert_eq!(linear.cursor(), 0);
    }
}

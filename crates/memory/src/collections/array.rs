//! Growable array over an optional region allocator
//!
//! Storage comes from the borrowed [`Allocator`] when one is given, and from
//! the global heap otherwise. Heap storage is released on growth and drop;
//! allocator storage is abandoned to the allocator, which reclaims it on
//! rewind, reset or cleanup.

use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};
use core::slice;
use std::alloc;

use crate::allocator::{Allocator, AllocatorExt};
use crate::error::{MemoryError, MemoryResult};

/// Capacity of the first block
pub const ARRAY_INITIAL_CAPACITY: usize = 32;

/// Growable array; capacity doubles on growth
pub struct Array<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    cap: usize,
    allocator: Option<&'a dyn Allocator>,
    _marker: PhantomData<T>,
}

impl<T> Array<'static, T> {
    /// Empty heap-backed array; nothing is allocated until the first push
    pub const fn new() -> Self {
        Self::empty(None)
    }

    /// Heap-backed array with room for `capacity` elements
    pub fn with_capacity(capacity: usize) -> MemoryResult<Self> {
        let mut array = Self::new();
        array.try_reserve(capacity)?;
        Ok(array)
    }
}

impl<'a, T> Array<'a, T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    pub(crate) const fn empty(allocator: Option<&'a dyn Allocator>) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: if Self::IS_ZST { usize::MAX } else { 0 },
            allocator,
            _marker: PhantomData,
        }
    }

    /// Empty array drawing storage from `allocator`
    pub fn with_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::empty(Some(allocator))
    }

    /// Array with room for `capacity` elements, from `allocator` or the heap
    pub fn with_capacity_in(
        capacity: usize,
        allocator: Option<&'a dyn Allocator>,
    ) -> MemoryResult<Self> {
        let mut array = Self::empty(allocator);
        array.try_reserve(capacity)?;
        Ok(array)
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Alias of [`len`](Self::len)
    #[inline]
    pub fn count(&self) -> usize {
        self.len
    }

    /// Elements that fit without growing
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing allocator, `None` for heap storage
    pub fn allocator(&self) -> Option<&'a dyn Allocator> {
        self.allocator
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is valid for `len` initialized elements (or dangling
        // and well-aligned when `len == 0`).
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in `as_slice`, and `&mut self` guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Make room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// When storage cannot be obtained.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.try_reserve(additional) {
            crate::contract_violation!("array reserve of {additional} failed: {e}");
        }
    }

    /// Make room for at least `additional` more elements
    pub fn try_reserve(&mut self, additional: usize) -> MemoryResult<()> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or_else(|| MemoryError::size_overflow("array capacity"))?;
        if required <= self.cap {
            return Ok(());
        }
        let doubled = self.cap.saturating_mul(2).max(ARRAY_INITIAL_CAPACITY);
        self.grow_to(required.max(doubled))
    }

    /// Make room for exactly `additional` more elements, without doubling
    pub fn try_reserve_exact(&mut self, additional: usize) -> MemoryResult<()> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or_else(|| MemoryError::size_overflow("array capacity"))?;
        if required <= self.cap {
            return Ok(());
        }
        self.grow_to(required)
    }

    fn grow_to(&mut self, new_cap: usize) -> MemoryResult<()> {
        debug_assert!(!Self::IS_ZST);
        let layout =
            Layout::array::<T>(new_cap).map_err(|_| MemoryError::size_overflow("array layout"))?;
        let new_ptr = self.allocate_block(layout)?;

        if self.len > 0 {
            // SAFETY: both blocks hold at least `len` elements and are distinct.
            unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len) };
        }
        self.release_storage();
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    fn allocate_block(&self, layout: Layout) -> MemoryResult<NonNull<T>> {
        let block = match self.allocator {
            Some(allocator) => allocator.allocate_layout(layout),
            // SAFETY: `layout` is non-zero sized because `T` is not a ZST and
            // `new_cap >= 1`.
            None => NonNull::new(unsafe { alloc::alloc(layout) }),
        };
        block
            .map(NonNull::cast)
            .ok_or_else(|| MemoryError::allocation_failed(layout.size(), layout.align()))
    }

    /// Free heap storage; allocator storage is left to its allocator
    fn release_storage(&mut self) {
        if Self::IS_ZST || self.cap == 0 {
            return;
        }
        if self.allocator.is_none() {
            // SAFETY: heap storage was allocated in `allocate_block` with this
            // exact layout, which was valid at the time.
            unsafe {
                let layout = Layout::array::<T>(self.cap).unwrap_unchecked();
                alloc::dealloc(self.ptr.as_ptr().cast(), layout);
            }
        }
        self.ptr = NonNull::dangling();
        self.cap = 0;
    }

    /// Append `value`.
    ///
    /// # Panics
    ///
    /// When storage cannot be obtained.
    pub fn push(&mut self, value: T) {
        if let Err(e) = self.try_push(value) {
            crate::contract_violation!("array push failed: {e}");
        }
    }

    /// Append `value`, reporting storage failure
    pub fn try_push(&mut self, value: T) -> MemoryResult<()> {
        if self.len == self.cap {
            self.try_reserve(1)?;
        }
        // SAFETY: `len < cap`, so the slot is inside the block and unused.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the element at the old `len - 1` is initialized and is now
        // outside the live range, so it is read exactly once.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Remove the element at `index`, moving the last element into its place
    pub fn swap_remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let last = self.len - 1;
        self.as_mut_slice().swap(index, last);
        self.pop()
    }

    pub fn position(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.as_slice().iter().position(|v| v == value)
    }

    pub fn rposition(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.as_slice().iter().rposition(|v| v == value)
    }

    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.as_slice().contains(value)
    }

    pub fn reverse(&mut self) {
        self.as_mut_slice().reverse();
    }

    /// Drop every element, keeping capacity
    pub fn clear(&mut self) {
        let elements: *mut [T] = self.as_mut_slice();
        self.len = 0;
        // SAFETY: the elements were initialized and are no longer reachable.
        unsafe { ptr::drop_in_place(elements) };
    }

    /// Drop every element and release storage
    pub fn cleanup(&mut self) {
        self.clear();
        self.release_storage();
        if Self::IS_ZST {
            self.cap = usize::MAX;
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: Clone> Array<'_, T> {
    /// Append clones of every element in `items`
    pub fn extend_from_slice(&mut self, items: &[T]) {
        self.reserve(items.len());
        for item in items {
            self.push(item.clone());
        }
    }
}

impl<T> Default for Array<'static, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Array<'_, T> {
    fn drop(&mut self) {
        self.clear();
        self.release_storage();
    }
}

impl<'s, T> IntoIterator for &'s Array<'_, T> {
    type Item = &'s T;
    type IntoIter = slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, T> IntoIterator for &'s mut Array<'_, T> {
    type Item = &'s mut T;
    type IntoIter = slice::IterMut<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> core::ops::Index<usize> for Array<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T> core::ops::IndexMut<usize> for Array<'_, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<T: fmt::Debug> fmt::Debug for Array<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

//! RAII-based stack frame for automatic restoration

use super::StackAllocator;
use crate::allocator::{Allocator, Snapshot};

/// Scoped region of a [`StackAllocator`].
///
/// Everything allocated through the frame's allocator after the frame was
/// opened is released when the frame drops. The frame borrows the stack
/// exclusively, so nothing allocated inside it can outlive the rewind.
///
/// ```compile_fail,E0505
/// use sl_memory::allocator::StackAllocator;
/// use sl_memory::collections::Array;
///
/// let mut stack = StackAllocator::new(1024);
/// let frame = stack.frame();
/// let mut escaped = Array::with_allocator(frame.allocator());
/// escaped.push(7_u32);
/// drop(frame); // the frame rewinds while `escaped` still borrows it
/// assert_eq!(escaped[0], 7);
/// ```
#[must_use = "StackFrame rewinds as soon as it is dropped"]
pub struct StackFrame<'a> {
    allocator: &'a mut StackAllocator,
    snapshot: Snapshot,
}

impl<'a> StackFrame<'a> {
    /// Open a frame at the current cursor
    pub fn new(allocator: &'a mut StackAllocator) -> Self {
        let snapshot = allocator.snapshot();
        Self { allocator, snapshot }
    }

    /// Gets the underlying allocator
    pub fn allocator(&self) -> &StackAllocator {
        self.allocator
    }

    /// Open a nested frame that closes before this one
    pub fn frame(&mut self) -> StackFrame<'_> {
        StackFrame::new(self.allocator)
    }

    /// Close the frame now
    pub fn restore(self) {
        drop(self);
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            // SAFETY: borrowers of the frame ended before it drops.
            let _ = unsafe { self.allocator.try_rewind(&self.snapshot) };
        } else {
            // SAFETY: as above.
            unsafe { self.allocator.rewind(&self.snapshot) };
        }
    }
}

//! Stack allocator
//!
//! Bump allocation tracked by a cursor *address* inside `[begin, end)`.
//! Snapshots carry that address, so a rewind can be validated against the
//! owning buffer. LIFO release order is a caller convention, helped by
//! [`StackFrame`].
//!
//! ```text
//! [begin]----[alloc1]----[alloc2]----[current]----[free]----[end]
//! ```

mod frame;

pub use frame::StackFrame;

use core::cell::{Cell, RefCell};
use core::fmt;
use core::ptr::NonNull;

#[cfg(feature = "logging")]
use sl_log::debug;

use super::{
    Allocator, AllocatorId, AllocatorKind, MemoryUsage, Snapshot, SnapshotPosition, round_request,
};
use crate::config::{self, MemoryConfig};
use crate::core::OwnedBuffer;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::padding_for;

/// Stack allocator over one fixed buffer
pub struct StackAllocator {
    id: AllocatorId,
    total_size: usize,
    buffer: RefCell<Option<OwnedBuffer>>,
    /// Cursor address; meaningful only while `buffer` is `Some`
    current: Cell<usize>,
}

impl StackAllocator {
    /// Create an allocator that reserves `total_size` bytes on first use.
    ///
    /// A size of `0` picks the process default global region size.
    pub fn new(total_size: usize) -> Self {
        let total_size = if total_size == 0 {
            config::current().global_region_size
        } else {
            total_size
        };
        Self {
            id: AllocatorId::next(),
            total_size,
            buffer: RefCell::new(None),
            current: Cell::new(0),
        }
    }

    /// Create an allocator sized from configuration
    pub fn with_config(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self::new(config.allocator_initial_size))
    }

    /// Buffer size
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// `[begin, end)` of the buffer, if materialized
    pub fn bounds(&self) -> Option<core::ops::Range<usize>> {
        self.buffer.borrow().as_ref().map(OwnedBuffer::range)
    }

    /// Current cursor address, if materialized
    pub fn current(&self) -> Option<usize> {
        self.buffer.borrow().as_ref().map(|_| self.current.get())
    }

    /// Open a frame that rewinds this allocator when dropped
    pub fn frame(&mut self) -> StackFrame<'_> {
        StackFrame::new(self)
    }

    fn materialize(&self) -> MemoryResult<NonNull<u8>> {
        let mut slot = self.buffer.borrow_mut();
        if let Some(buffer) = slot.as_ref() {
            return Ok(buffer.as_ptr());
        }

        let buffer = OwnedBuffer::new(self.total_size)?;
        #[cfg(feature = "logging")]
        debug!(id = %self.id, size = self.total_size, "stack allocator materialized");

        let base = buffer.as_ptr();
        self.current.set(buffer.addr());
        *slot = Some(buffer);
        Ok(base)
    }
}

impl Allocator for StackAllocator {
    fn id(&self) -> AllocatorId {
        self.id
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Stack
    }

    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let size = round_request(size, alignment)?;
        let base = self.materialize().ok()?;
        let begin = base.as_ptr() as usize;
        let end = begin + self.total_size;

        let current = self.current.get();
        let start = current.checked_add(padding_for(current, alignment))?;
        let next = start.checked_add(size)?;
        if next > end {
            return None;
        }

        self.current.set(next);
        // SAFETY: `begin <= start` and `start + size <= end`, so the offset
        // stays inside the live buffer.
        Some(unsafe { base.add(start - begin) })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.id,
            SnapshotPosition::Stack {
                cursor: self.current(),
            },
        )
    }

    unsafe fn try_rewind(&self, snapshot: &Snapshot) -> MemoryResult<()> {
        let SnapshotPosition::Stack { cursor } = snapshot.verify(self.id, self.kind())? else {
            return Err(MemoryError::snapshot_kind_mismatch(self.kind(), snapshot.kind()));
        };
        let Some(bounds) = self.bounds() else {
            return Ok(());
        };

        match cursor {
            // Captured before first use: rewind to empty.
            None => self.current.set(bounds.start),
            Some(addr) if (bounds.start..=bounds.end).contains(&addr) => self.current.set(addr),
            Some(addr) => {
                return Err(MemoryError::snapshot_out_of_range(format!(
                    "cursor {addr:#x} outside [{:#x}, {:#x}]",
                    bounds.start, bounds.end
                )));
            }
        }
        Ok(())
    }

    unsafe fn reset(&self) {
        if let Some(bounds) = self.bounds() {
            self.current.set(bounds.start);
        }
    }

    unsafe fn cleanup(&self) {
        self.buffer.borrow_mut().take();
        self.current.set(0);
    }

    fn write_content(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let (begin, end) = self.bounds().map_or((0, 0), |r| (r.start, r.end));
        writeln!(out, "|---------------------")?;
        writeln!(out, "|Stack allocator {}:", self.id)?;
        writeln!(out, "|---------------------")?;
        writeln!(out, "|  current: {:#x}", self.current.get())?;
        writeln!(out, "|  begin: {begin:#x}")?;
        writeln!(out, "|  end: {end:#x}")?;
        writeln!(out, "|---------------------")
    }
}

impl MemoryUsage for StackAllocator {
    fn used_memory(&self) -> usize {
        self.bounds().map_or(0, |r| self.current.get() - r.start)
    }

    fn total_memory(&self) -> usize {
        self.bounds().map_or(0, |r| r.len())
    }
}

impl fmt::Debug for StackAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAllocator")
            .field("id", &self.id)
            .field("total_size", &self.total_size)
            .field("used", &self.used_memory())
            .finish()
    }
}

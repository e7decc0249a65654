//! Linear (bump) allocator
//!
//! ```text
//! [base]----[alloc1]----[alloc2]----[cursor]----[free]----[total_size]
//!            <------ allocated ------>          <-- available -->
//! ```
//!
//! The buffer is created on first use and never grows afterwards.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::ptr::NonNull;

#[cfg(feature = "logging")]
use sl_log::{debug, trace};

use super::{
    Allocator, AllocatorId, AllocatorKind, MemoryUsage, Snapshot, SnapshotPosition, round_request,
};
use crate::config::{self, MemoryConfig};
use crate::core::{BUFFER_ALIGN, OwnedBuffer};
use crate::error::{MemoryError, MemoryResult};
use crate::utils::padding_for;

/// Bump allocator over one lazily created buffer
pub struct LinearAllocator {
    id: AllocatorId,
    configured_size: usize,
    total_size: Cell<usize>,
    cursor: Cell<usize>,
    buffer: RefCell<Option<OwnedBuffer>>,
}

impl LinearAllocator {
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
            configured_size: total_size,
            total_size: Cell::new(total_size),
            cursor: Cell::new(0),
            buffer: RefCell::new(None),
        }
    }

    /// Create an allocator sized from configuration
    pub fn with_config(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self::new(config.allocator_initial_size))
    }

    /// Current cursor offset
    pub fn cursor(&self) -> usize {
        self.cursor.get()
    }

    /// Buffer size (grows to the first request when that request is larger)
    pub fn total_size(&self) -> usize {
        self.total_size.get()
    }

    /// Whether the backing buffer exists
    pub fn is_materialized(&self) -> bool {
        self.buffer.borrow().is_some()
    }

    fn materialize(&self, first_request: usize, alignment: usize) -> MemoryResult<NonNull<u8>> {
        let mut slot = self.buffer.borrow_mut();
        if let Some(buffer) = slot.as_ref() {
            return Ok(buffer.as_ptr());
        }

        // Over-aligned first requests need room to pad the base address.
        let slack = alignment.saturating_sub(BUFFER_ALIGN);
        let needed = first_request
            .checked_add(slack)
            .ok_or_else(|| MemoryError::size_overflow("linear buffer size"))?;
        let size = self.total_size.get().max(needed);
        let buffer = OwnedBuffer::new(size)?;

        #[cfg(feature = "logging")]
        debug!(id = %self.id, size, "linear allocator materialized");

        self.total_size.set(size);
        let base = buffer.as_ptr();
        *slot = Some(buffer);
        Ok(base)
    }
}

impl Allocator for LinearAllocator {
    fn id(&self) -> AllocatorId {
        self.id
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Linear
    }

    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let size = round_request(size, alignment)?;
        let base = self.materialize(size, alignment).ok()?;

        let cursor = self.cursor.get();
        crate::ensure_contract!(
            cursor <= self.total_size.get(),
            "linear cursor went past total size"
        );

        let start = cursor + padding_for(base.as_ptr() as usize + cursor, alignment);
        let end = start.checked_add(size)?;
        if end > self.total_size.get() {
            #[cfg(feature = "logging")]
            trace!(id = %self.id, size, cursor, "linear allocator exhausted");
            return None;
        }

        self.cursor.set(end);
        // SAFETY: `start + size <= total_size`, the length of the live buffer.
        Some(unsafe { base.add(start) })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.id,
            SnapshotPosition::Linear {
                offset: self.cursor.get(),
            },
        )
    }

    unsafe fn try_rewind(&self, snapshot: &Snapshot) -> MemoryResult<()> {
        let SnapshotPosition::Linear { offset } = snapshot.verify(self.id, self.kind())? else {
            return Err(MemoryError::snapshot_kind_mismatch(self.kind(), snapshot.kind()));
        };

        // Nothing to restore once the buffer is gone; the next allocation starts fresh.
        if !self.is_materialized() {
            return Ok(());
        }
        if offset > self.total_size.get() {
            return Err(MemoryError::snapshot_out_of_range(format!(
                "offset {offset} past total size {}",
                self.total_size.get()
            )));
        }

        self.cursor.set(offset);
        Ok(())
    }

    unsafe fn reset(&self) {
        self.cursor.set(0);
    }

    unsafe fn cleanup(&self) {
        self.buffer.borrow_mut().take();
        self.cursor.set(0);
        self.total_size.set(self.configured_size);
    }

    fn write_content(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "|---------------------")?;
        writeln!(out, "|Linear allocator {}:", self.id)?;
        writeln!(out, "|---------------------")?;
        writeln!(out, "|  capacity: {}", self.total_size.get())?;
        writeln!(out, "|  cursor: {}", self.cursor.get())?;
        writeln!(out, "|---------------------")
    }
}

impl MemoryUsage for LinearAllocator {
    fn used_memory(&self) -> usize {
        self.cursor.get()
    }

    fn total_memory(&self) -> usize {
        self.buffer.borrow().as_ref().map_or(0, OwnedBuffer::capacity)
    }
}

impl fmt::Debug for LinearAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearAllocator")
            .field("id", &self.id)
            .field("cursor", &self.cursor.get())
            .field("total_size", &self.total_size.get())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

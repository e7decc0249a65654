//! Pool allocator for fixed-size chunks
//!
//! The buffer is carved into `chunk_count` chunks of `chunk_size` bytes.
//! Free chunks are threaded through an index list kept beside the buffer,
//! so chunk memory never stores list links.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::ptr::NonNull;

#[cfg(feature = "logging")]
use sl_log::{debug, trace};

use super::{
    Allocator, AllocatorId, AllocatorKind, DEFAULT_ALIGNMENT, MemoryUsage, Snapshot,
    SnapshotPosition, round_request,
};
use crate::config::MemoryConfig;
use crate::core::OwnedBuffer;
use crate::error::{MemoryError, MemoryResult};
use crate::utils::{align_up, is_aligned};

/// Fixed-size chunk allocator with a free list
pub struct PoolAllocator {
    id: AllocatorId,
    chunk_count: usize,
    chunk_size: usize,
    buffer: RefCell<Option<OwnedBuffer>>,
    /// `next[i]` is the free chunk following chunk `i`
    next: RefCell<Vec<Option<usize>>>,
    head: Cell<Option<usize>>,
}

impl PoolAllocator {
    /// Create a pool of `chunk_count` chunks of `chunk_size` bytes each.
    ///
    /// `chunk_size` is rounded up to a machine word.
    pub fn new(chunk_count: usize, chunk_size: usize) -> MemoryResult<Self> {
        if chunk_count == 0 {
            return Err(MemoryError::invalid_config("pool chunk count must be non-zero"));
        }
        if chunk_size == 0 {
            return Err(MemoryError::invalid_config("pool chunk size must be non-zero"));
        }

        let chunk_size = align_up(chunk_size, DEFAULT_ALIGNMENT);
        chunk_count
            .checked_mul(chunk_size)
            .ok_or_else(|| MemoryError::size_overflow("pool buffer size"))?;

        Ok(Self {
            id: AllocatorId::next(),
            chunk_count,
            chunk_size,
            buffer: RefCell::new(None),
            next: RefCell::new(Vec::new()),
            head: Cell::new(Some(0)),
        })
    }

    /// Create a pool sized from configuration
    pub fn with_config(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        Self::new(config.pool_chunk_count, config.pool_chunk_size)
    }

    /// Size of one chunk after rounding
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Chunks still on the free list
    pub fn free_chunks(&self) -> usize {
        if !self.is_materialized() {
            return self.chunk_count;
        }
        let next = self.next.borrow();
        let mut count = 0;
        let mut cursor = self.head.get();
        while let Some(i) = cursor {
            count += 1;
            cursor = next[i];
        }
        count
    }

    /// Whether the backing buffer exists
    pub fn is_materialized(&self) -> bool {
        self.buffer.borrow().is_some()
    }

    fn thread_free_list(&self) {
        let mut next = self.next.borrow_mut();
        next.clear();
        next.extend((1..=self.chunk_count).map(|i| (i < self.chunk_count).then_some(i)));
        self.head.set(Some(0));
    }

    fn materialize(&self) -> MemoryResult<NonNull<u8>> {
        let mut slot = self.buffer.borrow_mut();
        if let Some(buffer) = slot.as_ref() {
            return Ok(buffer.as_ptr());
        }

        let buffer = OwnedBuffer::new(self.chunk_count * self.chunk_size)?;
        #[cfg(feature = "logging")]
        debug!(
            id = %self.id,
            chunk_count = self.chunk_count,
            chunk_size = self.chunk_size,
            "pool allocator materialized"
        );

        let base = buffer.as_ptr();
        *slot = Some(buffer);
        drop(slot);
        self.thread_free_list();
        Ok(base)
    }
}

impl Allocator for PoolAllocator {
    fn id(&self) -> AllocatorId {
        self.id
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Pool
    }

    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let size = round_request(size, alignment)?;
        crate::debug_ensure_contract!(
            size <= self.chunk_size,
            "request of {size} bytes exceeds pool chunk size {}",
            self.chunk_size
        );
        if size > self.chunk_size {
            return None;
        }

        let base = self.materialize().ok()?;
        let Some(index) = self.head.get() else {
            #[cfg(feature = "logging")]
            trace!(id = %self.id, "pool allocator exhausted");
            return None;
        };

        // SAFETY: `index < chunk_count`, so the chunk lies inside the buffer.
        let chunk = unsafe { base.add(index * self.chunk_size) };
        if !is_aligned(chunk.as_ptr() as usize, alignment) {
            return None;
        }

        self.head.set(self.next.borrow()[index]);
        Some(chunk)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.id,
            SnapshotPosition::Pool {
                free_head: self.head.get(),
            },
        )
    }

    unsafe fn try_rewind(&self, snapshot: &Snapshot) -> MemoryResult<()> {
        let SnapshotPosition::Pool { free_head } = snapshot.verify(self.id, self.kind())? else {
            return Err(MemoryError::snapshot_kind_mismatch(self.kind(), snapshot.kind()));
        };
        if let Some(index) = free_head
            && index >= self.chunk_count
        {
            return Err(MemoryError::snapshot_out_of_range(format!(
                "free-list head {index} past chunk count {}",
                self.chunk_count
            )));
        }
        if !self.is_materialized() {
            return Ok(());
        }

        self.head.set(free_head);
        Ok(())
    }

    unsafe fn reset(&self) {
        if self.is_materialized() {
            self.thread_free_list();
        }
    }

    unsafe fn cleanup(&self) {
        self.buffer.borrow_mut().take();
        let mut next = self.next.borrow_mut();
        next.clear();
        next.shrink_to_fit();
        self.head.set(Some(0));
    }

    fn write_content(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "|---------------------")?;
        writeln!(out, "|Pool allocator {}:", self.id)?;
        writeln!(out, "|---------------------")?;
        writeln!(out, "|  chunk size: {}", self.chunk_size)?;
        writeln!(out, "|  chunk count: {}", self.chunk_count)?;
        writeln!(out, "|  free chunks: {}", self.free_chunks())?;
        writeln!(out, "|---------------------")
    }
}

impl MemoryUsage for PoolAllocator {
    fn used_memory(&self) -> usize {
        if !self.is_materialized() {
            return 0;
        }
        (self.chunk_count - self.free_chunks()) * self.chunk_size
    }

    fn total_memory(&self) -> usize {
        self.buffer.borrow().as_ref().map_or(0, OwnedBuffer::capacity)
    }
}

impl fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("id", &self.id)
            .field("chunk_count", &self.chunk_count)
            .field("chunk_size", &self.chunk_size)
            .field("free_head", &self.head.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_construction() {
        assert_eq!(
            PoolAllocator::new(0, 16).expect_err("zero count").code(),
            "MEM:CONFIG:INVALID"
        );
        assert!(PoolAllocator::new(4, 0).is_err());
        assert!(PoolAllocator::new(usize::MAX, 64).is_err());
    }

    #[test]
    fn test_chunk_size_rounded_to_word() {
        let pool = PoolAllocator::new(4, 5).expect("valid");
        assert_eq!(pool.chunk_size(), DEFAULT_ALIGNMENT);
    }

    #[test]
    fn test_chunks_are_handed_out_in_buffer_order() {
        let pool = PoolAllocator::new(3, 16).expect("valid");
        let a = pool.allocate(16).expect("chunk 0");
        let b = pool.allocate(8).expect("chunk 1");
        let c = pool.allocate(1).expect("chunk 2");
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 16);
        assert_eq!(c.as_ptr() as usize - b.as_ptr() as usize, 16);
        assert!(pool.allocate(8).is_none());
        assert_eq!(pool.free_chunks(), 0);
        assert_eq!(pool.used_memory(), 48);
    }

    #[test]
    fn test_snapshot_restores_free_head() {
        let pool = PoolAllocator::new(4, 16).expect("valid");
        pool.allocate(16).expect("chunk 0");
        let snapshot = pool.snapshot();
        let second = pool.allocate(16).expect("chunk 1");
        pool.allocate(16).expect("chunk 2");

        // SAFETY: the chunks are never dereferenced.
        unsafe { pool.rewind(&snapshot) };
        assert_eq!(pool.free_chunks(), 3);
        assert_eq!(pool.allocate(16), Some(second));
    }

    #[test]
    fn test_exhausted_snapshot_round_trips() {
        let pool = PoolAllocator::new(1, 16).expect("valid");
        pool.allocate(16).expect("only chunk");
        let full = pool.snapshot();
        assert_eq!(full.position(), SnapshotPosition::Pool { free_head: None });
        // SAFETY: the chunk is never dereferenced.
        unsafe {
            pool.reset();
            pool.rewind(&full);
        }
        assert!(pool.allocate(16).is_none());
    }

    #[test]
    fn test_rewind_rejects_index_past_count() {
        let pool = PoolAllocator::new(2, 16).expect("valid");
        let forged = Snapshot::new(pool.id(), SnapshotPosition::Pool { free_head: Some(2) });
        // SAFETY: rejected rewinds leave the pool untouched.
        let err = unsafe { pool.try_rewind(&forged) }.expect_err("out of range");
        assert!(err.is_contract_violation());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exceeds pool chunk size")]
    fn test_oversized_request_is_contract_violation() {
        let pool = PoolAllocator::new(2, 16).expect("valid");
        let _ = pool.allocate(32);
    }

    #[test]
    fn test_cleanup_then_reuse() {
        let pool = PoolAllocator::new(2, 16).expect("valid");
        pool.allocate(16).expect("chunk");
        // SAFETY: the chunk is never dereferenced.
        unsafe {
            pool.cleanup();
            pool.cleanup();
        }
        assert_eq!(pool.total_memory(), 0);
        assert_eq!(pool.free_chunks(), 2);
        pool.allocate(16).expect("fresh buffer");
        assert_eq!(pool.free_chunks(), 1);
    }
}

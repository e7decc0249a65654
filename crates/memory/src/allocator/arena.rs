//! Arena allocator: a growing sequence of regions
//!
//! Allocation scans forward from the current region for the first one that
//! is still unmaterialized or has room, appending a new region when none
//! does. Regions never move, so returned pointers stay valid until
//! [`cleanup`](Allocator::cleanup).
//!
//! ```text
//! region 0: [####used####|..free..]
//! region 1: [####used##|....free....]   <- current
//! region 2: (placeholder, materialized on demand)
//! ```

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

/// One region of an [`ArenaAllocator`]
#[derive(Debug, Default)]
pub struct ArenaRegion {
    buffer: Option<OwnedBuffer>,
    cursor: usize,
}

impl ArenaRegion {
    /// Bytes used in this region
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Region size, `0` while unmaterialized
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, OwnedBuffer::capacity)
    }

    /// Whether the region owns a buffer
    pub fn is_materialized(&self) -> bool {
        self.buffer.is_some()
    }

    /// Start offset for `size` bytes at `alignment`, if they fit
    fn fit(&self, size: usize, alignment: usize) -> Option<usize> {
        let buffer = self.buffer.as_ref()?;
        let start = self.cursor + padding_for(buffer.addr() + self.cursor, alignment);
        let end = start.checked_add(size)?;
        (end <= buffer.capacity()).then_some(start)
    }
}

/// Region-chained bump allocator
pub struct ArenaAllocator {
    id: AllocatorId,
    region_size: usize,
    regions: RefCell<Vec<ArenaRegion>>,
    current: Cell<usize>,
}

impl ArenaAllocator {
    /// Create an arena whose regions hold at least `region_size` bytes.
    ///
    /// A size of `0` picks the process default global region size.
    pub fn new(region_size: usize) -> Self {
        let region_size = if region_size == 0 {
            config::current().global_region_size
        } else {
            region_size
        };
        Self {
            id: AllocatorId::next(),
            region_size,
            regions: RefCell::new(Vec::new()),
            current: Cell::new(0),
        }
    }

    /// Create an arena sized from configuration
    pub fn with_config(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self::new(config.allocator_initial_size))
    }

    /// Minimum size of a new region
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// Number of regions, placeholders included
    pub fn region_count(&self) -> usize {
        self.regions.borrow().len()
    }

    /// Index of the region allocation resumes from
    pub fn current_region_index(&self) -> usize {
        self.current.get()
    }

    /// Cursor of region `index`
    pub fn region_cursor(&self, index: usize) -> Option<usize> {
        self.regions.borrow().get(index).map(ArenaRegion::cursor)
    }

    /// Capacity of region `index`
    pub fn region_capacity(&self, index: usize) -> Option<usize> {
        self.regions.borrow().get(index).map(ArenaRegion::capacity)
    }

    /// Whether `ptr` points into any region
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        self.regions
            .borrow()
            .iter()
            .filter_map(|r| r.buffer.as_ref())
            .any(|b| b.contains(addr))
    }

    fn region_capacity_for(&self, size: usize, alignment: usize) -> MemoryResult<usize> {
        let slack = alignment.saturating_sub(BUFFER_ALIGN);
        let needed = size
            .checked_add(slack)
            .ok_or_else(|| MemoryError::size_overflow("arena region size"))?;
        Ok(needed.max(self.region_size))
    }
}

impl Allocator for ArenaAllocator {
    fn id(&self) -> AllocatorId {
        self.id
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Arena
    }

    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let size = round_request(size, alignment)?;
        let mut regions = self.regions.borrow_mut();

        let found = regions
            .iter()
            .enumerate()
            .skip(self.current.get())
            .find(|(_, r)| !r.is_materialized() || r.fit(size, alignment).is_some())
            .map(|(i, _)| i);

        let index = match found {
            Some(i) => i,
            None => {
                regions.push(ArenaRegion::default());
                regions.len() - 1
            }
        };

        let region = &mut regions[index];
        if !region.is_materialized() {
            let capacity = self.region_capacity_for(size, alignment).ok()?;
            region.buffer = Some(OwnedBuffer::new(capacity).ok()?);
            region.cursor = 0;

            #[cfg(feature = "logging")]
            debug!(id = %self.id, index, capacity, "arena region materialized");
        }

        let Some(start) = region.fit(size, alignment) else {
            #[cfg(feature = "logging")]
            trace!(id = %self.id, index, size, "arena region cannot satisfy request");
            return None;
        };
        let buffer = region.buffer.as_ref()?;
        region.cursor = start + size;
        self.current.set(index);

        // SAFETY: `fit` guarantees `start + size <= capacity`.
        Some(unsafe { buffer.at(start) })
    }

    fn snapshot(&self) -> Snapshot {
        if self.regions.borrow().is_empty() {
            // Force region 0 so the snapshot names a real region.
            let _ = self.allocate_aligned(0, 0);
        }

        let regions = self.regions.borrow();
        let index = self.current.get();
        let cursor = regions.get(index).map_or(0, ArenaRegion::cursor);
        Snapshot::new(
            self.id,
            SnapshotPosition::Arena {
                region_index: index,
                cursor,
            },
        )
    }

    unsafe fn try_rewind(&self, snapshot: &Snapshot) -> MemoryResult<()> {
        let SnapshotPosition::Arena {
            region_index,
            cursor,
        } = snapshot.verify(self.id, self.kind())?
        else {
            return Err(MemoryError::snapshot_kind_mismatch(self.kind(), snapshot.kind()));
        };

        let mut regions = self.regions.borrow_mut();
        if regions.is_empty() {
            return Ok(());
        }
        let Some(region) = regions.get(region_index) else {
            return Err(MemoryError::snapshot_out_of_range(format!(
                "region {region_index} of {}",
                regions.len()
            )));
        };
        if region.is_materialized() && cursor > region.capacity() {
            return Err(MemoryError::snapshot_out_of_range(format!(
                "cursor {cursor} past region {region_index} capacity {}",
                region.capacity()
            )));
        }

        regions[region_index].cursor = cursor;
        for later in &mut regions[region_index + 1..] {
            later.cursor = 0;
        }
        self.current.set(region_index);
        Ok(())
    }

    unsafe fn reset(&self) {
        for region in self.regions.borrow_mut().iter_mut() {
            region.cursor = 0;
        }
        self.current.set(0);
    }

    unsafe fn cleanup(&self) {
        let mut regions = self.regions.borrow_mut();
        if !regions.is_empty() {
            #[cfg(feature = "logging")]
            debug!(id = %self.id, regions = regions.len(), "arena cleanup");
        }
        regions.clear();
        regions.shrink_to_fit();
        self.current.set(0);
    }

    fn write_content(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "|---------------------")?;
        writeln!(out, "|Arena allocator {}:", self.id)?;
        writeln!(out, "|---------------------")?;
        writeln!(out, "|  current region: {}", self.current.get())?;
        for (i, region) in self.regions.borrow().iter().enumerate() {
            writeln!(out, "|  region {i}:")?;
            writeln!(out, "|    capacity: {}", region.capacity())?;
            writeln!(out, "|    cursor: {}", region.cursor)?;
        }
        writeln!(out, "|---------------------")
    }
}

impl MemoryUsage for ArenaAllocator {
    fn used_memory(&self) -> usize {
        self.regions.borrow().iter().map(ArenaRegion::cursor).sum()
    }

    fn total_memory(&self) -> usize {
        self.regions.borrow().iter().map(ArenaRegion::capacity).sum()
    }
}

impl fmt::Debug for ArenaAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("id", &self.id)
            .field("region_size", &self.region_size)
            .field("regions", &self.region_count())
            .field("current", &self.current.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let arena = ArenaAllocator::new(64);
        assert_eq!(arena.region_count(), 0);
        assert_eq!(arena.total_memory(), 0);
        assert_eq!(arena.region_cursor(0), None);
    }

    #[test]
    fn test_oversized_request_gets_its_own_region() {
        let arena = ArenaAllocator::new(64);
        arena.allocate(16).expect("region 0");
        arena.allocate(200).expect("dedicated region");
        assert_eq!(arena.region_count(), 2);
        assert_eq!(arena.region_capacity(1), Some(200));
        assert_eq!(arena.region_cursor(1), Some(200));
    }

    #[test]
    fn test_pointers_stay_valid_across_growth() {
        let arena = ArenaAllocator::new(32);
        let first = arena.allocate(24).expect("region 0");
        // SAFETY: 24 freshly allocated bytes.
        unsafe { first.as_ptr().write_bytes(0xAB, 24) };
        for _ in 0..16 {
            arena.allocate(24).expect("new region");
        }
        assert!(arena.contains(first.as_ptr()));
        // SAFETY: regions never move, the bytes are still owned by the arena.
        let bytes = unsafe { core::slice::from_raw_parts(first.as_ptr(), 24) };
        assert!(bytes.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_snapshot_forces_first_region() {
        let arena = ArenaAllocator::new(64);
        let snapshot = arena.snapshot();
        assert_eq!(arena.region_count(), 1);
        assert_eq!(
            snapshot.position(),
            SnapshotPosition::Arena {
                region_index: 0,
                cursor: 0
            }
        );
    }

    #[test]
    fn test_reset_reuses_regions_from_the_start() {
        let arena = ArenaAllocator::new(64);
        let first = arena.allocate(48).expect("region 0");
        arena.allocate(48).expect("region 1");
        // SAFETY: the blocks are never dereferenced.
        unsafe { arena.reset() };
        assert_eq!(arena.current_region_index(), 0);
        assert_eq!(arena.allocate(48), Some(first));
        assert_eq!(arena.region_count(), 2);
        assert_eq!(arena.used_memory(), 48);
    }

    #[test]
    fn test_rewind_rejects_unknown_region() {
        let arena = ArenaAllocator::new(64);
        arena.allocate(8).expect("region 0");
        let forged = Snapshot::new(
            arena.id(),
            SnapshotPosition::Arena {
                region_index: 3,
                cursor: 0,
            },
        );
        // SAFETY: rejected rewinds leave the arena untouched.
        let err = unsafe { arena.try_rewind(&forged) }.expect_err("no region 3");
        assert_eq!(err.code(), "MEM:SNAPSHOT:RANGE");
        assert_eq!(arena.region_cursor(0), Some(8));
    }

    #[test]
    fn test_cleanup_drops_regions() {
        let arena = ArenaAllocator::new(64);
        arena.allocate(8).expect("region 0");
        let snapshot = arena.snapshot();
        // SAFETY: the block is never dereferenced.
        unsafe {
            arena.cleanup();
            arena.cleanup();
        }
        assert_eq!(arena.region_count(), 0);
        // SAFETY: nothing is allocated.
        unsafe { arena.rewind(&snapshot) };
        assert_eq!(arena.region_count(), 0);
    }

    #[test]
    fn test_write_content_lists_regions() {
        let arena = ArenaAllocator::new(64);
        arena.allocate(8).expect("region 0");
        let mut out = String::new();
        arena.write_content(&mut out).expect("string write");
        assert!(out.contains("|  region 0:"));
        assert!(out.contains("|    capacity: 64"));
        assert!(out.contains("|    cursor: 8"));
    }
}

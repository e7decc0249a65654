//! Snapshot tokens for saving/restoring allocator position

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MemoryError, MemoryResult};

/// Identity of one allocator instance.
///
/// Every snapshot carries the id of the allocator that produced it, so a
/// rewind with a token from another instance is detected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocatorId(u64);

impl AllocatorId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AllocatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocation strategy of an allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    /// Single bump buffer with an integer cursor
    Linear,
    /// Single buffer with a movable cursor address
    Stack,
    /// Fixed-size chunks on a free list
    Pool,
    /// Growing sequence of regions
    Arena,
}

impl AllocatorKind {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Stack => "stack",
            Self::Pool => "pool",
            Self::Arena => "arena",
        }
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy-specific position captured by a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPosition {
    /// Byte offset into the linear buffer
    Linear {
        /// Cursor offset
        offset: usize,
    },
    /// Cursor address inside the stack buffer; `None` before first use
    Stack {
        /// Cursor address
        cursor: Option<usize>,
    },
    /// Free-list head; `None` when every chunk was handed out
    Pool {
        /// Index of the first free chunk
        free_head: Option<usize>,
    },
    /// Region index plus the cursor within that region
    Arena {
        /// Region the arena was filling
        region_index: usize,
        /// Cursor inside that region
        cursor: usize,
    },
}

impl SnapshotPosition {
    /// Strategy this position belongs to
    pub fn kind(&self) -> AllocatorKind {
        match self {
            Self::Linear { .. } => AllocatorKind::Linear,
            Self::Stack { .. } => AllocatorKind::Stack,
            Self::Pool { .. } => AllocatorKind::Pool,
            Self::Arena { .. } => AllocatorKind::Arena,
        }
    }
}

/// Opaque token returned by [`Allocator::snapshot`](super::Allocator::snapshot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    owner: AllocatorId,
    position: SnapshotPosition,
}

impl Snapshot {
    pub(crate) fn new(owner: AllocatorId, position: SnapshotPosition) -> Self {
        Self { owner, position }
    }

    /// Allocator that produced this snapshot
    pub fn owner(&self) -> AllocatorId {
        self.owner
    }

    /// Captured position
    pub fn position(&self) -> SnapshotPosition {
        self.position
    }

    /// Strategy of the producing allocator
    pub fn kind(&self) -> AllocatorKind {
        self.position.kind()
    }

    /// Check the token against the allocator about to be rewound.
    pub(crate) fn verify(&self, id: AllocatorId, kind: AllocatorKind) -> MemoryResult<SnapshotPosition> {
        if self.kind() != kind {
            return Err(MemoryError::snapshot_kind_mismatch(kind, self.kind()));
        }
        if self.owner != id {
            return Err(MemoryError::foreign_snapshot(id, self.owner));
        }
        Ok(self.position)
    }
}

//! Allocator contract and its four strategies
//!
//! | Strategy | Storage | Snapshot |
//! |----------|---------|----------|
//! | [`LinearAllocator`] | one buffer, integer cursor | offset |
//! | [`StackAllocator`] | one buffer, cursor address | address |
//! | [`PoolAllocator`] | fixed-size chunks, free list | free-list head |
//! | [`ArenaAllocator`] | growing list of regions | region + cursor |

mod arena;
mod linear;
mod pool;
mod snapshot;
pub mod stack;
mod traits;

pub use arena::{ArenaAllocator, ArenaRegion};
pub use linear::LinearAllocator;
pub use pool::PoolAllocator;
pub use snapshot::{AllocatorId, AllocatorKind, Snapshot, SnapshotPosition};
pub use stack::{StackAllocator, StackFrame};
pub use traits::{Allocator, AllocatorExt, DEFAULT_ALIGNMENT, MemoryUsage};

/// Round a request size up to `alignment`.
///
/// `None` when the rounding overflows. A non power-of-two alignment is a
/// contract violation in debug builds and a failed allocation otherwise.
#[inline]
pub(crate) fn round_request(size: usize, alignment: usize) -> Option<usize> {
    crate::debug_ensure_contract!(
        alignment == 0 || alignment.is_power_of_two(),
        "alignment {alignment} is not a power of two"
    );
    crate::utils::checked_align_up(size, alignment)
}

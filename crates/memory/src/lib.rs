//! # sl-memory
//!
//! Region-style memory management: four allocation strategies behind one
//! [`Allocator`](allocator::Allocator) contract, a per-thread global
//! allocator with scoped save/restore, and containers that draw their
//! storage from any of them.
//!
//! | Strategy | Use |
//! |----------|-----|
//! | [`ArenaAllocator`](allocator::ArenaAllocator) | Growing scratch space; pointers stay valid until cleanup |
//! | [`LinearAllocator`](allocator::LinearAllocator) | One fixed buffer, bump allocation |
//! | [`StackAllocator`](allocator::StackAllocator) | LIFO frames over one buffer |
//! | [`PoolAllocator`](allocator::PoolAllocator) | Fixed-size chunks |
//!
//! Individual allocations are never freed. Memory comes back in bulk through
//! `rewind`, `reset` or `cleanup`. Those calls are `unsafe` on a shared
//! allocator; [`ScopedAllocator`](scope::ScopedAllocator) and
//! [`StackFrame`](allocator::StackFrame) rewind safely by borrowing the
//! allocator exclusively.
//!
//! ## Quick Start
//!
//! ```rust
//! use sl_memory::prelude::*;
//!
//! let mut arena = ArenaAllocator::new(4096);
//! {
//!     let scope = ScopedAllocator::new(&mut arena);
//!     let mut map = HashMap::with_allocator(scope.allocator());
//!     map.insert("answer", 42);
//!     assert_eq!(map.get("answer"), Some(&42));
//! }
//! assert_eq!(arena.used_memory(), 0);
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured logging through `sl-log`
//!
//! ## Failure model
//!
//! - Capacity exhaustion is `None`, never a panic.
//! - Misuse of the snapshot contract (foreign or wrong-kind snapshot, cursor
//!   outside the owning buffer) panics through [`contract_violation!`]. The
//!   release profile aborts.
//! - Construction and configuration return [`MemoryResult`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]

#[macro_use]
pub mod macros;

// Error types
pub mod error;

// Core modules
pub mod allocator;
pub mod collections;
pub mod config;
pub mod core;
pub mod global;
pub mod scope;
pub mod utils;

pub use crate::config::MemoryConfig;
pub use crate::error::{MemoryError, MemoryResult};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::MemoryConfig;
    pub use crate::error::{MemoryError, MemoryResult};

    pub use crate::allocator::{
        Allocator, AllocatorExt, ArenaAllocator, LinearAllocator, MemoryUsage, PoolAllocator,
        Snapshot, StackAllocator, StackFrame,
    };

    pub use crate::collections::{Array, HashMap, HashMapOptions};
    pub use crate::global::{
        global_allocator, set_global_allocator, temp_alloc, temp_begin, temp_end, temp_reset,
    };
    pub use crate::scope::ScopedAllocator;
}

#[cfg(feature = "logging")]
use sl_log::info;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize sl-memory with configuration read from the environment.
///
/// # Examples
///
/// ```rust
/// fn main() -> sl_memory::MemoryResult<()> {
///     sl_memory::init()?;
///     Ok(())
/// }
/// ```
pub fn init() -> MemoryResult<()> {
    init_with(MemoryConfig::from_env())
}

/// Initialize sl-memory with an explicit configuration.
///
/// The configuration is validated and installed process-wide; allocators
/// created afterwards pick up its defaults. Threads that already created
/// their global allocator keep it.
pub fn init_with(config: MemoryConfig) -> MemoryResult<()> {
    crate::config::install(config)?;

    #[cfg(feature = "logging")]
    info!(version = VERSION, "sl-memory initialized");

    Ok(())
}

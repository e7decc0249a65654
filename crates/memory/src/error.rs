//! Error types for sl-memory
//!
//! Capacity exhaustion inside the allocator contract is reported as `None`,
//! not as an error. `MemoryError` covers the fallible edges around it:
//! construction, configuration, snapshot verification and container growth.

use thiserror::Error;

#[cfg(feature = "logging")]
use sl_log::error;

use crate::allocator::{AllocatorId, AllocatorKind};

/// Memory management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: String },

    // --- Configuration Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // --- Snapshot Errors ---
    #[error("Snapshot taken on allocator {found} cannot rewind allocator {expected}")]
    ForeignSnapshot {
        expected: AllocatorId,
        found: AllocatorId,
    },

    #[error("{found} snapshot passed to {expected} allocator")]
    SnapshotKindMismatch {
        expected: AllocatorKind,
        found: AllocatorKind,
    },

    #[error("Snapshot out of range: {reason}")]
    SnapshotOutOfRange { reason: String },

    // --- System Errors ---
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },
}

impl MemoryError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Whether the error reports a misuse of the snapshot/rewind contract
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ForeignSnapshot { .. }
                | Self::SnapshotKindMismatch { .. }
                | Self::SnapshotOutOfRange { .. }
        )
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::ForeignSnapshot { .. } => "MEM:SNAPSHOT:FOREIGN",
            Self::SnapshotKindMismatch { .. } => "MEM:SNAPSHOT:KIND",
            Self::SnapshotOutOfRange { .. } => "MEM:SNAPSHOT:RANGE",
            Self::InvalidState { .. } => "MEM:SYSTEM:STATE",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "Memory allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &str) -> Self {
        Self::SizeOverflow {
            operation: operation.to_string(),
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create foreign snapshot error
    pub fn foreign_snapshot(expected: AllocatorId, found: AllocatorId) -> Self {
        Self::ForeignSnapshot { expected, found }
    }

    /// Create snapshot kind mismatch error
    pub fn snapshot_kind_mismatch(expected: AllocatorKind, found: AllocatorKind) -> Self {
        Self::SnapshotKindMismatch { expected, found }
    }

    /// Create snapshot out of range error
    pub fn snapshot_out_of_range(reason: impl Into<String>) -> Self {
        Self::SnapshotOutOfRange {
            reason: reason.into(),
        }
    }

    /// Create invalid state error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

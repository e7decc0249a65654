//! # sl-log
//!
//! Zero-config structured logging for the sl memory layer, built on
//! `tracing` and `tracing-subscriber`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sl_log::prelude::*;
//!
//! fn main() -> LogResult<()> {
//!     let _guard = sl_log::auto_init()?;
//!
//!     info!(regions = 2, "arena grew");
//!     Ok(())
//! }
//! ```
//!
//! The level filter is read from `SL_LOG` (falling back to `RUST_LOG`) when
//! either is set, otherwise a development or production preset is chosen from
//! the build profile.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;
mod format;
mod writer;

// Public API
pub use builder::{LoggerBuilder, LoggerGuard, ReloadHandle};
pub use config::{Config, DisplayConfig, Fields, Format, Level, WriterConfig};
pub use error::{LogError, LogResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        LogResult, auto_init, debug, error, info, init, init_with, span, trace, warn,
    };

    pub use tracing::{Span, field};
}

// Re-export tracing macros
pub use tracing::{debug, error, info, span, trace, warn};

// ============================================================================
// Initialization Functions
// ============================================================================

/// Auto-detect and initialize the best logging configuration
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("SL_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Initialize for tests.
///
/// Output goes through the test harness writer so it is captured per test.
/// Safe to call from every test: once a global subscriber exists this returns
/// a no-op guard.
pub fn init_test() -> LogResult<LoggerGuard> {
    if tracing::dispatcher::has_been_set() {
        return Ok(LoggerGuard::noop());
    }
    match init_with(Config::test()) {
        Ok(guard) => Ok(guard),
        // Another test thread won the race.
        Err(LogError::Init(_)) => Ok(LoggerGuard::noop()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_is_idempotent() {
        let first = init_test();
        assert!(first.is_ok());
        let second = init_test();
        assert!(second.is_ok());
        info!("logged through the test writer");
    }
}

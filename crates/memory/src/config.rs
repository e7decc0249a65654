//! Configuration for sl-memory
//!
//! One [`MemoryConfig`] is installed process-wide by [`crate::init_with`].
//! Constructors that are given a size of `0` and the thread's global
//! allocator read their defaults from it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[cfg(feature = "logging")]
use sl_log::{debug, warn};

use crate::allocator::DEFAULT_ALIGNMENT;
use crate::error::{MemoryError, MemoryResult};

/// Default Linear/Stack size and Arena region size
pub const ALLOCATOR_INITIAL_SIZE: usize = 4 * 1024;

/// Region size of the lazily created per-thread global arena
pub const GLOBAL_ALLOCATOR_INITIAL_SIZE: usize = 64 * 1024;

// ============================================================================
// Core Configuration Types
// ============================================================================

/// Memory system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Alignment used by [`Allocator::allocate`](crate::allocator::Allocator::allocate)
    pub default_alignment: usize,
    /// Default size for `with_config` constructors
    pub allocator_initial_size: usize,
    /// Region size of the global arena, and the fallback for size `0`
    pub global_region_size: usize,
    /// Default pool chunk count
    pub pool_chunk_count: usize,
    /// Default pool chunk size
    pub pool_chunk_size: usize,
    /// Hash map defaults
    pub hash_map: HashMapConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_alignment: DEFAULT_ALIGNMENT,
            allocator_initial_size: ALLOCATOR_INITIAL_SIZE,
            global_region_size: GLOBAL_ALLOCATOR_INITIAL_SIZE,
            pool_chunk_count: 32,
            pool_chunk_size: ALLOCATOR_INITIAL_SIZE / 32,
            hash_map: HashMapConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug configuration - small regions so growth paths run early
    pub fn debug() -> Self {
        Self {
            allocator_initial_size: 256,
            global_region_size: 1024,
            pool_chunk_count: 8,
            pool_chunk_size: 32,
            hash_map: HashMapConfig {
                initial_size: 4,
                ..HashMapConfig::default()
            },
            ..Self::default()
        }
    }

    /// Performance configuration - large regions, fewer growth steps
    pub fn performance() -> Self {
        Self {
            allocator_initial_size: 64 * 1024,
            global_region_size: 1024 * 1024,
            pool_chunk_count: 256,
            hash_map: HashMapConfig {
                initial_size: 256,
                max_load: 0.7,
                ..HashMapConfig::default()
            },
            ..Self::default()
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            global_region_size: 256 * 1024,
            ..Self::default()
        }
    }

    /// Defaults overridden from `SL_MEMORY_*` environment variables.
    ///
    /// Unparsable values keep the default and are logged.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        read_env("SL_MEMORY_ALIGNMENT", &mut config.default_alignment);
        read_env("SL_MEMORY_INITIAL_SIZE", &mut config.allocator_initial_size);
        read_env("SL_MEMORY_GLOBAL_SIZE", &mut config.global_region_size);
        read_env("SL_MEMORY_POOL_CHUNKS", &mut config.pool_chunk_count);
        read_env("SL_MEMORY_POOL_CHUNK_SIZE", &mut config.pool_chunk_size);
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> MemoryResult<()> {
        if self.default_alignment != 0 && !self.default_alignment.is_power_of_two() {
            return Err(MemoryError::invalid_config(format!(
                "default_alignment {} is not a power of two",
                self.default_alignment
            )));
        }
        for (name, value) in [
            ("allocator_initial_size", self.allocator_initial_size),
            ("global_region_size", self.global_region_size),
            ("pool_chunk_count", self.pool_chunk_count),
            ("pool_chunk_size", self.pool_chunk_size),
        ] {
            if value == 0 {
                return Err(MemoryError::invalid_config(format!("{name} must be non-zero")));
            }
        }
        self.hash_map
            .validate()
            .map_err(|e| MemoryError::invalid_config(format!("hash_map: {e}")))
    }
}

fn read_env(name: &str, slot: &mut usize) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_e) => {
            #[cfg(feature = "logging")]
            warn!(variable = name, value = %raw, error = %_e, "ignoring unparsable memory setting");
        }
    }
}

// ============================================================================
// Hash Map Configuration
// ============================================================================

/// Defaults for [`HashMap`](crate::collections::HashMap)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashMapConfig {
    /// Initial slot count, rounded up to a power of two
    pub initial_size: u32,
    /// Load factor that triggers growth, in `(0, 1]`
    pub max_load: f32,
    /// Capacity multiplier on growth, `> 1`
    pub grow_factor: f32,
}

impl Default for HashMapConfig {
    fn default() -> Self {
        Self {
            initial_size: 32,
            max_load: 0.8,
            grow_factor: 2.0,
        }
    }
}

impl HashMapConfig {
    /// Validate the hash map settings
    pub fn validate(&self) -> MemoryResult<()> {
        if !(self.max_load > 0.0 && self.max_load <= 1.0) {
            return Err(MemoryError::invalid_config(format!(
                "max_load {} must be in (0, 1]",
                self.max_load
            )));
        }
        if !(self.grow_factor > 1.0 && self.grow_factor.is_finite()) {
            return Err(MemoryError::invalid_config(format!(
                "grow_factor {} must be greater than 1",
                self.grow_factor
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Process-wide configuration
// ============================================================================

static CONFIG: RwLock<Option<MemoryConfig>> = parking_lot::const_rwlock(None);

/// Active configuration, the defaults when nothing was installed
pub fn current() -> MemoryConfig {
    CONFIG.read().clone().unwrap_or_default()
}

/// Validate and install `config` as the process-wide configuration
pub(crate) fn install(config: MemoryConfig) -> MemoryResult<()> {
    config.validate()?;
    #[cfg(feature = "logging")]
    debug!(?config, "memory configuration installed");
    *CONFIG.write() = Some(config);
    Ok(())
}

//! Process-wide configuration. Kept in its own test binary because
//! installing a configuration affects every allocator created afterwards.

use pretty_assertions::assert_eq;
use sl_memory::allocator::{
    Allocator, ArenaAllocator, LinearAllocator, MemoryUsage, PoolAllocator,
};
use sl_memory::collections::HashMap;
use sl_memory::config::{self, HashMapConfig};
use sl_memory::global::global_allocator;
use sl_memory::MemoryConfig;

#[test]
fn test_installed_config_drives_defaults() {
    let custom = MemoryConfig {
        allocator_initial_size: 512,
        global_region_size: 2048,
        pool_chunk_count: 4,
        pool_chunk_size: 24,
        hash_map: HashMapConfig {
            initial_size: 8,
            ..HashMapConfig::default()
        },
        ..MemoryConfig::default()
    };
    sl_memory::init_with(custom.clone()).expect("valid config");
    assert_eq!(config::current(), custom);

    let linear = LinearAllocator::new(0);
    assert_eq!(linear.total_size(), 2048);

    let arena = ArenaAllocator::with_config(&config::current()).expect("valid");
    assert_eq!(arena.region_size(), 512);

    let pool = PoolAllocator::with_config(&config::current()).expect("valid");
    assert_eq!(pool.chunk_count(), 4);
    assert_eq!(pool.chunk_size(), 24);

    let mut map = HashMap::new();
    map.insert(1, 1);
    assert_eq!(map.capacity(), 8);

    let global = global_allocator();
    global.allocate(8).expect("fits");
    let mut dump = String::new();
    global.write_content(&mut dump).expect("string write");
    assert!(dump.contains("capacity: 2048"), "{dump}");

    let invalid = MemoryConfig {
        pool_chunk_size: 0,
        ..MemoryConfig::default()
    };
    let err = sl_memory::init_with(invalid).expect_err("zero chunk size");
    assert_eq!(err.code(), "MEM:CONFIG:INVALID");
    assert_eq!(config::current(), custom);
    assert_eq!(linear.used_memory(), 0);
}

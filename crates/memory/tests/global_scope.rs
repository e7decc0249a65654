//! Thread-global allocator swapping and scoped rewind.
//!
//! Scratch blocks here are raw addresses that are never read after the
//! global allocator is reset, rewound, swapped or cleaned up.

use std::rc::Rc;
use std::thread;

use pretty_assertions::assert_eq;
use sl_memory::allocator::{
    Allocator, AllocatorKind, ArenaAllocator, LinearAllocator, MemoryUsage, StackAllocator,
};
use sl_memory::collections::Array;
use sl_memory::global::{
    cleanup_global_allocator, global_allocator, set_global_allocator, temp_alloc, temp_begin,
    temp_copy, temp_end, temp_reset, with_global_allocator,
};
use sl_memory::scope::ScopedAllocator;

#[test]
fn test_each_thread_gets_its_own_arena() {
    let here = global_allocator().id();
    let there = thread::spawn(|| {
        let allocator = global_allocator();
        assert_eq!(allocator.kind(), AllocatorKind::Arena);
        allocator.id()
    })
    .join()
    .expect("thread finished");
    assert_ne!(here, there);
}

#[test]
fn test_swapping_cleans_up_previous_allocator() {
    let old = Rc::new(ArenaAllocator::new(128));
    unsafe { set_global_allocator(old.clone()) };
    temp_alloc(64).expect("fits");
    assert_eq!(old.region_count(), 1);

    let new = Rc::new(StackAllocator::new(128));
    unsafe { set_global_allocator(new.clone()) };
    assert_eq!(old.region_count(), 0);
    assert_eq!(global_allocator().id(), new.id());

    temp_alloc(16).expect("fits");
    assert_eq!(new.used_memory(), 16);
}

#[test]
fn test_temp_begin_end_brackets_scratch_work() {
    let linear = Rc::new(LinearAllocator::new(256));
    unsafe { set_global_allocator(linear.clone()) };

    temp_alloc(8).expect("fits");
    let mark = temp_begin();
    for _ in 0..10 {
        temp_alloc(16).expect("fits");
    }
    temp_copy(b"scratch").expect("fits");
    unsafe { temp_end(&mark) };
    assert_eq!(linear.cursor(), 8);

    unsafe { temp_reset() };
    assert_eq!(linear.cursor(), 0);
}

#[test]
#[should_panic(expected = "contract violation")]
fn test_temp_end_with_stale_snapshot_panics() {
    unsafe { set_global_allocator(Rc::new(LinearAllocator::new(64))) };
    let mark = temp_begin();
    unsafe {
        set_global_allocator(Rc::new(LinearAllocator::new(64)));
        temp_end(&mark);
    }
}

#[test]
fn test_scoped_allocator_rewinds_exactly_once() {
    let mut arena = ArenaAllocator::new(128);
    arena.allocate(16).expect("fits");

    let scope = ScopedAllocator::new(&mut arena);
    scope.allocator().allocate(64).expect("fits");
    drop(scope);
    assert_eq!(arena.used_memory(), 16);

    // Work after the scope closed survives.
    arena.allocate(32).expect("fits");
    assert_eq!(arena.used_memory(), 48);
}

#[test]
fn test_scoped_allocator_rewinds_on_early_return() {
    fn work(allocator: &mut dyn Allocator, bail: bool) -> Option<usize> {
        let scope = ScopedAllocator::new(allocator);
        scope.allocator().allocate(32)?;
        if bail {
            return None;
        }
        scope.allocator().allocate(32)?;
        Some(64)
    }

    let mut linear = LinearAllocator::new(256);
    assert_eq!(work(&mut linear, true), None);
    assert_eq!(linear.cursor(), 0);
    assert_eq!(work(&mut linear, false), Some(64));
    assert_eq!(linear.cursor(), 0);
}

#[test]
fn test_container_inside_scope_keeps_entries_until_close() {
    let mut linear = LinearAllocator::new(4096);
    {
        let scope = ScopedAllocator::new(&mut linear);
        let mut values = Array::with_allocator(scope.allocator());
        for i in 0..100_u32 {
            values.push(i);
        }
        // Other scratch work in the same scope does not disturb the array.
        scope.allocator().allocate(512).expect("fits");
        assert_eq!(values.len(), 100);
        assert!(values.iter().copied().eq(0..100));
    }
    assert_eq!(linear.cursor(), 0);
}

#[test]
fn test_global_scope_over_swapped_allocator() {
    let linear = Rc::new(LinearAllocator::new(128));
    unsafe { set_global_allocator(linear.clone()) };
    {
        let _scope = unsafe { ScopedAllocator::global() };
        temp_alloc(48).expect("fits");
        with_global_allocator(|a| a.allocate(16)).expect("fits");
        assert_eq!(linear.cursor(), 64);
    }
    assert_eq!(linear.cursor(), 0);

    {
        let _scope = unsafe { ScopedAllocator::global() };
        temp_alloc(48).expect("fits");
        unsafe { cleanup_global_allocator() };
    }
    assert!(!linear.is_materialized());
    assert_eq!(global_allocator().id(), linear.id());
}

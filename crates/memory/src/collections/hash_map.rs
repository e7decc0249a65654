//! Open-addressing hash map with tombstones
//!
//! Slots live in an [`Array`] sized to a power of two and are probed
//! linearly. Each slot stores the key's hash, with two reserved values:
//!
//! - `FREE` (0): never used, a probe stops here
//! - `DEAD` (1): removed entry, a probe continues past it
//!
//! Real hashes below 2 are shifted up by 2. Growth rehashes into a larger
//! table and restarts with a strictly larger candidate whenever an entry
//! cannot be placed, so no entry is ever lost.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::mem::MaybeUninit;

#[cfg(feature = "logging")]
use sl_log::trace;

use super::Array;
use crate::allocator::Allocator;
use crate::config::{self, HashMapConfig};
use crate::error::{MemoryError, MemoryResult};
use crate::utils::next_power_of_two;

/// Byte hasher: `(seed, bytes) -> hash`
pub type HashFn = fn(seed: u64, bytes: &[u8]) -> u64;

const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// Seeded FNV-1a
///
/// ```
/// use sl_memory::collections::fnv1a;
///
/// assert_eq!(fnv1a(0, b"a"), fnv1a(0, b"a"));
/// assert_ne!(fnv1a(0, b"a"), fnv1a(1, b"a"));
/// ```
pub fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = (FNV_OFFSET ^ seed).wrapping_mul(FNV_PRIME);
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Feeds every `Hasher::write` through a [`HashFn`], chaining the state
struct CallbackHasher {
    hasher: HashFn,
    state: u64,
}

impl Hasher for CallbackHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        self.state = (self.hasher)(self.state, bytes);
    }
}

const FREE: u64 = 0;
const DEAD: u64 = 1;

struct Slot<K, V> {
    hash: u64,
    entry: MaybeUninit<(K, V)>,
}

impl<K, V> Slot<K, V> {
    const fn free() -> Self {
        Self {
            hash: FREE,
            entry: MaybeUninit::uninit(),
        }
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.hash > DEAD
    }

    fn entry(&self) -> Option<&(K, V)> {
        // SAFETY: live slots always hold an initialized entry.
        self.is_live().then(|| unsafe { self.entry.assume_init_ref() })
    }
}

/// Construction options for [`HashMap`]
#[derive(Clone, Copy)]
pub struct HashMapOptions<'a> {
    /// Initial slot count, rounded up to a power of two
    pub initial_size: u32,
    /// Load factor that triggers growth, in `(0, 1]`
    pub max_load: f32,
    /// Capacity multiplier on growth, `> 1`
    pub grow_factor: f32,
    /// Byte hasher
    pub hasher: HashFn,
    /// Seed passed to the hasher
    pub seed: u64,
    /// Slot storage; the heap when `None`
    pub allocator: Option<&'a dyn Allocator>,
}

impl Default for HashMapOptions<'_> {
    fn default() -> Self {
        let HashMapConfig {
            initial_size,
            max_load,
            grow_factor,
        } = config::current().hash_map;
        Self {
            initial_size,
            max_load,
            grow_factor,
            hasher: fnv1a,
            seed: 0,
            allocator: None,
        }
    }
}

impl HashMapOptions<'_> {
    fn validate(&self) -> MemoryResult<()> {
        HashMapConfig {
            initial_size: self.initial_size,
            max_load: self.max_load,
            grow_factor: self.grow_factor,
        }
        .validate()
    }
}

impl fmt::Debug for HashMapOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapOptions")
            .field("initial_size", &self.initial_size)
            .field("max_load", &self.max_load)
            .field("grow_factor", &self.grow_factor)
            .field("seed", &self.seed)
            .field("allocator", &self.allocator.map(Allocator::id))
            .finish_non_exhaustive()
    }
}

/// Open-addressing hash map
pub struct HashMap<'a, K, V> {
    slots: Array<'a, Slot<K, V>>,
    count: usize,
    initial_capacity: usize,
    max_load: f64,
    grow_factor: f64,
    hasher: HashFn,
    seed: u64,
}

impl<K: Hash + Eq, V> HashMap<'static, K, V> {
    /// Heap-backed map with the configured defaults
    ///
    /// # Panics
    ///
    /// When the initial table cannot be allocated.
    pub fn new() -> Self {
        Self::expect_table(Self::from_valid_options(HashMapOptions::default()))
    }
}

impl<K: Hash + Eq, V> Default for HashMap<'static, K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K: Hash + Eq, V> HashMap<'a, K, V> {
    /// Map with explicit options.
    ///
    /// The table of `next_power_of_two(initial_size)` slots is allocated
    /// here, from `options.allocator` when one is given.
    pub fn with_options(options: HashMapOptions<'a>) -> MemoryResult<Self> {
        options.validate()?;
        Self::from_valid_options(options)
    }

    /// Map with the configured defaults, storing slots in `allocator`
    ///
    /// # Panics
    ///
    /// When `allocator` cannot hold the initial table.
    pub fn with_allocator(allocator: &'a dyn Allocator) -> Self {
        Self::expect_table(Self::from_valid_options(HashMapOptions {
            allocator: Some(allocator),
            ..HashMapOptions::default()
        }))
    }

    fn from_valid_options(options: HashMapOptions<'a>) -> MemoryResult<Self> {
        let initial_capacity = next_power_of_two(options.initial_size.max(1) as usize);
        Ok(Self {
            slots: Self::new_table(initial_capacity, options.allocator)?,
            count: 0,
            initial_capacity,
            max_load: f64::from(options.max_load),
            grow_factor: f64::from(options.grow_factor),
            hasher: options.hasher,
            seed: options.seed,
        })
    }

    fn expect_table(map: MemoryResult<Self>) -> Self {
        match map {
            Ok(map) => map,
            Err(e) => crate::contract_violation!("hash map construction failed: {e}"),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Slot count; `0` only after [`cleanup`](HashMap::cleanup)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        let mut hasher = CallbackHasher {
            hasher: self.hasher,
            state: self.seed,
        };
        key.hash(&mut hasher);
        let hash = hasher.finish();
        if hash <= DEAD { hash + 2 } else { hash }
    }

    fn find<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let capacity = self.slots.len();
        if capacity == 0 {
            return None;
        }
        let mask = capacity - 1;
        let mut index = hash as usize & mask;
        for _ in 0..capacity {
            let slot = &self.slots[index];
            match slot.hash {
                FREE => return None,
                h if h == hash => {
                    if let Some((k, _)) = slot.entry()
                        && <K as Borrow<Q>>::borrow(k) == key
                    {
                        return Some(index);
                    }
                }
                _ => {}
            }
            index = (index + 1) & mask;
        }
        None
    }

    /// First FREE or DEAD slot on the probe sequence of `hash`
    fn vacant_slot(slots: &Array<'_, Slot<K, V>>, hash: u64) -> Option<usize> {
        let capacity = slots.len();
        if capacity == 0 {
            return None;
        }
        let mask = capacity - 1;
        let mut index = hash as usize & mask;
        for _ in 0..capacity {
            if !slots[index].is_live() {
                return Some(index);
            }
            index = (index + 1) & mask;
        }
        None
    }

    fn new_table(
        capacity: usize,
        allocator: Option<&'a dyn Allocator>,
    ) -> MemoryResult<Array<'a, Slot<K, V>>> {
        let mut table = Array::empty(allocator);
        table.try_reserve_exact(capacity)?;
        for _ in 0..capacity {
            table.try_push(Slot::free())?;
        }
        Ok(table)
    }

    fn next_candidate(&self, capacity: usize) -> usize {
        let scaled = (capacity as f64 * self.grow_factor).ceil() as usize;
        next_power_of_two(scaled.max(capacity + 1))
    }

    fn grow(&mut self) -> MemoryResult<()> {
        let old_capacity = self.slots.len();
        let mut candidate = if old_capacity == 0 {
            self.initial_capacity
        } else {
            self.next_candidate(old_capacity)
        };

        let (table, targets) = loop {
            let mut table = Self::new_table(candidate, self.slots.allocator())?;
            let mut targets = Vec::with_capacity(self.count);
            let placed = self.slots.iter().enumerate().filter(|(_, s)| s.is_live()).all(|(i, s)| {
                match Self::vacant_slot(&table, s.hash) {
                    Some(t) => {
                        table[t].hash = s.hash;
                        targets.push((i, t));
                        true
                    }
                    None => false,
                }
            });
            if placed {
                break (table, targets);
            }

            #[cfg(feature = "logging")]
            trace!(candidate, "rehash could not place every entry, restarting");
            candidate = self.next_candidate(candidate);
        };

        let mut table = table;
        for (from, to) in targets {
            let source = &mut self.slots[from];
            source.hash = FREE;
            // SAFETY: `from` was live, so its entry is initialized; marking it
            // FREE first makes this the only read of it.
            let entry = unsafe { source.entry.assume_init_read() };
            table[to].entry.write(entry);
        }

        #[cfg(feature = "logging")]
        trace!(from = old_capacity, to = table.len(), count = self.count, "hash map grown");

        self.slots = table;
        Ok(())
    }

    /// Insert `key`, returning the previous value for an existing key.
    ///
    /// # Panics
    ///
    /// When slot storage cannot be obtained.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.try_insert(key, value) {
            Ok(previous) => previous,
            Err(e) => crate::contract_violation!("hash map insert failed: {e}"),
        }
    }

    /// Insert `key`, reporting storage failure
    pub fn try_insert(&mut self, key: K, value: V) -> MemoryResult<Option<V>> {
        let hash = self.hash_of(&key);
        if let Some(index) = self.find(hash, &key) {
            // SAFETY: `find` only returns live slots.
            let (_, current) = unsafe { self.slots[index].entry.assume_init_mut() };
            return Ok(Some(core::mem::replace(current, value)));
        }

        self.count += 1;
        while self.slots.is_empty() || self.count as f64 > self.capacity() as f64 * self.max_load {
            if let Err(e) = self.grow() {
                self.count -= 1;
                return Err(e);
            }
        }

        let Some(index) = Self::vacant_slot(&self.slots, hash) else {
            self.count -= 1;
            return Err(MemoryError::invalid_state("hash map has no vacant slot"));
        };
        let slot = &mut self.slots[index];
        slot.hash = hash;
        slot.entry.write((key, value));
        Ok(None)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.find(self.hash_of(key), key)?;
        self.slots[index].entry().map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.find(self.hash_of(key), key)?;
        // SAFETY: `find` only returns live slots.
        let (_, value) = unsafe { self.slots[index].entry.assume_init_mut() };
        Some(value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(self.hash_of(key), key).is_some()
    }

    /// Remove `key`, leaving a tombstone in its slot
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.find(self.hash_of(key), key)?;
        let slot = &mut self.slots[index];
        slot.hash = DEAD;
        // SAFETY: the slot was live and is now DEAD, so the entry is read once.
        let (_, value) = unsafe { slot.entry.assume_init_read() };
        self.count -= 1;
        Some(value)
    }

    /// Drop every entry, keeping capacity
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.is_live() {
                // SAFETY: live slots hold an initialized entry, dropped once
                // before the slot is marked FREE.
                unsafe { slot.entry.assume_init_drop() };
            }
            slot.hash = FREE;
        }
        self.count = 0;
    }

    /// Drop every entry and release the slots.
    ///
    /// The map stays usable; the next insert allocates a fresh table of the
    /// initial capacity.
    pub fn cleanup(&mut self) {
        self.clear();
        self.slots.cleanup();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.slots.iter().filter_map(Slot::entry).map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<K, V> Drop for HashMap<'_, K, V> {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if slot.is_live() {
                // SAFETY: live slots hold an initialized entry.
                unsafe { slot.entry.assume_init_drop() };
                slot.hash = FREE;
            }
        }
    }
}

impl<K: Hash + Eq + fmt::Debug, V: fmt::Debug> fmt::Debug for HashMap<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{LinearAllocator, MemoryUsage};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn constant_hash(_seed: u64, _bytes: &[u8]) -> u64 {
        7
    }

    fn colliding<'a>() -> HashMap<'a, u32, u32> {
        HashMap::with_options(HashMapOptions {
            hasher: constant_hash,
            ..HashMapOptions::default()
        })
        .expect("valid options")
    }

    #[test]
    fn test_fnv1a_reference_values() {
        // Seed 0 mixes one extra multiply before the bytes.
        assert_eq!(fnv1a(0, b""), FNV_OFFSET.wrapping_mul(FNV_PRIME));
        let expected = ((FNV_OFFSET.wrapping_mul(FNV_PRIME)) ^ u64::from(b'a')).wrapping_mul(FNV_PRIME);
        assert_eq!(fnv1a(0, b"a"), expected);
    }

    #[test]
    fn test_sentinel_hashes_are_remapped() {
        fn zero(_: u64, _: &[u8]) -> u64 {
            0
        }
        let mut map = HashMap::with_options(HashMapOptions {
            hasher: zero,
            ..HashMapOptions::default()
        })
        .expect("valid options");
        map.insert("k", 1);
        assert_eq!(map.get("k"), Some(&1));
    }

    #[test]
    fn test_table_allocated_at_construction() {
        let map: HashMap<'_, u32, u32> = HashMap::new();
        assert_eq!(map.capacity(), 32);
        assert_eq!(map.get(&1), None);

        for requested in [1_u32, 4, 5, 33] {
            let map = HashMap::<u32, u32>::with_options(HashMapOptions {
                initial_size: requested,
                ..HashMapOptions::default()
            })
            .expect("valid options");
            assert_eq!(map.capacity(), next_power_of_two(requested as usize));
            assert!(map.is_empty());
        }
    }

    #[test]
    fn test_construction_takes_slots_from_allocator() {
        let linear = LinearAllocator::new(4096);
        let map: HashMap<'_, u64, u64> = HashMap::with_allocator(&linear);
        assert_eq!(map.capacity(), 32);
        assert!(linear.used_memory() > 0);
    }

    #[test]
    fn test_construction_reports_exhausted_allocator() {
        let linear = LinearAllocator::new(64);
        linear.allocate(8).expect("materialize");
        let err = HashMap::<u64, u64>::with_options(HashMapOptions {
            allocator: Some(&linear),
            initial_size: 64,
            ..HashMapOptions::default()
        })
        .expect_err("64 slots do not fit in 56 bytes");
        assert_eq!(err.code(), "MEM:ALLOC:FAILED");
    }

    #[test]
    #[should_panic(expected = "hash map construction failed")]
    fn test_with_allocator_panics_when_table_does_not_fit() {
        let linear = LinearAllocator::new(64);
        linear.allocate(8).expect("materialize");
        let _map: HashMap<'_, u64, u64> = HashMap::with_allocator(&linear);
    }

    #[test]
    fn test_duplicate_insert_overwrites() {
        let mut map = HashMap::new();
        assert_eq!(map.insert("key", 1), None);
        assert_eq!(map.insert("key", 2), Some(1));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("key"), Some(&2));
    }

    #[test]
    fn test_tombstone_keeps_probe_alive() {
        let mut map = colliding();
        map.insert(1, 10);
        map.insert(2, 20);
        map.insert(3, 30);
        assert_eq!(map.remove(&2), Some(20));
        assert_eq!(map.get(&3), Some(&30));
        assert!(!map.contains_key(&2));

        // The tombstone is reused by the next insert.
        map.insert(4, 40);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&4), Some(&40));
        assert_eq!(map.get(&3), Some(&30));
    }

    #[test]
    fn test_growth_under_full_collision() {
        let mut map = colliding();
        for i in 0..200 {
            map.insert(i, i * 2);
        }
        assert_eq!(map.len(), 200);
        assert!(map.capacity() >= 256);
        assert!((0..200).all(|i| map.get(&i) == Some(&(i * 2))));
    }

    #[test]
    fn test_get_mut_and_iter() {
        let mut map = HashMap::new();
        map.insert(String::from("a"), 1);
        map.insert(String::from("b"), 2);
        *map.get_mut("a").expect("present") += 10;

        let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort();
        assert_eq!(entries, vec![(String::from("a"), 11), (String::from("b"), 2)]);
        assert_eq!(map.keys().count(), 2);
        assert_eq!(map.values().sum::<i32>(), 13);
    }

    #[test]
    fn test_clear_and_cleanup_drop_values() {
        let tracker = Rc::new(());
        let mut map = HashMap::new();
        for i in 0..10 {
            map.insert(i, Rc::clone(&tracker));
        }
        map.remove(&0);
        assert_eq!(Rc::strong_count(&tracker), 10);

        map.clear();
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert_eq!(map.capacity(), 32);

        map.insert(1, Rc::clone(&tracker));
        map.cleanup();
        assert_eq!(map.capacity(), 0);
        assert_eq!(Rc::strong_count(&tracker), 1);

        map.insert(2, Rc::clone(&tracker));
        assert_eq!(map.capacity(), 32);
        drop(map);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_allocator_backed_slots() {
        let linear = LinearAllocator::new(64 * 1024);
        let mut map = HashMap::with_allocator(&linear);
        for i in 0..100_u64 {
            map.insert(i, i);
        }
        assert!(linear.used_memory() > 0);
        assert_eq!(map.get(&99), Some(&99));
    }

    #[test]
    fn test_invalid_options() {
        let err = HashMap::<u32, u32>::with_options(HashMapOptions {
            grow_factor: 0.5,
            ..HashMapOptions::default()
        })
        .expect_err("shrinking growth");
        assert_eq!(err.code(), "MEM:CONFIG:INVALID");
    }
}

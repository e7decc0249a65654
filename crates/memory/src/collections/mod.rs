//! Containers that draw their storage from an [`Allocator`](crate::allocator::Allocator)

mod array;
mod hash_map;

pub use array::{ARRAY_INITIAL_CAPACITY, Array};
pub use hash_map::{HashFn, HashMap, HashMapOptions, fnv1a};

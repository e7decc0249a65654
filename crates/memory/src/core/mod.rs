//! Core building blocks shared by the allocators

pub mod buffer;

pub use buffer::{BUFFER_ALIGN, OwnedBuffer};

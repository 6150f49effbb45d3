//! Concurrency-safe containers backing the router registries.
//!
//! - `map` -- `ConcurrentMap` with atomic load-or-store and conditional removal
//! - `array` -- `ConcurrentArray`, an ordered sequence with snapshot iteration

pub mod array;
pub mod map;

pub use array::{ConcurrentArray, IndexOutOfRange};
pub use map::ConcurrentMap;

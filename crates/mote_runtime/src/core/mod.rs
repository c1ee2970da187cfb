//! Core data structures: value encoding, arenas, cells, and the heap.

pub mod arena;
pub mod config;
pub mod heap;
pub mod object;
pub mod strings;
pub mod value;

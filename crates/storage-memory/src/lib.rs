//! In-process storage for the tag index.
//!
//! [`MemoryStore`] reproduces the set and score-ordered set semantics the index relies on,
//! so the index runs without an external database in local setups and tests.

mod memory_store;
mod sorted_set;

pub use memory_store::MemoryStore;

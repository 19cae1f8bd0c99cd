//! # Collections
//!
//! Associative containers used by the entity store.

mod hash_table;

pub use hash_table::{HashTable, TableKey, DEFAULT_CAPACITY, MAX_LOAD_FACTOR};

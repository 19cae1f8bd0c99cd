//! # Memory Management
//!
//! Arenas and handle pools underneath the entity store.
//!
//! ## Design Philosophy
//!
//! Reserve large, commit small:
//! - Address space is reserved once per arena
//! - Commitment follows the cursor, doubling on demand
//! - Pools have a fixed capacity chosen at startup

mod arena;
mod pool;

pub use arena::{Arena, PAGE_SIZE};
pub use pool::{Handle, HandlePool, INVALID_HANDLE_INDEX};

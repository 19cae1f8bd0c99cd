//! # LATTICE Core
//!
//! Storage core of the LATTICE engine:
//! - Reserve-then-commit linear arenas
//! - Generation-checked handle pools
//! - A Robin Hood open-addressing hash table
//! - An archetype entity/component store with a per-frame system scheduler
//!
//! ## Architecture Rules
//!
//! 1. **Capacities are fixed at startup** - pools and reservations never grow
//! 2. **Append-only storage** - archetypes and rows are never removed
//! 3. **Contiguous columns** - systems see whole column slices per archetype
//!
//! ## Example
//!
//! ```rust,ignore
//! use lattice_core::{Arena, EntityContext, FnSystem};
//!
//! let mut ctx = EntityContext::default();
//! let mesh = ctx.register_component("Mesh", 32)?;
//! ctx.create_entity_with_components(&[mesh], &[&[0u8; 32]])?;
//!
//! ctx.push_system(FnSystem::new(&[mesh], |updates| {
//!     for array in updates.arrays_mut() {
//!         array.column_mut(0).fill(1);
//!     }
//! }))?;
//!
//! let mut frame = Arena::new(1 << 20, 4096)?;
//! ctx.run_systems(&mut frame)?;
//! frame.clear_memory();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collections;
pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use collections::HashTable;
pub use config::EcsConfig;
pub use ecs::{
    Archetype, Column, Component, ComponentType, Entity, EntityContext, EntitySignature,
    EntitySystem, FnSystem, UpdateArray, UpdateSet,
};
pub use error::{ArenaError, EcsError, EcsResult, PoolError};
pub use memory::{Arena, Handle, HandlePool};

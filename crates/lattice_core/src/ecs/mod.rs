//! # Entity Component System
//!
//! An archetype-based store for opaque component blobs, plus a per-frame
//! system scheduler.
//!
//! ## Design Philosophy
//!
//! - Components are registered by name and carried as raw bytes
//! - Entities with the same component set share one archetype
//! - Each archetype column is a contiguous buffer in its own arena
//! - Entity IDs are pool handles with generation counters

mod archetype;
mod component;
mod context;
mod entity;
mod system;

pub use archetype::{Archetype, Column};
pub use component::{
    Component, ComponentRegistry, ComponentType, EntitySignature, MAX_COMPONENT_TYPE_COUNT,
    MAX_SYSTEM_COMPONENT_TYPE_COUNT,
};
pub use context::EntityContext;
pub use entity::{Entity, EntityLocation};
pub use system::{EntitySystem, FnSystem, UpdateArray, UpdateSet};

//! # Entity Management
//!
//! Entities are pool handles. The pooled payload records where the entity's
//! row lives:
//! - The archetype it was placed in
//! - Its row inside that archetype's columns

use crate::memory::Handle;

/// Identifier of a live or dead entity.
///
/// Wraps a pool [`Handle`], so a released entity is detected through its
/// generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Entity(Handle);

impl Entity {
    /// Null/invalid entity.
    pub const NULL: Self = Self(Handle::INVALID);

    /// Wraps a pool handle.
    #[inline]
    #[must_use]
    pub const fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    /// Returns the underlying pool handle.
    #[inline]
    #[must_use]
    pub const fn handle(self) -> Handle {
        self.0
    }

    /// Checks if this is the null entity.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

/// Where an entity's components are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Index into the context's archetype list.
    pub archetype: u32,
    /// Row inside the archetype's columns.
    pub row: u32,
}

//! # Component Registry
//!
//! Components are opaque fixed-size byte blobs identified by a registered
//! name. Registration hands out a small stable index (0-63) which doubles as
//! the component's bit in an [`EntitySignature`].

use bytemuck::{Pod, Zeroable};

use crate::collections::HashTable;
use crate::error::{EcsError, EcsResult};

/// Upper bound on registered component kinds (one signature bit each).
pub const MAX_COMPONENT_TYPE_COUNT: usize = 64;

/// Upper bound on the components one system can require.
pub const MAX_SYSTEM_COMPONENT_TYPE_COUNT: usize = 8;

/// A registered component kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component {
    index: u32,
}

impl Component {
    /// Wraps a raw component index.
    ///
    /// Indices are normally obtained from
    /// [`EntityContext::register_component`](crate::ecs::EntityContext::register_component).
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_COMPONENT_TYPE_COUNT`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_index(index: u32) -> Self {
        assert!(
            index < MAX_COMPONENT_TYPE_COUNT as u32,
            "component index must be below 64"
        );
        Self { index }
    }

    /// Returns the component index (0-63).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

/// Typed component payloads.
///
/// Lets plain-old-data structs register under a fixed name and be read back
/// by value.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Transform {
///     matrix: [f32; 12],
/// }
///
/// impl ComponentType for Transform {
///     const NAME: &'static str = "Transform";
/// }
/// ```
pub trait ComponentType: Pod {
    /// Registry name of the component.
    const NAME: &'static str;
}

/// Membership mask over component indices.
///
/// Bit `i` is set iff component `i` is present. Order-independent by
/// construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct EntitySignature(u64);

impl EntitySignature {
    /// Signature with no components.
    pub const EMPTY: Self = Self(0);

    /// Builds a signature from a component list.
    #[must_use]
    pub fn from_components(components: &[Component]) -> Self {
        components
            .iter()
            .fold(Self::EMPTY, |signature, &component| signature.with(component))
    }

    /// Returns the raw mask.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns the signature with `component` added.
    #[inline]
    #[must_use]
    pub const fn with(self, component: Component) -> Self {
        Self(self.0 | (1 << component.index))
    }

    /// Adds a component.
    #[inline]
    pub fn insert(&mut self, component: Component) {
        *self = self.with(component);
    }

    /// Checks if a component is present.
    #[inline]
    #[must_use]
    pub const fn contains(self, component: Component) -> bool {
        self.0 & (1 << component.index) != 0
    }

    /// Checks if every component of `other` is present.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the number of components.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the components in ascending index order.
    pub fn iter(self) -> impl Iterator<Item = Component> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros();
            // Clear lowest set bit
            bits &= bits - 1;
            Some(Component::from_index(index))
        })
    }
}

/// Name → index table plus the byte size of each registered kind.
pub struct ComponentRegistry {
    names: HashTable<String, Component>,
    sizes: Vec<usize>,
}

impl ComponentRegistry {
    /// Creates an empty registry whose name table starts with
    /// `table_capacity` slots.
    #[must_use]
    pub fn new(table_capacity: usize) -> Self {
        Self {
            names: HashTable::with_capacity(table_capacity),
            sizes: Vec::with_capacity(MAX_COMPONENT_TYPE_COUNT),
        }
    }

    /// Registers `name` with `size` bytes, or returns the existing index.
    ///
    /// Re-registration keeps the size recorded first.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponents`] once all 64 indices are taken.
    pub fn register(&mut self, name: &str, size: usize) -> EcsResult<Component> {
        if let Some(&existing) = self.names.get(name) {
            let recorded = self.sizes[existing.index() as usize];
            if recorded != size {
                tracing::warn!(
                    name,
                    recorded,
                    requested = size,
                    "component re-registered with a different size; keeping the original"
                );
            }
            return Ok(existing);
        }

        if self.sizes.len() >= MAX_COMPONENT_TYPE_COUNT {
            return Err(EcsError::TooManyComponents {
                name: name.to_owned(),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let component = Component::from_index(self.sizes.len() as u32);
        self.sizes.push(size);
        self.names.set(name.to_owned(), component);

        tracing::debug!(name, index = component.index(), size, "component registered");
        Ok(component)
    }

    /// Looks up a component by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Component> {
        self.names.get(name).copied()
    }

    /// Returns the byte size of a registered component.
    #[must_use]
    pub fn size_of(&self, component: Component) -> Option<usize> {
        self.sizes.get(component.index() as usize).copied()
    }

    /// Returns the number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Checks if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

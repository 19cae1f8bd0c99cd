//! # Archetype Storage
//!
//! Entities with the same component set are stored together, one densely
//! packed column per component:
//!
//! ```text
//! Archetype {Mesh, Transform}:
//!   Mesh[]:      [M0, M1, M2, ...]   <- own arena
//!   Transform[]: [T0, T1, T2, ...]   <- own arena
//! ```
//!
//! Row `r` of every column belongs to the same entity. Each column reserves
//! its address range up front, so appending a row never moves existing data
//! and column slices handed to systems are plain contiguous bytes.

use bytemuck::Pod;

use super::component::{Component, EntitySignature};
use crate::error::{ArenaError, EcsError, EcsResult};
use crate::memory::Arena;

/// One component's data for every entity of an archetype.
pub struct Column {
    component: Component,
    element_size: usize,
    storage: Arena,
}

impl Column {
    fn new(
        component: Component,
        element_size: usize,
        reserve: usize,
        commit: usize,
    ) -> Result<Self, ArenaError> {
        Ok(Self {
            component,
            element_size,
            storage: Arena::new(reserve, commit)?,
        })
    }

    /// Returns the component stored in this column.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> Component {
        self.component
    }

    /// Returns the size of one element in bytes.
    #[inline]
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.element_size
    }

    /// Returns the whole column, `len * element_size` bytes.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.storage.as_bytes()
    }

    /// Returns the whole column mutably.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.storage.as_bytes_mut()
    }

    /// Returns the bytes of one row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        let start = row.checked_mul(self.element_size)?;
        self.bytes().get(start..start + self.element_size)
    }

    /// Returns the bytes of one row mutably.
    pub fn row_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        let start = row.checked_mul(self.element_size)?;
        let size = self.element_size;
        self.bytes_mut().get_mut(start..start + size)
    }

    /// Views the column as typed elements.
    ///
    /// Returns `None` if `T` does not match the element size or alignment.
    #[must_use]
    pub fn as_slice<T: Pod>(&self) -> Option<&[T]> {
        if std::mem::size_of::<T>() != self.element_size {
            return None;
        }
        bytemuck::try_cast_slice(self.bytes()).ok()
    }

    /// Views the column as typed elements, mutably.
    pub fn as_slice_mut<T: Pod>(&mut self) -> Option<&mut [T]> {
        if std::mem::size_of::<T>() != self.element_size {
            return None;
        }
        bytemuck::try_cast_slice_mut(self.bytes_mut()).ok()
    }

    /// Fails unless one more element fits in the reservation.
    fn ensure_room(&self) -> Result<(), ArenaError> {
        if self.storage.remaining() < self.element_size {
            return Err(ArenaError::ReservationExceeded {
                requested: self.element_size,
                cursor: self.storage.used(),
                reserved: self.storage.reserved(),
            });
        }
        Ok(())
    }

    fn push(&mut self, data: &[u8]) -> Result<(), ArenaError> {
        debug_assert_eq!(data.len(), self.element_size);
        self.storage.alloc(self.element_size)?.copy_from_slice(data);
        Ok(())
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("component", &self.component.index())
            .field("element_size", &self.element_size)
            .field("storage", &self.storage)
            .finish()
    }
}

/// All entities sharing one component signature.
#[derive(Debug)]
pub struct Archetype {
    signature: EntitySignature,
    /// Sorted by component index.
    columns: Vec<Column>,
    len: usize,
}

impl Archetype {
    /// Creates the column-less archetype for entities without components.
    pub(crate) fn empty() -> Self {
        Self {
            signature: EntitySignature::EMPTY,
            columns: Vec::new(),
            len: 0,
        }
    }

    /// Creates an archetype with one column per `(component, size)` pair.
    ///
    /// `layout` must be sorted by component index.
    ///
    /// # Errors
    ///
    /// Propagates arena construction failures.
    pub(crate) fn new(
        signature: EntitySignature,
        layout: &[(Component, usize)],
        reserve: usize,
        commit: usize,
    ) -> Result<Self, ArenaError> {
        debug_assert!(layout.windows(2).all(|pair| pair[0].0 < pair[1].0));

        let columns = layout
            .iter()
            .map(|&(component, size)| Column::new(component, size, reserve, commit))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            signature,
            columns,
            len: 0,
        })
    }

    /// Returns the component signature.
    #[inline]
    #[must_use]
    pub const fn signature(&self) -> EntitySignature {
        self.signature
    }

    /// Returns the number of entities stored.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the columns, sorted by component index.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// Returns the position of a component's column.
    #[must_use]
    pub fn column_position(&self, component: Component) -> Option<usize> {
        self.columns
            .binary_search_by_key(&component, Column::component)
            .ok()
    }

    /// Returns a component's column.
    #[must_use]
    pub fn column(&self, component: Component) -> Option<&Column> {
        self.column_position(component).map(|i| &self.columns[i])
    }

    /// Returns a component's column mutably.
    pub fn column_mut(&mut self, component: Component) -> Option<&mut Column> {
        let position = self.column_position(component)?;
        Some(&mut self.columns[position])
    }

    /// Fails unless every column can take one more row.
    pub(crate) fn ensure_room(&self) -> Result<(), ArenaError> {
        self.columns.iter().try_for_each(Column::ensure_room)
    }

    /// Appends one row and returns its index.
    ///
    /// `components` and `datas` are parallel lists naming exactly this
    /// archetype's components, in any order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if a column has no payload, or
    /// an arena error if a column is full. Nothing is written on error.
    pub(crate) fn push_row(
        &mut self,
        components: &[Component],
        datas: &[&[u8]],
    ) -> EcsResult<usize> {
        debug_assert_eq!(components.len(), self.columns.len());

        for column in &self.columns {
            column.ensure_room()?;
            if !components.contains(&column.component) {
                return Err(EcsError::MissingComponent(column.component.index()));
            }
        }

        for column in &mut self.columns {
            let source = components
                .iter()
                .position(|&c| c == column.component)
                .ok_or(EcsError::MissingComponent(column.component.index()))?;
            column.push(datas[source])?;
        }

        let row = self.len;
        self.len += 1;
        Ok(row)
    }
}

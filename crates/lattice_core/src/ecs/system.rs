//! # System Scheduler
//!
//! A system names up to eight components and is handed, once per run, the
//! matching column slices of every archetype that passes its filter.
//!
//! ## Frame Data
//!
//! Matches are first written as fixed-size records into a caller-supplied
//! frame arena, then resolved into borrowed column slices. The arena is
//! never reset here; clear it at the frame boundary.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use super::archetype::Archetype;
use super::component::{Component, EntitySignature, MAX_SYSTEM_COMPONENT_TYPE_COUNT};
use crate::error::EcsResult;
use crate::memory::Arena;

/// Column position marking "archetype has no such column".
const NO_COLUMN: u32 = u32::MAX;

/// A unit of per-frame logic over component columns.
///
/// # Example
///
/// ```rust,ignore
/// struct Gravity {
///     components: [Component; 1],
/// }
///
/// impl EntitySystem for Gravity {
///     fn components(&self) -> &[Component] {
///         &self.components
///     }
///
///     fn update(&mut self, updates: &mut UpdateSet<'_>) {
///         for array in updates.arrays_mut() {
///             if let Some(velocities) = array.column_as_mut::<Velocity>(0) {
///                 velocities.iter_mut().for_each(|v| v.y -= 9.81);
///             }
///         }
///     }
/// }
/// ```
pub trait EntitySystem {
    /// Required components, in the order columns are handed to `update`.
    fn components(&self) -> &[Component];

    /// Decides whether an archetype participates.
    ///
    /// Defaults to "has every required component". An override that admits
    /// an archetype lacking a required component receives an empty slice in
    /// that position.
    fn filter(&self, signature: EntitySignature) -> bool {
        signature.contains_all(EntitySignature::from_components(self.components()))
    }

    /// Processes all matched archetypes of one run.
    fn update(&mut self, updates: &mut UpdateSet<'_>);
}

/// Adapts a closure into an [`EntitySystem`] with the default filter.
pub struct FnSystem<F> {
    components: Vec<Component>,
    update: F,
}

impl<F> FnSystem<F> {
    /// Creates a system requiring `components` that runs `update`.
    pub fn new(components: &[Component], update: F) -> Self
    where
        F: FnMut(&mut UpdateSet<'_>),
    {
        Self {
            components: components.to_vec(),
            update,
        }
    }
}

impl<F> EntitySystem for FnSystem<F>
where
    F: FnMut(&mut UpdateSet<'_>),
{
    fn components(&self) -> &[Component] {
        &self.components
    }

    fn update(&mut self, updates: &mut UpdateSet<'_>) {
        (self.update)(updates);
    }
}

/// One matched archetype's columns, in the system's component order.
pub struct UpdateArray<'a> {
    archetype: usize,
    len: usize,
    slot_count: usize,
    columns: [&'a mut [u8]; MAX_SYSTEM_COMPONENT_TYPE_COUNT],
}

impl<'a> UpdateArray<'a> {
    /// Returns the index of the archetype the columns belong to.
    #[inline]
    #[must_use]
    pub const fn archetype(&self) -> usize {
        self.archetype
    }

    /// Returns the number of entities (rows) in every column.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the archetype holds no entities.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bytes of the column for required component `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not below the system's component count.
    #[inline]
    #[must_use]
    pub fn column(&self, slot: usize) -> &[u8] {
        &*self.columns[..self.slot_count][slot]
    }

    /// Returns the bytes of the column for required component `slot`,
    /// mutably.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not below the system's component count.
    #[inline]
    pub fn column_mut(&mut self, slot: usize) -> &mut [u8] {
        &mut *self.columns[..self.slot_count][slot]
    }

    /// Returns every column at once, for disjoint mutable access.
    ///
    /// ```rust,ignore
    /// if let [positions, velocities] = array.columns_mut() {
    ///     // both borrowed mutably
    /// }
    /// ```
    #[inline]
    pub fn columns_mut(&mut self) -> &mut [&'a mut [u8]] {
        &mut self.columns[..self.slot_count]
    }

    /// Views column `slot` as typed elements.
    ///
    /// Returns `None` if the slot is out of range or `T` does not fit the
    /// column's size or alignment.
    #[must_use]
    pub fn column_as<T: Pod>(&self, slot: usize) -> Option<&[T]> {
        let bytes: &[u8] = self.columns[..self.slot_count].get(slot)?;
        if bytes.len() != self.len * size_of::<T>() {
            return None;
        }
        bytemuck::try_cast_slice(bytes).ok()
    }

    /// Views column `slot` as typed elements, mutably.
    pub fn column_as_mut<T: Pod>(&mut self, slot: usize) -> Option<&mut [T]> {
        let len = self.len;
        let bytes: &mut [u8] = self.columns[..self.slot_count].get_mut(slot)?;
        if bytes.len() != len * size_of::<T>() {
            return None;
        }
        bytemuck::try_cast_slice_mut(bytes).ok()
    }

    fn gather(record: UpdateRecord, archetype: &'a mut Archetype, slot_count: usize) -> Self {
        let mut slots: [Option<&'a mut [u8]>; MAX_SYSTEM_COMPONENT_TYPE_COUNT] =
            std::array::from_fn(|_| None);

        for (position, column) in archetype.columns_mut().iter_mut().enumerate() {
            let wanted = record.columns[..slot_count]
                .iter()
                .position(|&p| p != NO_COLUMN && p as usize == position);
            if let Some(slot) = wanted {
                slots[slot] = Some(column.bytes_mut());
            }
        }

        Self {
            archetype: record.archetype as usize,
            len: record.len as usize,
            slot_count,
            columns: slots.map(Option::unwrap_or_default),
        }
    }
}

/// Everything one system sees during a run.
pub struct UpdateSet<'a> {
    arrays: Vec<UpdateArray<'a>>,
}

impl<'a> UpdateSet<'a> {
    /// Returns the matched archetypes.
    #[inline]
    #[must_use]
    pub fn arrays(&self) -> &[UpdateArray<'a>] {
        &self.arrays
    }

    /// Returns the matched archetypes mutably.
    #[inline]
    pub fn arrays_mut(&mut self) -> &mut [UpdateArray<'a>] {
        &mut self.arrays
    }

    /// Returns the number of matched archetypes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Checks if nothing matched.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Returns the entity count summed over all matched archetypes.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.arrays.iter().map(UpdateArray::len).sum()
    }
}

/// A match as laid out in the frame arena.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct UpdateRecord {
    archetype: u32,
    len: u32,
    columns: [u32; MAX_SYSTEM_COMPONENT_TYPE_COUNT],
}

/// Runs every system once, in registration order.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn run_systems(
    systems: &mut [Box<dyn EntitySystem>],
    archetypes: &mut [Archetype],
    frame: &mut Arena,
) -> EcsResult<()> {
    const RECORD_SIZE: usize = size_of::<UpdateRecord>();

    for (index, system) in systems.iter_mut().enumerate() {
        let matched = archetypes
            .iter()
            .filter(|a| system.filter(a.signature()))
            .count();
        if matched == 0 {
            tracing::trace!(system = index, "no matching archetypes");
            continue;
        }

        let required = system.components();
        let slot_count = required.len();
        let block = frame.alloc(matched * RECORD_SIZE)?;

        let matches = archetypes
            .iter()
            .enumerate()
            .filter(|(_, a)| system.filter(a.signature()));
        let records = block.chunks_exact_mut(RECORD_SIZE);
        for ((archetype_index, archetype), chunk) in matches.zip(records) {
            let mut record = UpdateRecord {
                archetype: archetype_index as u32,
                len: archetype.len() as u32,
                columns: [NO_COLUMN; MAX_SYSTEM_COMPONENT_TYPE_COUNT],
            };
            for (slot, &component) in required.iter().enumerate() {
                if let Some(position) = archetype.column_position(component) {
                    record.columns[slot] = position as u32;
                }
            }
            chunk.copy_from_slice(bytemuck::bytes_of(&record));
        }

        let mut candidates = archetypes.iter_mut().enumerate();
        let mut arrays = Vec::with_capacity(matched);
        for chunk in block.chunks_exact(RECORD_SIZE) {
            let record: UpdateRecord = bytemuck::pod_read_unaligned(chunk);
            let target = record.archetype as usize;
            if let Some((_, archetype)) = candidates.find(|(i, _)| *i == target) {
                arrays.push(UpdateArray::gather(record, archetype, slot_count));
            }
        }

        let mut updates = UpdateSet { arrays };
        tracing::trace!(
            system = index,
            archetypes = updates.len(),
            entities = updates.entity_count(),
            "running system"
        );
        system.update(&mut updates);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(size_of::<UpdateRecord>(), 40);
    }

    #[test]
    fn test_default_filter_is_superset() {
        let a = Component::from_index(0);
        let b = Component::from_index(1);
        let system = FnSystem::new(&[b], |_| {});

        assert!(system.filter(EntitySignature::from_components(&[a, b])));
        assert!(system.filter(EntitySignature::from_components(&[b])));
        assert!(!system.filter(EntitySignature::from_components(&[a])));
    }

    #[test]
    fn test_columns_follow_required_order() {
        let a = Component::from_index(0);
        let b = Component::from_index(1);
        let mut archetype = Archetype::new(
            EntitySignature::from_components(&[a, b]),
            &[(a, 1), (b, 2)],
            4096,
            0,
        )
        .unwrap();
        archetype.push_row(&[a, b], &[&[1], &[2, 2]]).unwrap();

        let mut record = UpdateRecord::zeroed();
        record.len = 1;
        record.columns[0] = 1;
        record.columns[1] = 0;
        let array = UpdateArray::gather(record, &mut archetype, 2);

        assert_eq!(array.len(), 1);
        assert_eq!(array.column(0), &[2, 2]);
        assert_eq!(array.column(1), &[1]);
    }

    #[test]
    fn test_gather_exposes_only_required_slots() {
        let a = Component::from_index(0);
        let b = Component::from_index(1);
        let c = Component::from_index(2);
        let mut archetype = Archetype::new(
            EntitySignature::from_components(&[a, b, c]),
            &[(a, 1), (b, 1), (c, 4)],
            4096,
            0,
        )
        .unwrap();
        archetype
            .push_row(&[a, b, c], &[&[1], &[2], &[3; 4]])
            .unwrap();

        let mut record = UpdateRecord::zeroed();
        record.len = 1;
        record.columns = [NO_COLUMN; MAX_SYSTEM_COMPONENT_TYPE_COUNT];
        record.columns[0] = 2;
        let mut array = UpdateArray::gather(record, &mut archetype, 2);

        assert_eq!(array.columns_mut().len(), 2);
        assert_eq!(array.column(0), &[3; 4]);
        assert!(array.column(1).is_empty());
        assert!(array.column_as::<u8>(2).is_none());
    }

    #[test]
    #[should_panic]
    fn test_column_past_required_count_panics() {
        let a = Component::from_index(0);
        let mut archetype =
            Archetype::new(EntitySignature::from_components(&[a]), &[(a, 1)], 4096, 0).unwrap();
        archetype.push_row(&[a], &[&[1]]).unwrap();

        let mut record = UpdateRecord::zeroed();
        record.len = 1;
        let array = UpdateArray::gather(record, &mut archetype, 1);
        let _ = array.column(1);
    }
}

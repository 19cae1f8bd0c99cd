//! # Handle Pool
//!
//! Fixed-capacity slot table addressed by generation-checked handles.
//! Objects can be obtained and released individually; every release bumps
//! the slot's generation so that handles from before the release stop
//! resolving.

use bytemuck::{Pod, Zeroable};

use crate::error::PoolError;

/// Index value reserved for [`Handle::INVALID`].
pub const INVALID_HANDLE_INDEX: u16 = 0xFFFF;

/// Free-list terminator.
const NULL_INDEX: u32 = u32::MAX;

/// Recycle-safe reference to a slot in a [`HandlePool`].
///
/// Two handles are equal iff both index and generation match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Handle {
    index: u16,
    generation: u16,
}

impl Handle {
    /// Sentinel handle; never issued by a pool.
    pub const INVALID: Self = Self {
        index: INVALID_HANDLE_INDEX,
        generation: 0xFFFF,
    };

    /// Creates a handle from raw parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u16, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.index
    }

    /// Returns the generation the handle was issued at.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Checks if this is the sentinel handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == INVALID_HANDLE_INDEX
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A pool slot. While free, the slot is a node of the free list.
enum Slot<T> {
    Occupied(T),
    Free { next: u32 },
}

/// A pool of `T` addressed by [`Handle`]s.
///
/// Capacity is fixed at creation. Obtain and release are O(1) and never
/// allocate. Generations are 16 bits wide, the same as the handle field, so
/// a stale handle is detected until its slot has been reused 65 536 times.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: HandlePool<Texture> = HandlePool::new(256);
///
/// let handle = pool.obtain(texture)?;
/// let texture = pool.access(handle)?;
///
/// pool.release(handle)?;
/// assert!(pool.access(handle).is_err());
/// ```
pub struct HandlePool<T> {
    slots: Box<[Slot<T>]>,
    /// Live generation per slot.
    generations: Box<[u16]>,
    /// Head of the intrusive free list.
    free_head: u32,
    allocated_count: usize,
}

impl<T> HandlePool<T> {
    /// Creates a pool with `element_count` slots, all free.
    ///
    /// # Panics
    ///
    /// Panics if `element_count` is zero or not below `0xFFFF`.
    #[must_use]
    pub fn new(element_count: usize) -> Self {
        assert!(element_count > 0, "Capacity must be greater than zero");
        assert!(
            element_count < usize::from(INVALID_HANDLE_INDEX),
            "Capacity must be below {INVALID_HANDLE_INDEX}"
        );

        #[allow(clippy::cast_possible_truncation)]
        let slots: Vec<Slot<T>> = (0..element_count)
            .map(|i| Slot::Free {
                next: if i + 1 < element_count {
                    (i + 1) as u32
                } else {
                    NULL_INDEX
                },
            })
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            generations: vec![0; element_count].into_boxed_slice(),
            free_head: 0,
            allocated_count: 0,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.allocated_count
    }

    /// Pops the free-list head, stores `value` there and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] if every slot is occupied.
    #[allow(clippy::cast_possible_truncation)]
    pub fn obtain(&mut self, value: T) -> Result<Handle, PoolError> {
        if self.free_head == NULL_INDEX {
            return Err(PoolError::Exhausted {
                capacity: self.capacity(),
            });
        }

        let index = self.free_head as usize;
        let next = match self.slots[index] {
            Slot::Free { next } => next,
            Slot::Occupied(_) => panic!("free list points at occupied slot {index}"),
        };

        self.slots[index] = Slot::Occupied(value);
        self.free_head = next;
        self.allocated_count += 1;

        Ok(Handle::new(index as u16, self.generations[index]))
    }

    /// Resolves a handle to its data.
    ///
    /// # Errors
    ///
    /// [`PoolError::NullHandle`] for the sentinel, [`PoolError::StaleHandle`]
    /// if the slot has been released since the handle was issued.
    pub fn access(&self, handle: Handle) -> Result<&T, PoolError> {
        let index = self.validate(handle)?;
        match &self.slots[index] {
            Slot::Occupied(value) => Ok(value),
            Slot::Free { .. } => Err(PoolError::Vacant(handle.index)),
        }
    }

    /// Resolves a handle to its data mutably.
    ///
    /// # Errors
    ///
    /// Same as [`HandlePool::access`].
    pub fn access_mut(&mut self, handle: Handle) -> Result<&mut T, PoolError> {
        let index = self.validate(handle)?;
        match &mut self.slots[index] {
            Slot::Occupied(value) => Ok(value),
            Slot::Free { .. } => Err(PoolError::Vacant(handle.index)),
        }
    }

    /// Checks whether a handle currently resolves.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.access(handle).is_ok()
    }

    /// Releases the slot, bumping its generation, and returns the data.
    ///
    /// # Errors
    ///
    /// Same as [`HandlePool::access`]; a double release is reported as
    /// [`PoolError::StaleHandle`].
    pub fn release(&mut self, handle: Handle) -> Result<T, PoolError> {
        let index = self.validate(handle)?;
        if matches!(self.slots[index], Slot::Free { .. }) {
            return Err(PoolError::Vacant(handle.index));
        }

        let freed = std::mem::replace(
            &mut self.slots[index],
            Slot::Free {
                next: self.free_head,
            },
        );
        let Slot::Occupied(value) = freed else {
            unreachable!("slot {index} checked occupied above");
        };

        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free_head = u32::from(handle.index);
        self.allocated_count -= 1;

        Ok(value)
    }

    /// Iterates over all occupied slots with their live handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots
            .iter()
            .zip(self.generations.iter())
            .enumerate()
            .filter_map(|(index, (slot, &generation))| match slot {
                #[allow(clippy::cast_possible_truncation)]
                Slot::Occupied(value) => Some((Handle::new(index as u16, generation), value)),
                Slot::Free { .. } => None,
            })
    }

    fn validate(&self, handle: Handle) -> Result<usize, PoolError> {
        if handle.is_null() {
            return Err(PoolError::NullHandle);
        }

        let index = usize::from(handle.index);
        let Some(&live) = self.generations.get(index) else {
            return Err(PoolError::OutOfRange {
                index: handle.index,
                capacity: self.capacity(),
            });
        };

        if live != handle.generation {
            return Err(PoolError::StaleHandle {
                index: handle.index,
                stale: handle.generation,
                live,
            });
        }

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_obtain_release() {
        let mut pool: HandlePool<u32> = HandlePool::new(10);

        let h1 = pool.obtain(42).unwrap();
        assert_eq!(*pool.access(h1).unwrap(), 42);
        assert_eq!(pool.allocated_count(), 1);

        let freed = pool.release(h1).unwrap();
        assert_eq!(freed, 42);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_pool_full() {
        let mut pool: HandlePool<u8> = HandlePool::new(2);

        pool.obtain(1).unwrap();
        pool.obtain(2).unwrap();
        assert_eq!(
            pool.obtain(3).unwrap_err(),
            PoolError::Exhausted { capacity: 2 }
        );
    }

    #[test]
    fn test_free_list_is_ascending() {
        let mut pool: HandlePool<u8> = HandlePool::new(4);
        let indices: Vec<u16> = (0..4).map(|i| pool.obtain(i).unwrap().index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_stale_handle_rejected_after_reuse() {
        let mut pool: HandlePool<u32> = HandlePool::new(4);

        let h0 = pool.obtain(1).unwrap();
        assert_eq!(h0, Handle::new(0, 0));
        pool.release(h0).unwrap();

        let h1 = pool.obtain(2).unwrap();
        assert_eq!(h1, Handle::new(0, 1));

        assert_eq!(
            pool.access(h0).unwrap_err(),
            PoolError::StaleHandle {
                index: 0,
                stale: 0,
                live: 1,
            }
        );
        assert_eq!(*pool.access(h1).unwrap(), 2);
    }

    #[test]
    fn test_double_release_rejected() {
        let mut pool: HandlePool<u32> = HandlePool::new(4);
        let h = pool.obtain(7).unwrap();
        pool.release(h).unwrap();
        assert!(matches!(
            pool.release(h),
            Err(PoolError::StaleHandle { .. })
        ));
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn test_null_and_out_of_range_handles() {
        let mut pool: HandlePool<u32> = HandlePool::new(4);
        assert_eq!(pool.access(Handle::INVALID).unwrap_err(), PoolError::NullHandle);
        assert!(matches!(
            pool.access(Handle::new(9, 0)),
            Err(PoolError::OutOfRange { index: 9, .. })
        ));
        assert_eq!(pool.access_mut(Handle::new(2, 0)).unwrap_err(), PoolError::Vacant(2));
    }

    #[test]
    fn test_generation_wraps_after_full_cycle() {
        let mut pool: HandlePool<()> = HandlePool::new(1);
        let first = pool.obtain(()).unwrap();
        let mut handle = first;

        for _ in 0..u32::from(u16::MAX) {
            pool.release(handle).unwrap();
            handle = pool.obtain(()).unwrap();
            assert!(!pool.is_valid(first));
        }

        // The 65 536th reuse lands on the starting generation again.
        pool.release(handle).unwrap();
        let wrapped = pool.obtain(()).unwrap();
        assert_eq!(wrapped, first);
    }

    #[test]
    fn test_iter_yields_live_handles() {
        let mut pool: HandlePool<char> = HandlePool::new(3);
        let a = pool.obtain('a').unwrap();
        let b = pool.obtain('b').unwrap();
        pool.release(a).unwrap();

        let live: Vec<(Handle, char)> = pool.iter().map(|(h, &c)| (h, c)).collect();
        assert_eq!(live, vec![(b, 'b')]);
    }
}

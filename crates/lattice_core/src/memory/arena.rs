//! # Arena Allocator
//!
//! A bump allocator over a reserved address range. The range is reserved up
//! front and committed lazily: committed size doubles as the cursor advances
//! and halves again once usage falls to a quarter of it.

use crate::error::ArenaError;

/// Granularity of commitment, and the floor below which the arena never
/// decommits.
pub const PAGE_SIZE: usize = 4 * 1024;

/// A reserve/commit bump-pointer arena.
///
/// The backing buffer is reserved once at construction and never moves, so
/// byte ranges handed out stay at the same address for the arena's lifetime.
/// Only the committed prefix is initialized memory.
///
/// Invariant: `0 <= used <= committed <= reserved`.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = Arena::new(512 * 1024 * 1024, 1024 * 1024)?;
///
/// let bytes = arena.alloc(48)?;
/// bytes.copy_from_slice(&payload);
///
/// // Frame boundary
/// arena.clear_memory();
/// ```
pub struct Arena {
    /// Reserved buffer; its length is the committed size.
    storage: Vec<u8>,
    /// Current allocation offset.
    cursor: usize,
    /// Hard upper bound on the committed size.
    reserved: usize,
}

impl Arena {
    /// Reserves `reserve` bytes and commits the first `initial_commit`.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::CommitExceedsReservation`] if
    /// `initial_commit > reserve`, and [`ArenaError::ReservationFailed`] if
    /// the address range cannot be reserved.
    pub fn new(reserve: usize, initial_commit: usize) -> Result<Self, ArenaError> {
        if initial_commit > reserve {
            return Err(ArenaError::CommitExceedsReservation {
                reserve,
                commit: initial_commit,
            });
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(reserve)
            .map_err(|_| ArenaError::ReservationFailed { reserve })?;
        storage.resize(initial_commit, 0);

        Ok(Self {
            storage,
            cursor: 0,
            reserved: reserve,
        })
    }

    /// Returns the reserved size in bytes.
    #[inline]
    #[must_use]
    pub const fn reserved(&self) -> usize {
        self.reserved
    }

    /// Returns the committed size in bytes.
    #[inline]
    #[must_use]
    pub fn committed(&self) -> usize {
        self.storage.len()
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.cursor
    }

    /// Returns the bytes still available before the reservation runs out.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.reserved - self.cursor
    }

    /// Allocates `size` bytes at the cursor.
    ///
    /// Commits more of the reservation first if needed, doubling the
    /// committed size (capped at the reservation) until the request fits.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ReservationExceeded`] if the request would run
    /// past the reserved size. The reservation is a construction-time
    /// contract, so callers generally treat this as fatal.
    pub fn alloc(&mut self, size: usize) -> Result<&mut [u8], ArenaError> {
        let end = self
            .cursor
            .checked_add(size)
            .filter(|&end| end <= self.reserved)
            .ok_or(ArenaError::ReservationExceeded {
                requested: size,
                cursor: self.cursor,
                reserved: self.reserved,
            })?;

        if end > self.storage.len() {
            self.commit(end);
        }

        let start = self.cursor;
        self.cursor = end;
        Ok(&mut self.storage[start..end])
    }

    /// Rewinds the cursor by `size` bytes.
    ///
    /// Once the cursor is at or below a quarter of the committed size, the
    /// upper half of the commitment is released. The gap between the two
    /// thresholds keeps alternating alloc/free from thrashing.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds the bytes currently allocated.
    pub fn free(&mut self, size: usize) {
        assert!(
            size <= self.cursor,
            "freed {size} bytes but only {} are allocated",
            self.cursor
        );
        self.cursor -= size;

        let committed = self.storage.len();
        if committed > PAGE_SIZE && self.cursor <= committed / 4 {
            let half = committed / 2;
            self.storage.truncate(half);
            tracing::trace!(from = committed, to = half, "arena decommit");
        }
    }

    /// Resets the cursor to zero and zero-fills all committed bytes.
    pub fn clear_memory(&mut self) {
        self.storage.fill(0);
        self.cursor = 0;
    }

    /// Returns the allocated bytes, `[0, used)`.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[..self.cursor]
    }

    /// Returns the allocated bytes mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.storage[..self.cursor]
    }

    /// Grows the commitment until `required` bytes are committed.
    fn commit(&mut self, required: usize) {
        let committed = self.storage.len();
        let mut target = committed.max(PAGE_SIZE);
        while target < required {
            target = target.saturating_mul(2);
        }
        let target = target.min(self.reserved);

        // Within the reserved capacity: never reallocates.
        self.storage.resize(target, 0);
        tracing::trace!(from = committed, to = target, "arena commit");
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("used", &self.cursor)
            .field("committed", &self.storage.len())
            .field("reserved", &self.reserved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_allocation() {
        let mut arena = Arena::new(64 * 1024, PAGE_SIZE).unwrap();
        let bytes = arena.alloc(10).unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(arena.used(), 10);
        assert_eq!(arena.committed(), PAGE_SIZE);
    }

    #[test]
    fn test_commit_doubles_until_request_fits() {
        let mut arena = Arena::new(64 * 1024, PAGE_SIZE).unwrap();

        arena.alloc(5000).unwrap();
        assert_eq!(arena.committed(), 2 * PAGE_SIZE);

        arena.alloc(10_000).unwrap();
        assert_eq!(arena.committed(), 4 * PAGE_SIZE);
    }

    #[test]
    fn test_commit_capped_at_reservation() {
        let mut arena = Arena::new(10_000, 0).unwrap();
        arena.alloc(9_000).unwrap();
        assert_eq!(arena.committed(), 10_000);
        assert!(arena.committed() <= arena.reserved());
    }

    #[test]
    fn test_alloc_past_reservation_fails() {
        let mut arena = Arena::new(PAGE_SIZE, PAGE_SIZE).unwrap();
        arena.alloc(PAGE_SIZE - 1).unwrap();

        let err = arena.alloc(2).unwrap_err();
        assert_eq!(
            err,
            ArenaError::ReservationExceeded {
                requested: 2,
                cursor: PAGE_SIZE - 1,
                reserved: PAGE_SIZE,
            }
        );
        assert_eq!(arena.used(), PAGE_SIZE - 1);
    }

    #[test]
    fn test_unreservable_range_is_an_error() {
        assert_eq!(
            Arena::new(usize::MAX, 0).unwrap_err(),
            ArenaError::ReservationFailed { reserve: usize::MAX }
        );
    }

    #[test]
    fn test_commit_larger_than_reserve_rejected() {
        assert!(Arena::new(10, 20).is_err());
    }

    #[test]
    fn test_free_decommits_with_hysteresis() {
        let mut arena = Arena::new(64 * 1024, PAGE_SIZE).unwrap();
        arena.alloc(15_000).unwrap();
        assert_eq!(arena.committed(), 16 * 1024);

        // 6000 > 16K / 4: still committed.
        arena.free(9_000);
        assert_eq!(arena.committed(), 16 * 1024);

        // 1000 <= 16K / 4: upper half released.
        arena.free(5_000);
        assert_eq!(arena.used(), 1_000);
        assert_eq!(arena.committed(), 8 * 1024);
    }

    #[test]
    fn test_recommitted_memory_is_zeroed() {
        let mut arena = Arena::new(64 * 1024, PAGE_SIZE).unwrap();
        arena.alloc(15_000).unwrap().fill(0xAB);
        arena.free(15_000);

        let bytes = arena.alloc(15_000).unwrap();
        assert!(bytes[8 * 1024..].iter().all(|&b| b == 0));
    }

    #[test]
    #[should_panic(expected = "only 4 are allocated")]
    fn test_free_more_than_allocated_panics() {
        let mut arena = Arena::new(PAGE_SIZE, PAGE_SIZE).unwrap();
        arena.alloc(4).unwrap();
        arena.free(5);
    }

    #[test]
    fn test_clear_memory() {
        let mut arena = Arena::new(PAGE_SIZE, PAGE_SIZE).unwrap();
        arena.alloc(16).unwrap().fill(7);
        assert!(arena.used() > 0);

        arena.clear_memory();
        assert_eq!(arena.used(), 0);
        assert!(arena.alloc(16).unwrap().iter().all(|&b| b == 0));
    }
}

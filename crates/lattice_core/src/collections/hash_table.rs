//! # Robin Hood Hash Table
//!
//! Open-addressing map with linear probing. Insertion steals slots from
//! residents that sit closer to their home slot than the incoming entry
//! ("Robin Hood"), which keeps probe lengths even. Deletion shifts the
//! following run back by one instead of leaving tombstones.
//!
//! ```text
//! home = hash % capacity
//!
//! slot:      [ 5 ][ 6 ][ 7 ][ 0 ][ 1 ]
//! distance:    0    1    1    2    0
//!                         ^ wraps to slot 0
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::memory::Handle;

/// Capacity used by [`HashTable::new`].
pub const DEFAULT_CAPACITY: usize = 4096;

/// Load factor above which the table doubles.
pub const MAX_LOAD_FACTOR: f32 = 0.75;

/// Keys the table can hash.
///
/// Fixed-size keys hash their little-endian bytes; string keys hash a
/// length prefix followed by their bytes. `String` and `str` hash
/// identically so owned keys can be looked up by slice.
pub trait TableKey {
    /// Returns the 64-bit hash of the key.
    fn hash64(&self) -> u64;
}

#[inline]
fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(bytes);
    hasher.finish()
}

macro_rules! fixed_size_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TableKey for $ty {
                #[inline]
                fn hash64(&self) -> u64 {
                    hash_bytes(&self.to_le_bytes())
                }
            }
        )*
    };
}

fixed_size_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl TableKey for Handle {
    #[inline]
    fn hash64(&self) -> u64 {
        hash_bytes(bytemuck::bytes_of(self))
    }
}

impl TableKey for str {
    fn hash64(&self) -> u64 {
        let mut hasher = SipHasher13::new();
        hasher.write(&(self.len() as u64).to_le_bytes());
        hasher.write(self.as_bytes());
        hasher.finish()
    }
}

impl TableKey for String {
    #[inline]
    fn hash64(&self) -> u64 {
        self.as_str().hash64()
    }
}

impl<T: TableKey + ?Sized> TableKey for &T {
    #[inline]
    fn hash64(&self) -> u64 {
        (**self).hash64()
    }
}

struct Bucket<K, V> {
    /// Distance from the home slot.
    probe_distance: u32,
    hash: u64,
    key: K,
    value: V,
}

/// Robin Hood hash map.
///
/// The load factor never exceeds [`MAX_LOAD_FACTOR`] once a call returns,
/// so at least one slot is always empty and every probe loop terminates.
/// The table never shrinks.
///
/// # Example
///
/// ```rust,ignore
/// let mut table: HashTable<String, u32> = HashTable::with_capacity(512);
/// table.set("Transform".to_owned(), 0);
/// assert_eq!(table.get("Transform"), Some(&0));
/// ```
pub struct HashTable<K, V> {
    slots: Vec<Option<Bucket<K, V>>>,
    len: usize,
}

impl<K: TableKey + Eq, V> HashTable<K, V> {
    /// Creates a table with [`DEFAULT_CAPACITY`] slots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a table with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self {
            slots: empty_slots(capacity),
            len: 0,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns `len / capacity`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.slots.len() as f32
    }

    /// Inserts or overwrites. Returns the previous value for the key.
    ///
    /// Doubles the table when the insertion pushes the load factor past
    /// [`MAX_LOAD_FACTOR`].
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let hash = key.hash64();

        if let Some(index) = self.find(hash, &key) {
            if let Some(bucket) = self.slots[index].as_mut() {
                return Some(std::mem::replace(&mut bucket.value, value));
            }
        }

        self.place(Bucket {
            probe_distance: 0,
            hash,
            key,
            value,
        });
        self.len += 1;

        // len / capacity > 3 / 4
        if self.len * 4 > self.slots.len() * 3 {
            self.grow();
        }

        None
    }

    /// Looks up a key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: TableKey + Eq + ?Sized,
    {
        let index = self.find(key.hash64(), key)?;
        self.slots[index].as_ref().map(|bucket| &bucket.value)
    }

    /// Looks up a key mutably.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: TableKey + Eq + ?Sized,
    {
        let index = self.find(key.hash64(), key)?;
        self.slots[index].as_mut().map(|bucket| &mut bucket.value)
    }

    /// Checks whether the key is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: TableKey + Eq + ?Sized,
    {
        self.find(key.hash64(), key).is_some()
    }

    /// Removes a key, returning its value.
    ///
    /// The run after the vacated slot is shifted back one slot for as long
    /// as its entries sit away from home, so lookups never cross a hole.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: TableKey + Eq + ?Sized,
    {
        let mut index = self.find(key.hash64(), key)?;
        let removed = self.slots[index].take()?;
        let capacity = self.slots.len();

        // Every index is reduced modulo capacity, and the table always has an
        // empty slot, so the shift stops before revisiting the vacated slot.
        loop {
            let next = (index + 1) % capacity;
            match self.slots[next].take() {
                Some(mut bucket) if bucket.probe_distance > 0 => {
                    bucket.probe_distance -= 1;
                    self.slots[index] = Some(bucket);
                    index = next;
                }
                other => {
                    self.slots[next] = other;
                    break;
                }
            }
        }

        self.len -= 1;
        Some(removed.value)
    }

    /// Iterates over all entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .flatten()
            .map(|bucket| (&bucket.key, &bucket.value))
    }

    fn find<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let capacity = self.slots.len();
        let mut index = home_slot(hash, capacity);
        let mut distance = 0u32;

        while let Some(bucket) = &self.slots[index] {
            // A resident closer to home than we are means the key would have
            // displaced it on insertion.
            if bucket.probe_distance < distance {
                return None;
            }
            if bucket.hash == hash && <K as Borrow<Q>>::borrow(&bucket.key) == key {
                return Some(index);
            }
            index = (index + 1) % capacity;
            distance += 1;
        }

        None
    }

    /// Inserts a bucket whose key is known to be absent.
    fn place(&mut self, mut bucket: Bucket<K, V>) {
        let capacity = self.slots.len();
        let mut index = home_slot(bucket.hash, capacity);
        bucket.probe_distance = 0;

        loop {
            match self.slots[index].as_mut() {
                None => break,
                Some(resident) => {
                    if resident.probe_distance < bucket.probe_distance {
                        std::mem::swap(resident, &mut bucket);
                    }
                }
            }
            index = (index + 1) % capacity;
            bucket.probe_distance += 1;
        }

        self.slots[index] = Some(bucket);
    }

    fn grow(&mut self) {
        let old_capacity = self.slots.len();
        let new_capacity = old_capacity * 2;
        let old = std::mem::replace(&mut self.slots, empty_slots(new_capacity));

        for bucket in old.into_iter().flatten() {
            self.place(bucket);
        }

        tracing::debug!(
            from = old_capacity,
            to = new_capacity,
            len = self.len,
            "hash table doubled"
        );
    }
}

impl<K: TableKey + Eq, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TableKey + Eq + fmt::Debug, V: fmt::Debug> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn home_slot(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

fn empty_slots<K, V>(capacity: usize) -> Vec<Option<Bucket<K, V>>> {
    std::iter::repeat_with(|| None).take(capacity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that every resident's stored distance matches its position.
    fn assert_probe_distances<K: TableKey + Eq, V>(table: &HashTable<K, V>) {
        let capacity = table.capacity();
        for (index, slot) in table.slots.iter().enumerate() {
            if let Some(bucket) = slot {
                let home = home_slot(bucket.hash, capacity);
                let expected = (index + capacity - home) % capacity;
                assert_eq!(bucket.probe_distance as usize, expected, "slot {index}");
            }
        }
    }

    #[test]
    fn test_set_get_remove() {
        let mut table: HashTable<u32, u64> = HashTable::with_capacity(64);

        for key in 0..40u32 {
            assert_eq!(table.set(key, u64::from(key) * 10), None);
        }
        for key in 0..40u32 {
            assert_eq!(table.get(&key), Some(&(u64::from(key) * 10)));
        }

        assert_eq!(table.remove(&7), Some(70));
        assert_eq!(table.get(&7), None);
        assert_eq!(table.remove(&7), None);
        assert_eq!(table.len(), 39);

        for key in (0..40u32).filter(|&k| k != 7) {
            assert_eq!(table.get(&key), Some(&(u64::from(key) * 10)));
        }
        assert_probe_distances(&table);
    }

    #[test]
    fn test_set_overwrites() {
        let mut table: HashTable<u64, &str> = HashTable::with_capacity(8);
        assert_eq!(table.set(1, "one"), None);
        assert_eq!(table.set(1, "uno"), Some("one"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&1), Some(&"uno"));
    }

    #[test]
    fn test_load_factor_bound() {
        let mut table: HashTable<u64, u64> = HashTable::with_capacity(1);
        for key in 0..10_000u64 {
            table.set(key, key);
            assert!(table.load_factor() <= MAX_LOAD_FACTOR);
        }
        assert_eq!(table.len(), 10_000);
        assert_probe_distances(&table);
    }

    #[test]
    fn test_string_keys_lookup_by_str() {
        let mut table: HashTable<String, u32> = HashTable::with_capacity(16);
        table.set("Mesh".to_owned(), 0);
        table.set("Transform".to_owned(), 1);

        assert_eq!(table.get("Mesh"), Some(&0));
        assert_eq!(table.get("Transform"), Some(&1));
        assert!(!table.contains_key("Light"));
    }

    #[test]
    fn test_length_prefix_distinguishes_strings() {
        assert_ne!("ab".hash64(), "a".hash64());
        assert_eq!("Mesh".hash64(), "Mesh".to_owned().hash64());
    }

    #[test]
    fn test_remove_wraps_at_table_end() {
        const CAPACITY: usize = 16;

        // Keys whose home slot is the last slot of the table.
        let keys: Vec<u64> = (0..)
            .filter(|k: &u64| home_slot(k.hash64(), CAPACITY) == CAPACITY - 1)
            .take(3)
            .collect();

        let mut table: HashTable<u64, u64> = HashTable::with_capacity(CAPACITY);
        for &key in &keys {
            table.set(key, key + 1);
        }
        assert_eq!(table.capacity(), CAPACITY);
        assert_probe_distances(&table);

        // The run spans slots 15, 0, 1; removing from slot 15 shifts across
        // the wrap.
        assert_eq!(table.remove(&keys[0]), Some(keys[0] + 1));
        assert_probe_distances(&table);
        assert_eq!(table.get(&keys[1]), Some(&(keys[1] + 1)));
        assert_eq!(table.get(&keys[2]), Some(&(keys[2] + 1)));

        assert_eq!(table.remove(&keys[2]), Some(keys[2] + 1));
        assert_eq!(table.get(&keys[1]), Some(&(keys[1] + 1)));
        assert_eq!(table.len(), 1);
        assert_probe_distances(&table);
    }

    #[test]
    fn test_interleaved_insert_remove_keeps_invariant() {
        let mut table: HashTable<u32, u32> = HashTable::with_capacity(32);
        for round in 0..8u32 {
            for key in 0..20u32 {
                table.set(key + round * 100, key);
            }
            for key in (0..20u32).step_by(3) {
                assert_eq!(table.remove(&(key + round * 100)), Some(key));
            }
            assert_probe_distances(&table);
        }

        for round in 0..8u32 {
            for key in 0..20u32 {
                let expected = (key % 3 != 0).then_some(key);
                assert_eq!(table.get(&(key + round * 100)).copied(), expected);
            }
        }
    }

    #[test]
    fn test_handle_keys() {
        let mut table: HashTable<Handle, &str> = HashTable::with_capacity(8);
        table.set(Handle::new(0, 0), "first");
        table.set(Handle::new(0, 1), "second");
        assert_eq!(table.get(&Handle::new(0, 0)), Some(&"first"));
        assert_eq!(table.get(&Handle::new(0, 1)), Some(&"second"));
    }
}

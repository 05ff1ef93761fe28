//! Open-addressing hash table with linear probing and tombstone deletion.
//!
//! Hashing and key equality are supplied by a [`KeyHasher`] strategy so that
//! variable-length keys such as markings can be stored without relying on the
//! standard library's randomised hasher. Several entries may share one key
//! (see [`OpenTable::insert_multi`]); [`OpenTable::find_filter`] lets the
//! caller pick among them.
use std::collections::TryReserveError;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

pub const DEFAULT_CAPACITY: usize = 256;
const MIN_CAPACITY: usize = 8;

/// Hash and equality injected into an [`OpenTable`].
///
/// Implementations must keep the two consistent: keys that compare equal
/// must hash identically.
pub trait KeyHasher<K: ?Sized> {
    fn hash_key(&self, key: &K) -> u64;
    fn eq_keys(&self, left: &K, right: &K) -> bool;
}

/// Strategy for ordinary `Hash + Eq` keys. Deterministic across runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdKeys;

impl<K> KeyHasher<K> for StdKeys
where
    K: Hash + Eq + ?Sized,
{
    fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_keys(&self, left: &K, right: &K) -> bool {
        left == right
    }
}

enum Slot<K, V> {
    Empty,
    Occupied(Entry<K, V>),
    Deleted,
}

struct Entry<K, V> {
    hash: u64,
    key: K,
    value: V,
}

pub struct OpenTable<K, V, H = StdKeys> {
    slots: Vec<Slot<K, V>>,
    len: usize,
    /// Slots that have never held an entry since the last rehash.
    free: usize,
    hasher: H,
}

impl<K, V> OpenTable<K, V, StdKeys>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_hasher(StdKeys)
    }
}

impl<K, V> Default for OpenTable<K, V, StdKeys>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> OpenTable<K, V, H>
where
    H: KeyHasher<K>,
{
    pub fn with_hasher(hasher: H) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            slots: empty_slots(capacity),
            len: 0,
            free: capacity,
            hasher,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Inserts `key -> value` unless an equal key is already stored.
    ///
    /// Returns `Ok(false)` when the key was present; the table is unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool, TryReserveError> {
        self.reserve_one()?;
        let hash = self.hasher.hash_key(&key);
        if self.find_index(&key, hash, |_| true).is_some() {
            return Ok(false);
        }
        self.place(Entry { hash, key, value });
        Ok(true)
    }

    /// Inserts without checking for an equal key, so one key may map to
    /// several values.
    pub fn insert_multi(&mut self, key: K, value: V) -> Result<(), TryReserveError> {
        self.reserve_one()?;
        let hash = self.hasher.hash_key(&key);
        self.place(Entry { hash, key, value });
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_filter(key, |_| true)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hasher.hash_key(key);
        let idx = self.find_index(key, hash, |_| true)?;
        match &mut self.slots[idx] {
            Slot::Occupied(entry) => Some(&mut entry.value),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the first value stored under `key`, in probe order, that
    /// satisfies `predicate`.
    pub fn find_filter<P>(&self, key: &K, predicate: P) -> Option<&V>
    where
        P: FnMut(&V) -> bool,
    {
        let hash = self.hasher.hash_key(key);
        let idx = self.find_index(key, hash, predicate)?;
        match &self.slots[idx] {
            Slot::Occupied(entry) => Some(&entry.value),
            _ => None,
        }
    }

    /// Replaces the value of the first entry equal to `key`, or inserts it.
    pub fn update(&mut self, key: K, value: V) -> Result<Option<V>, TryReserveError> {
        let hash = self.hasher.hash_key(&key);
        if let Some(idx) = self.find_index(&key, hash, |_| true) {
            if let Slot::Occupied(entry) = &mut self.slots[idx] {
                return Ok(Some(mem::replace(&mut entry.value, value)));
            }
        }
        self.reserve_one()?;
        self.place(Entry { hash, key, value });
        Ok(None)
    }

    /// Applies `update` to the value stored under `key`, or stores `insert()`
    /// when the key is absent.
    pub fn upsert<F, U>(&mut self, key: K, insert: F, update: U) -> Result<&mut V, TryReserveError>
    where
        F: FnOnce() -> V,
        U: FnOnce(&mut V),
    {
        let hash = self.hasher.hash_key(&key);
        let idx = match self.find_index(&key, hash, |_| true) {
            Some(idx) => {
                if let Slot::Occupied(entry) = &mut self.slots[idx] {
                    update(&mut entry.value);
                }
                idx
            }
            None => {
                self.reserve_one()?;
                self.place(Entry {
                    hash,
                    key,
                    value: insert(),
                })
            }
        };
        match &mut self.slots[idx] {
            Slot::Occupied(entry) => Ok(&mut entry.value),
            _ => unreachable!("upsert target slot is occupied"),
        }
    }

    /// Removes the first entry equal to `key`, leaving a tombstone so that
    /// probe chains running through the slot stay intact.
    pub fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hasher.hash_key(key);
        let idx = self.find_index(key, hash, |_| true)?;
        match mem::replace(&mut self.slots[idx], Slot::Deleted) {
            Slot::Occupied(entry) => {
                self.len -= 1;
                Some((entry.key, entry.value))
            }
            other => {
                self.slots[idx] = other;
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some((&entry.key, &entry.value)),
            _ => None,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        self.len = 0;
        self.free = self.slots.len();
    }

    fn probe(&self, hash: u64) -> impl Iterator<Item = usize> + use<K, V, H> {
        let capacity = self.slots.len();
        let home = (hash % capacity as u64) as usize;
        (0..capacity).map(move |step| (home + step) % capacity)
    }

    fn find_index<P>(&self, key: &K, hash: u64, mut predicate: P) -> Option<usize>
    where
        P: FnMut(&V) -> bool,
    {
        for idx in self.probe(hash) {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Deleted => {}
                Slot::Occupied(entry) => {
                    if entry.hash == hash
                        && self.hasher.eq_keys(&entry.key, key)
                        && predicate(&entry.value)
                    {
                        return Some(idx);
                    }
                }
            }
        }
        None
    }

    /// Stores `entry` in the first empty or deleted slot of its probe chain.
    /// Callers must have run [`OpenTable::reserve_one`] first.
    fn place(&mut self, entry: Entry<K, V>) -> usize {
        let target = self
            .probe(entry.hash)
            .find(|&idx| !matches!(self.slots[idx], Slot::Occupied(_)));
        let Some(idx) = target else {
            unreachable!("open table has no free slot after reserve");
        };
        if matches!(self.slots[idx], Slot::Empty) {
            self.free -= 1;
        }
        self.slots[idx] = Slot::Occupied(entry);
        self.len += 1;
        idx
    }

    /// Doubles the table once empty slots fall to a quarter of the capacity.
    fn reserve_one(&mut self) -> Result<(), TryReserveError> {
        if self.free > self.slots.len() / 4 {
            return Ok(());
        }
        let capacity = self.slots.len() * 2;
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || Slot::Empty);

        let old = mem::replace(&mut self.slots, slots);
        self.free = capacity;
        self.len = 0;
        for slot in old {
            if let Slot::Occupied(entry) = slot {
                self.place(entry);
            }
        }
        log::trace!(
            "open table grew to {} slots holding {} entries",
            capacity,
            self.len
        );
        Ok(())
    }
}

impl<K, V, H> fmt::Debug for OpenTable<K, V, H>
where
    K: fmt::Debug,
    V: fmt::Debug,
    H: KeyHasher<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn empty_slots<K, V>(capacity: usize) -> Vec<Slot<K, V>> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || Slot::Empty);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sends every key to the same home slot to force long probe chains.
    struct Colliding;

    impl KeyHasher<u32> for Colliding {
        fn hash_key(&self, _key: &u32) -> u64 {
            3
        }

        fn eq_keys(&self, left: &u32, right: &u32) -> bool {
            left == right
        }
    }

    #[test]
    fn unique_insert_rejects_duplicates() {
        let mut table = OpenTable::new();
        assert!(table.insert("a".to_string(), 1).unwrap());
        assert!(!table.insert("a".to_string(), 2).unwrap());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&"a".to_string()), Some(&1));
    }

    #[test]
    fn multi_insert_keeps_every_value_and_filter_selects() {
        let mut table = OpenTable::with_hasher(Colliding);
        table.insert_multi(1, "first").unwrap();
        table.insert_multi(2, "other key").unwrap();
        table.insert_multi(1, "second").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&1), Some(&"first"));
        assert_eq!(table.find_filter(&1, |v| *v != "first"), Some(&"second"));
        assert_eq!(table.find_filter(&1, |v| v.starts_with('x')), None);
        assert_eq!(table.find_filter(&2, |_| true), Some(&"other key"));
    }

    #[test]
    fn tombstones_keep_probe_chains_intact() {
        let mut table = OpenTable::with_hasher(Colliding);
        for key in 0..4 {
            assert!(table.insert(key, key * 10).unwrap());
        }
        assert_eq!(table.remove(&1), Some((1, 10)));
        assert_eq!(table.remove(&1), None);
        assert_eq!(table.len(), 3);

        // key 3 lives behind the tombstone left by key 1
        assert_eq!(table.get(&3), Some(&30));

        // the freed slot is reused without consuming an empty one
        let free_before = table.free;
        assert!(table.insert(7, 70).unwrap());
        assert_eq!(table.free, free_before);
        assert_eq!(table.get(&7), Some(&70));
    }

    #[test]
    fn grows_when_a_quarter_of_slots_remain_empty() {
        let mut table = OpenTable::with_capacity_and_hasher(8, StdKeys);
        for key in 0..6u32 {
            table.insert(key, ()).unwrap();
        }
        assert_eq!(table.capacity(), 8);

        // free == 2 == 8 / 4 triggers doubling on the next insert
        table.insert(6, ()).unwrap();
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 7);
        for key in 0..7u32 {
            assert!(table.contains_key(&key));
        }
    }

    #[test]
    fn rehash_drops_tombstones() {
        let mut table = OpenTable::with_capacity_and_hasher(8, Colliding);
        for key in 0..6 {
            table.insert(key, key).unwrap();
        }
        for key in 0..5 {
            table.remove(&key);
        }
        table.insert(10, 10).unwrap();
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.len(), 2);
        assert_eq!(table.free, 14);
        assert_eq!(table.get(&5), Some(&5));
        assert_eq!(table.get(&10), Some(&10));
    }

    #[test]
    fn update_replaces_or_inserts() {
        let mut table = OpenTable::new();
        assert_eq!(table.update("k", 1).unwrap(), None);
        assert_eq!(table.update("k", 2).unwrap(), Some(1));
        assert_eq!(table.get(&"k"), Some(&2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn upsert_inserts_then_transforms() {
        let mut table = OpenTable::new();
        for word in ["a", "b", "a", "a"] {
            table.upsert(word, || 1usize, |count| *count += 1).unwrap();
        }
        assert_eq!(table.get(&"a"), Some(&3));
        assert_eq!(table.get(&"b"), Some(&1));

        *table.get_mut(&"b").unwrap() = 9;
        assert_eq!(table.values().copied().max(), Some(9));
    }

    #[test]
    fn clear_resets_slots() {
        let mut table = OpenTable::new();
        table.insert(1u8, 'x').unwrap();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
        assert!(table.insert(1u8, 'y').unwrap());
    }
}

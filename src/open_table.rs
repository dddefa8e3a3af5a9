//! OpenAddressTable: flat-array hash table with linear probing and tombstones.
//!
//! Every slot is `Empty`, `Tombstone`, or `Occupied`. Occupied slots keep the
//! key's hash so rehashing never calls back into `K: Hash`.
//!
//! Probe rules
//! - Probing starts at `hash % capacity` and advances one slot at a time,
//!   wrapping at the end, for at most `capacity` steps.
//! - A lookup stops at the first `Empty` slot. Tombstones are skipped.
//! - An insert keeps scanning past tombstones until it proves the key is
//!   absent, then lands in the first tombstone it passed (or the terminating
//!   `Empty` slot).
//!
//! Growth happens before the new entry is written: when the pending insert
//! would push `len / capacity` to `max_load_factor` the table doubles. When
//! tombstones have eaten the remaining empty slots, the table is rehashed at
//! the same size if live entries take less than half the threshold, and
//! doubled otherwise; a purge therefore always reclaims at least half the
//! threshold's worth of tombstones. Both paths share the routine behind
//! [`OpenAddressTable::reserve`], which is where tombstones are reclaimed.

use crate::config::{check_load_factor, TableConfig};
use crate::error::{InsertError, InvariantError, TableError};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use hashbrown::hash_map::DefaultHashBuilder;
use tracing::{debug, trace};

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

#[derive(Clone, Debug)]
enum Slot<K, V> {
    Empty,
    Tombstone,
    Occupied(Entry<K, V>),
}

/// Index of an occupied slot.
///
/// Valid until the next structural change (insert, remove, reserve, clear).
/// After a rehash the same index may hold a different key.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position(usize);

impl Position {
    pub fn index(&self) -> usize {
        self.0
    }
}

enum Probe {
    Found(usize),
    /// Key absent. Carries the landing slot, if any slot can take it.
    Vacant(Option<usize>),
}

#[derive(Clone)]
pub struct OpenAddressTable<K, V, S = DefaultHashBuilder> {
    hasher: S,
    slots: Vec<Slot<K, V>>,
    len: usize,
    tombstones: usize,
    max_load_factor: f32,
}

fn empty_slots<K, V>(n: usize) -> Vec<Slot<K, V>> {
    core::iter::repeat_with(|| Slot::Empty).take(n).collect()
}

impl<K, V> OpenAddressTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }

    pub fn with_config(config: TableConfig) -> Result<Self, TableError> {
        Self::with_config_and_hasher(config, Default::default())
    }
}

impl<K, V> Default for OpenAddressTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> OpenAddressTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        let config = TableConfig::default();
        Self {
            hasher,
            slots: empty_slots(config.initial_capacity),
            len: 0,
            tombstones: 0,
            max_load_factor: config.max_load_factor,
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Result<Self, TableError> {
        let config = TableConfig {
            initial_capacity: capacity,
            ..TableConfig::default()
        };
        Self::with_config_and_hasher(config, hasher)
    }

    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self, TableError> {
        config.validate()?;
        Ok(Self {
            hasher,
            slots: empty_slots(config.initial_capacity),
            len: 0,
            tombstones: 0,
            max_load_factor: config.max_load_factor,
        })
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    #[inline]
    fn home(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    #[inline]
    fn next_index(&self, i: usize) -> usize {
        if i + 1 == self.slots.len() {
            0
        } else {
            i + 1
        }
    }

    /// True when `n` occupied-or-dead slots would reach the load threshold.
    #[inline]
    fn over_threshold(&self, n: usize, capacity: usize) -> bool {
        n as f64 >= self.max_load_factor as f64 * capacity as f64
    }

    fn probe<Q>(&self, hash: u64, q: &Q) -> Probe
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut i = self.home(hash);
        let mut first_tombstone = None;
        for _ in 0..self.slots.len() {
            match &self.slots[i] {
                Slot::Empty => return Probe::Vacant(Some(first_tombstone.unwrap_or(i))),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(i);
                    }
                }
                Slot::Occupied(e) => {
                    if e.hash == hash && e.key.borrow() == q {
                        return Probe::Found(i);
                    }
                }
            }
            i = self.next_index(i);
        }
        Probe::Vacant(first_tombstone)
    }

    /// First `Empty` slot on the probe chain of `hash`. Only called when the
    /// table is known to contain an `Empty` slot.
    fn empty_slot_for(&self, hash: u64) -> usize {
        let mut i = self.home(hash);
        while !matches!(self.slots[i], Slot::Empty) {
            i = self.next_index(i);
        }
        i
    }

    fn lookup<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.probe(self.make_hash(q), q) {
            Probe::Found(i) => Some(i),
            Probe::Vacant(_) => None,
        }
    }

    /// Change the growth threshold. The table grows immediately if it is
    /// already at or above the new threshold.
    pub fn set_max_load_factor(&mut self, factor: f32) -> Result<(), TableError> {
        check_load_factor(factor)?;
        self.max_load_factor = factor;
        if self.len > 0 && self.over_threshold(self.len, self.slots.len()) {
            let target = self.grown_capacity(self.len);
            self.rehash(target);
        }
        Ok(())
    }

    /// Smallest doubling of the current capacity that keeps `live` entries
    /// strictly under the threshold.
    fn grown_capacity(&self, live: usize) -> usize {
        let mut cap = self.slots.len() * 2;
        while self.over_threshold(live, cap) {
            cap *= 2;
        }
        cap
    }

    /// Rehash into `n` slots if `n` exceeds the current capacity; otherwise a
    /// no-op. Tombstones are dropped and every entry is re-probed from its
    /// stored hash.
    pub fn reserve(&mut self, n: usize) {
        if n > self.slots.len() {
            self.rehash(n);
        }
    }

    fn rehash(&mut self, new_capacity: usize) {
        let old_capacity = self.slots.len();
        let old = core::mem::replace(&mut self.slots, empty_slots(new_capacity));
        let purged = core::mem::take(&mut self.tombstones);
        for slot in old {
            if let Slot::Occupied(e) = slot {
                let i = self.empty_slot_for(e.hash);
                self.slots[i] = Slot::Occupied(e);
            }
        }
        debug!(
            old_capacity,
            new_capacity,
            live = self.len,
            purged_tombstones = purged,
            "rehashed open-address table"
        );
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).map(Position)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q).is_some()
    }

    /// 1 if the key is present, else 0.
    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        usize::from(self.contains_key(q))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.lookup(q)?;
        match &self.slots[i] {
            Slot::Occupied(e) => Some((&e.key, &e.value)),
            _ => None,
        }
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.lookup(q)?;
        match &mut self.slots[i] {
            Slot::Occupied(e) => Some(&mut e.value),
            _ => None,
        }
    }

    pub fn key_at(&self, pos: Position) -> Option<&K> {
        match self.slots.get(pos.0)? {
            Slot::Occupied(e) => Some(&e.key),
            _ => None,
        }
    }

    pub fn value_at(&self, pos: Position) -> Option<&V> {
        match self.slots.get(pos.0)? {
            Slot::Occupied(e) => Some(&e.value),
            _ => None,
        }
    }

    pub fn value_at_mut(&mut self, pos: Position) -> Option<&mut V> {
        match self.slots.get_mut(pos.0)? {
            Slot::Occupied(e) => Some(&mut e.value),
            _ => None,
        }
    }

    /// Insert a new key. Duplicates are rejected and leave the table as it was.
    pub fn insert(&mut self, key: K, value: V) -> Result<Position, InsertError> {
        self.insert_with(key, || value)
    }

    /// Insert using a lazy value constructor; `default` only runs when the key
    /// is absent.
    pub fn insert_with<F>(&mut self, key: K, default: F) -> Result<Position, InsertError>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let landing = match self.probe(hash, &key) {
            Probe::Found(_) => return Err(InsertError::DuplicateKey),
            Probe::Vacant(landing) => landing,
        };

        let cap = self.slots.len();
        let idx = match landing {
            Some(i) if !self.over_threshold(self.len + 1, cap) => {
                let consumes_empty = matches!(self.slots[i], Slot::Empty);
                if consumes_empty && self.over_threshold(self.len + self.tombstones + 1, cap) {
                    // Tombstones have used up the free slots. Purge in place
                    // while live entries fill under half the threshold,
                    // otherwise grow.
                    let target = if self.over_threshold(2 * (self.len + 1), cap) {
                        self.grown_capacity(self.len + 1)
                    } else {
                        cap
                    };
                    self.rehash(target);
                    self.empty_slot_for(hash)
                } else {
                    i
                }
            }
            _ => {
                let target = self.grown_capacity(self.len + 1);
                self.rehash(target);
                self.empty_slot_for(hash)
            }
        };

        if matches!(self.slots[idx], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        let value = default();
        self.slots[idx] = Slot::Occupied(Entry { key, value, hash });
        self.len += 1;
        trace!(slot = idx, len = self.len, "table insert");
        Ok(Position(idx))
    }

    /// Remove a key, leaving a tombstone in its slot.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let i = self.lookup(q)?;
        match core::mem::replace(&mut self.slots[i], Slot::Tombstone) {
            Slot::Occupied(e) => {
                self.len -= 1;
                self.tombstones += 1;
                Some((e.key, e.value))
            }
            other => {
                // lookup only reports occupied slots
                self.slots[i] = other;
                None
            }
        }
    }

    /// Remove a key; true if it was present.
    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove(q).is_some()
    }

    /// Drop every entry and tombstone. Capacity is unchanged.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.len = 0;
        self.tombstones = 0;
    }

    /// Verify counters and that every key is reachable from its home slot
    /// before any `Empty` slot.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut live = 0;
        let mut dead = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Empty => {}
                Slot::Tombstone => dead += 1,
                Slot::Occupied(e) => {
                    live += 1;
                    let mut j = self.home(e.hash);
                    while j != i {
                        if matches!(self.slots[j], Slot::Empty) {
                            return Err(InvariantError::new(format!(
                                "slot {i} unreachable: empty slot {j} on its probe chain"
                            )));
                        }
                        j = self.next_index(j);
                    }
                }
            }
        }
        if live != self.len {
            return Err(InvariantError::new(format!(
                "len is {} but {live} slots are occupied",
                self.len
            )));
        }
        if dead != self.tombstones {
            return Err(InvariantError::new(format!(
                "tombstone count is {} but {dead} slots are tombstones",
                self.tombstones
            )));
        }
        Ok(())
    }
}

impl<K, V, S> OpenAddressTable<K, V, S> {
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the backing array.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots holding a deleted entry, waiting for the next rehash.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.slots.len() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }
}

impl<K, V, S> fmt::Debug for OpenAddressTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over occupied slots in array order.
pub struct Iter<'a, K, V> {
    it: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.it.by_ref() {
            if let Slot::Occupied(e) = slot {
                self.remaining -= 1;
                return Some((&e.key, &e.value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        while let Some(slot) = self.it.next_back() {
            if let Slot::Occupied(e) = slot {
                self.remaining -= 1;
                return Some((&e.key, &e.value));
            }
        }
        None
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            it: self.it.clone(),
            remaining: self.remaining,
        }
    }
}

/// Mutable iterator over occupied slots in array order.
pub struct IterMut<'a, K, V> {
    it: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.it.by_ref() {
            if let Slot::Occupied(e) = slot {
                self.remaining -= 1;
                return Some((&e.key, &mut e.value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Owning iterator over the table's entries.
pub struct IntoIter<K, V> {
    it: std::vec::IntoIter<Slot<K, V>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.it.by_ref() {
            if let Slot::Occupied(e) = slot {
                self.remaining -= 1;
                return Some((e.key, e.value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<'a, K, V, S> IntoIterator for &'a OpenAddressTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut OpenAddressTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for OpenAddressTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            it: self.slots.into_iter(),
            remaining: self.len,
        }
    }
}

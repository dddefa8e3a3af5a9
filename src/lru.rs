//! RecencyCache: fixed-capacity LRU cache.
//!
//! Entries live in a [`RecencyList`] ordered most-recent-first; an
//! [`OpenAddressTable`] maps each key to its node handle. Both structures
//! change together inside every operation, so the key set of the table always
//! equals the key set of the list.

use crate::config::CacheConfig;
use crate::error::{CacheError, InvariantError, TableError};
use crate::open_table::OpenAddressTable;
use crate::recency_list::{self, NodeHandle, RecencyList};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use tracing::{debug, trace};

pub struct RecencyCache<K, V, S = DefaultHashBuilder> {
    capacity: usize,
    list: RecencyList<K, V>,
    index: OpenAddressTable<K, NodeHandle, S>,
}

impl<K, V> RecencyCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// A cache holding at most `capacity` entries. A capacity of 0 is accepted
    /// but every operation on the cache then fails with
    /// [`CacheError::InvalidCapacity`].
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, Default::default())
    }

    pub fn with_config(config: CacheConfig) -> Result<Self, TableError> {
        Self::with_config_and_hasher(config, Default::default())
    }
}

impl<K, V, S> RecencyCache<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        let config = CacheConfig::new(capacity);
        let index = OpenAddressTable::with_config_and_hasher(config.index_config(), hasher)
            .expect("index config derived from the default load factor is valid");
        Self::from_parts(&config, index)
    }

    pub fn with_config_and_hasher(config: CacheConfig, hasher: S) -> Result<Self, TableError> {
        config.validate()?;
        let index = OpenAddressTable::with_config_and_hasher(config.index_config(), hasher)?;
        Ok(Self::from_parts(&config, index))
    }

    fn from_parts(config: &CacheConfig, index: OpenAddressTable<K, NodeHandle, S>) -> Self {
        Self {
            capacity: config.capacity,
            list: RecencyList::with_capacity(config.list_capacity()),
            index,
        }
    }

    #[inline]
    fn check_capacity(&self) -> Result<(), CacheError> {
        if self.capacity == 0 {
            Err(CacheError::InvalidCapacity)
        } else {
            Ok(())
        }
    }

    fn handle_of<Q>(&self, q: &Q) -> Result<NodeHandle, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.check_capacity()?;
        self.index.get(q).copied().ok_or(CacheError::KeyNotFound)
    }

    /// Look up a key and mark it most recently used.
    ///
    /// This is not a pure accessor: a hit reorders the cache.
    pub fn get<Q>(&mut self, q: &Q) -> Result<&V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.handle_of(q)?;
        self.list.move_to_front(h);
        self.list
            .get(h)
            .map(|(_, v)| v)
            .ok_or(CacheError::KeyNotFound)
    }

    /// Mutable lookup; marks the key most recently used.
    pub fn get_mut<Q>(&mut self, q: &Q) -> Result<&mut V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.handle_of(q)?;
        self.list.move_to_front(h);
        self.list.get_mut(h).ok_or(CacheError::KeyNotFound)
    }

    /// Checked access, same as [`get`](Self::get).
    pub fn at<Q>(&mut self, q: &Q) -> Result<&V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q)
    }

    /// Look up a key without touching its recency.
    pub fn peek<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = *self.index.get(q)?;
        self.list.get(h).map(|(_, v)| v)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.contains_key(q)
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.count(q)
    }

    /// Insert or update `key`, making it most recently used.
    ///
    /// Returns the evicted entry when a new key arrives at a full cache.
    /// Updating an existing key never evicts.
    pub fn put(&mut self, key: K, value: V) -> Result<Option<(K, V)>, CacheError> {
        self.check_capacity()?;

        if let Some(&h) = self.index.get(&key) {
            if let Some(slot) = self.list.get_mut(h) {
                *slot = value;
            }
            self.list.move_to_front(h);
            return Ok(None);
        }

        let evicted = if self.list.len() >= self.capacity {
            self.evict_lru()
        } else {
            None
        };

        let h = self.list.push_front(key.clone(), value);
        // absent: checked above, and eviction only removes other keys
        let inserted = self.index.insert(key, h);
        debug_assert!(inserted.is_ok(), "new cache key already in the index");
        Ok(evicted)
    }

    fn evict_lru(&mut self) -> Option<(K, V)> {
        let (k, v) = self.list.pop_back()?;
        self.index.erase(&k);
        trace!(len = self.list.len(), "evicted least recently used entry");
        Some((k, v))
    }

    /// Remove `key` from the cache and return its value.
    pub fn erase<Q>(&mut self, q: &Q) -> Result<V, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.check_capacity()?;
        let (_, h) = self.index.remove(q).ok_or(CacheError::KeyNotFound)?;
        self.list
            .remove(h)
            .map(|(_, v)| v)
            .ok_or(CacheError::KeyNotFound)
    }

    /// Drop every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
    }

    /// Clear the cache and change its capacity.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.clear();
        let needed = CacheConfig {
            capacity,
            max_load_factor: self.index.max_load_factor(),
        }
        .index_config()
        .initial_capacity;
        self.index.reserve(needed);
        debug!(old = self.capacity, new = capacity, "cache capacity changed");
        self.capacity = capacity;
    }

    /// Verify that the table and list describe the same entries.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.index.check_invariants()?;
        if self.list.len() != self.index.len() {
            return Err(InvariantError::new(format!(
                "list has {} nodes, index has {} keys",
                self.list.len(),
                self.index.len()
            )));
        }
        if self.list.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "{} entries exceed capacity {}",
                self.list.len(),
                self.capacity
            )));
        }
        for (k, &h) in self.index.iter() {
            match self.list.key(h) {
                Some(lk) if lk == k => {}
                Some(_) => return Err(InvariantError::new("index handle points at another key")),
                None => return Err(InvariantError::new("index holds a stale handle")),
            }
        }
        if self.list.iter().count() != self.list.len()
            || self.list.iter().rev().count() != self.list.len()
        {
            return Err(InvariantError::new("list links do not cover every node"));
        }
        Ok(())
    }
}

impl<K, V, S> RecencyCache<K, V, S> {
    pub fn len(&self) -> usize {
        self.list.len()
    }
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently used entry.
    pub fn peek_mru(&self) -> Option<(&K, &V)> {
        self.list.front()
    }

    /// Least recently used entry; the next eviction victim.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.list.back()
    }

    /// Entries from most to least recently used. `.rev()` yields eviction
    /// order. Does not change recency.
    pub fn iter(&self) -> recency_list::Iter<'_, K, V> {
        self.list.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a RecencyCache<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = recency_list::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

impl<K, V, S> fmt::Debug for RecencyCache<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecencyCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.list)
            .field("index_slots", &self.index.capacity())
            .finish()
    }
}

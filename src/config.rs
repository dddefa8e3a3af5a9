//! Construction parameters for the table and the cache.
//!
//! Both structs are plain data; with the `serde` feature they form the
//! serialization boundary for anything that stores cache settings.

use crate::error::TableError;

/// Slots allocated by a default-constructed table.
pub const DEFAULT_TABLE_CAPACITY: usize = 4;
/// Load factor at which a table doubles.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.75;
/// Smallest accepted load factor.
pub const MIN_MAX_LOAD_FACTOR: f32 = 0.05;
/// Entries a cache allocates for up front; larger caches grow on demand.
pub const MAX_PREALLOCATED_ENTRIES: usize = 1 << 16;

pub(crate) fn check_load_factor(f: f32) -> Result<(), TableError> {
    // NaN is in no range.
    if (MIN_MAX_LOAD_FACTOR..=1.0).contains(&f) {
        Ok(())
    } else {
        Err(TableError::InvalidLoadFactor(f))
    }
}

/// Parameters for [`OpenAddressTable`](crate::OpenAddressTable).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableConfig {
    /// Number of slots allocated up front. Must be at least 1.
    pub initial_capacity: usize,
    /// Occupancy ratio that triggers growth. Must be in `[0.05, 1]`.
    pub max_load_factor: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_TABLE_CAPACITY,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), TableError> {
        if self.initial_capacity == 0 {
            return Err(TableError::InvalidCapacity);
        }
        check_load_factor(self.max_load_factor)
    }
}

/// Parameters for [`RecencyCache`](crate::RecencyCache).
///
/// A capacity of 0 is accepted here; every cache operation then fails with
/// [`CacheError::InvalidCapacity`](crate::CacheError::InvalidCapacity).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Maximum number of live entries.
    pub capacity: usize,
    /// Load factor of the cache's key index.
    pub max_load_factor: f32,
}

impl CacheConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        check_load_factor(self.max_load_factor)
    }

    /// Index sizing: twice the slots `capacity` keys need, so a full cache
    /// churns through evictions on in-place purges and never grows the index.
    /// Capped at the slots for [`MAX_PREALLOCATED_ENTRIES`].
    pub(crate) fn index_config(&self) -> TableConfig {
        let entries = self.capacity.min(MAX_PREALLOCATED_ENTRIES);
        let slots = 2.0 * (entries as f64 + 1.0) / self.max_load_factor as f64;
        let needed = slots.floor() as usize + 1;
        TableConfig {
            initial_capacity: needed.max(DEFAULT_TABLE_CAPACITY),
            max_load_factor: self.max_load_factor,
        }
    }

    /// Nodes the recency list allocates up front.
    pub(crate) fn list_capacity(&self) -> usize {
        self.capacity.min(MAX_PREALLOCATED_ENTRIES)
    }
}

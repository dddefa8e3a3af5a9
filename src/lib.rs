//! recency-cache: a single-threaded, fixed-capacity LRU cache built from an
//! open-addressing hash table and a handle-based recency list.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: strict least-recently-used eviction with amortized O(1) `get`,
//!   `put`, and `erase`, built from two layers that can be checked on their
//!   own.
//! - Layers:
//!   - OpenAddressTable<K, V, S>: flat slot array with linear probing and
//!     tombstone deletion. Grows by doubling before the load threshold is
//!     reached.
//!   - RecencyList<K, V>: doubly linked list whose nodes live in a
//!     generational arena; `NodeHandle`s survive relinking of any node.
//!   - RecencyCache<K, V, S>: owns one of each. The table maps a key to the
//!     handle of its list node.
//!
//! Constraints
//! - Single-threaded; share it across threads only behind one mutex around
//!   the whole cache, since table and list change together.
//! - Unique keys in the table: a duplicate insert fails with
//!   `InsertError::DuplicateKey`. The cache never hits this because it
//!   checks for the key and updates in place instead.
//! - Capacity 0 is accepted at construction and reported as
//!   `CacheError::InvalidCapacity` by every operation, before any lookup.
//!
//! Probing and tombstones
//! - Slots are Empty, Tombstone, or Occupied. A lookup skips tombstones and
//!   stops at the first Empty slot, so erasing never breaks a probe chain.
//! - Tombstones are reclaimed only by rehashing (growth, `reserve`, or a
//!   same-size purge when tombstones use up the free slots while live
//!   entries fill under half the load threshold) and by `clear`.
//!
//! Hasher and rehashing
//! - Each occupied slot stores its `u64` hash; rehashing re-probes from the
//!   stored hash and never calls `K: Hash`.
//! - The hasher is any `BuildHasher`; the default is hashbrown's.
//!
//! Handles
//! - The table stores `NodeHandle`s, not indices into a `Vec`, so moving a
//!   node to the front or removing a neighbour never invalidates them. A
//!   handle to a removed node stops resolving and never aliases a newer node.
//!
//! Also included
//! - `embedding`: a store of bounded-width `f32` vectors on top of the cache,
//!   with a tab-separated line protocol (`serve`).

pub mod config;
pub mod embedding;
pub mod error;
pub mod lru;
pub mod open_table;
mod open_table_proptest;
pub mod recency_list;

// Public surface
pub use config::{CacheConfig, TableConfig};
pub use embedding::{serve, EmbeddingStore};
pub use error::{CacheError, InsertError, InvariantError, SessionError, TableError};
pub use lru::RecencyCache;
pub use open_table::{OpenAddressTable, Position};
pub use recency_list::{NodeHandle, RecencyList};

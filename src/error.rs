//! Error types shared by the table, the cache, and the embedding session.

use thiserror::Error;

/// Failure of a table-level insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InsertError {
    /// The key already occupies a slot; the table was left unchanged.
    #[error("key already present in table")]
    DuplicateKey,
}

/// Invalid table or cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TableError {
    /// A table needs at least one slot.
    #[error("table capacity must be at least 1")]
    InvalidCapacity,
    /// Load factor outside `[0.05, 1]`.
    #[error("max load factor must be in [0.05, 1], got {0}")]
    InvalidLoadFactor(f32),
}

/// Failure of a cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The cache was configured with capacity 0. Checked before anything else.
    #[error("cache capacity is zero")]
    InvalidCapacity,
    /// The key is not cached.
    #[error("key not found in cache")]
    KeyNotFound,
}

/// Returned by `check_invariants` when the table and list disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violated: {0}")]
pub struct InvariantError(String);

impl InvariantError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Failure of an embedding protocol session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The first line must be `<capacity> <width>`.
    #[error("malformed session header: {0:?}")]
    Header(String),
}

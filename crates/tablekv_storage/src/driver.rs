//! Driver trait definition.

use crate::batch::WriteBatch;
use crate::error::{StorageError, StorageResult};

/// One item produced by a range iterator.
///
/// `value` is `None` when the range was requested with `include_value = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Value bytes, if requested.
    pub value: Option<Vec<u8>>,
}

impl KvEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(key: Vec<u8>, value: Option<Vec<u8>>) -> Self {
        Self { key, value }
    }
}

/// Lazy, ordered iterator returned by [`Driver::range_iter`].
pub type KvIter<'a> = Box<dyn Iterator<Item = StorageResult<KvEntry>> + 'a>;

/// Parameters of a range scan.
///
/// Both bounds are inclusive. `key_from` is the byte-wise smaller key and
/// `key_to` the larger one regardless of `reverse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOptions {
    /// Smallest key to return (inclusive). `None` starts at the first key.
    pub key_from: Option<Vec<u8>>,
    /// Largest key to return (inclusive). `None` runs to the last key.
    pub key_to: Option<Vec<u8>>,
    /// Walk from `key_to` down to `key_from`.
    pub reverse: bool,
    /// Return values alongside keys.
    pub include_value: bool,
    /// Hint that scanned blocks should populate the engine cache.
    pub fill_cache: bool,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            key_from: None,
            key_to: None,
            reverse: false,
            include_value: true,
            fill_cache: false,
        }
    }
}

impl RangeOptions {
    /// Creates options that scan the whole keyspace in ascending order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn key_from(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key_from = Some(key.into());
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn key_to(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key_to = Some(key.into());
        self
    }

    /// Sets the scan direction.
    #[must_use]
    pub const fn reverse(mut self, value: bool) -> Self {
        self.reverse = value;
        self
    }

    /// Sets whether values are returned.
    #[must_use]
    pub const fn include_value(mut self, value: bool) -> Self {
        self.include_value = value;
        self
    }

    /// Sets the cache fill hint.
    #[must_use]
    pub const fn fill_cache(mut self, value: bool) -> Self {
        self.fill_cache = value;
        self
    }

    /// Checks that `key_from <= key_to` when both are set.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRange`] for inverted bounds.
    pub fn validate(&self) -> StorageResult<()> {
        if let (Some(from), Some(to)) = (&self.key_from, &self.key_to) {
            if from > to {
                return Err(StorageError::InvalidRange {
                    key_from: from.clone(),
                    key_to: to.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Adapter from one storage engine to the ordered byte key-value contract.
///
/// Drivers are shared process-wide behind an `Arc`, so every method takes
/// `&self` and implementations synchronize internally.
///
/// # Invariants
///
/// - Keys are ordered byte-lexicographically in every scan
/// - `range_iter` yields strictly increasing keys (strictly decreasing when reversed)
/// - `write` applies its batch with the driver's atomicity guarantee
/// - Iterators do not hold engine locks between items, so the caller may
///   write to the same driver while iterating
///
/// # Implementors
///
/// - [`super::MemoryDriver`] - For testing and ephemeral data
/// - [`super::LogDriver`] - Log-structured single file
/// - [`super::RedbDriver`] - Embedded B-tree
pub trait Driver: Send + Sync {
    /// Returns a short driver name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails. A missing key is `Ok(None)`.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`.
    ///
    /// When `sync` is true the write is durable before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn delete(&self, key: &[u8], sync: bool) -> StorageResult<()>;

    /// Returns a lazy iterator over the keys selected by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRange`] if `key_from > key_to`.
    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>>;

    /// Applies every operation in `batch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails; no operation of the batch is
    /// visible afterwards.
    fn write(&self, batch: WriteBatch, sync: bool) -> StorageResult<()>;

    /// Creates a point-in-time read view.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unsupported`] if the driver cannot provide one.
    fn create_snapshot(&self) -> StorageResult<Box<dyn Snapshot + '_>>;
}

/// A point-in-time read view created by [`Driver::create_snapshot`].
///
/// Writes made to the driver after the snapshot was taken are not visible
/// through it.
pub trait Snapshot {
    /// Reads the value stored under `key` at snapshot time.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Scans the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRange`] if `key_from > key_to`.
    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>>;
}

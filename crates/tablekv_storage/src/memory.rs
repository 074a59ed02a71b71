//! In-memory driver for testing.

use crate::batch::{BatchOp, WriteBatch};
use crate::driver::{Driver, KvEntry, KvIter, RangeOptions, Snapshot};
use crate::error::StorageResult;
use crate::range::{is_empty_range, BatchedRangeIter, RangeSource, DEFAULT_BATCH_SIZE};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory ordered driver.
///
/// This driver keeps all data in a `BTreeMap` and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Snapshots
///
/// The map is held behind an `Arc`, so a snapshot is a cheap pointer clone.
/// The next write after a snapshot copies the map once (copy-on-write).
///
/// # Example
///
/// ```rust
/// use tablekv_storage::{Driver, MemoryDriver};
///
/// let driver = MemoryDriver::new();
/// driver.put(b"note:1", b"{}", false).unwrap();
/// assert_eq!(driver.get(b"note:1").unwrap(), Some(b"{}".to_vec()));
/// ```
#[derive(Debug)]
pub struct MemoryDriver {
    data: RwLock<Arc<Map>>,
    batch_size: usize,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self {
            data: RwLock::new(Arc::new(Map::new())),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl MemoryDriver {
    /// Creates a new empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a driver with pre-existing entries.
    #[must_use]
    pub fn with_data(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            data: RwLock::new(Arc::new(entries.into_iter().collect())),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets how many entries range iterators fetch per refill.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        *self.data.write() = Arc::new(Map::new());
    }
}

fn fetch_from(
    map: &Map,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    reverse: bool,
    include_value: bool,
    limit: usize,
) -> Vec<KvEntry> {
    if is_empty_range(lower, upper) {
        return Vec::new();
    }
    let range = map.range::<[u8], _>((lower, upper));
    let to_entry =
        |(k, v): (&Vec<u8>, &Vec<u8>)| KvEntry::new(k.clone(), include_value.then(|| v.clone()));
    if reverse {
        range.rev().take(limit).map(to_entry).collect()
    } else {
        range.take(limit).map(to_entry).collect()
    }
}

impl RangeSource for MemoryDriver {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        let data = self.data.read();
        Ok(fetch_from(&data, lower, upper, reverse, include_value, limit))
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8], _sync: bool) -> StorageResult<()> {
        let mut data = self.data.write();
        Arc::make_mut(&mut data).insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8], _sync: bool) -> StorageResult<()> {
        let mut data = self.data.write();
        if data.contains_key(key) {
            Arc::make_mut(&mut data).remove(key);
        }
        Ok(())
    }

    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>> {
        options.validate()?;
        Ok(Box::new(BatchedRangeIter::new(
            self,
            options,
            self.batch_size,
        )))
    }

    fn write(&self, batch: WriteBatch, _sync: bool) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut data = self.data.write();
        let map = Arc::make_mut(&mut data);
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn create_snapshot(&self) -> StorageResult<Box<dyn Snapshot + '_>> {
        Ok(Box::new(MemorySnapshot {
            data: Arc::clone(&self.data.read()),
            batch_size: self.batch_size,
        }))
    }
}

/// Point-in-time view of a [`MemoryDriver`].
#[derive(Debug)]
pub struct MemorySnapshot {
    data: Arc<Map>,
    batch_size: usize,
}

impl RangeSource for MemorySnapshot {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        Ok(fetch_from(&self.data, lower, upper, reverse, include_value, limit))
    }
}

impl Snapshot for MemorySnapshot {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>> {
        options.validate()?;
        Ok(Box::new(BatchedRangeIter::new(
            self,
            options,
            self.batch_size,
        )))
    }
}

//! Driver backed by the redb embedded B-tree.

use crate::batch::{BatchOp, WriteBatch};
use crate::driver::{Driver, KvEntry, KvIter, RangeOptions, Snapshot};
use crate::error::{StorageError, StorageResult};
use crate::range::{is_empty_range, BatchedRangeIter, RangeSource, DEFAULT_BATCH_SIZE};
use redb::{Database, DatabaseError, Durability, ReadTransaction, ReadableTable, TableDefinition};
use std::fmt;
use std::ops::Bound;
use std::path::Path;

/// All keys live in one table; the table layer is a key prefix, not a redb table.
const DATA_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tablekv");

const DRIVER_NAME: &str = "redb";

fn engine_error(e: impl ToString) -> StorageError {
    StorageError::backend(DRIVER_NAME, e)
}

/// Configuration options for [`RedbDriver`].
#[derive(Debug, Clone, Copy)]
pub struct RedbConfig {
    /// Cache size in bytes. `None` uses redb's default.
    pub cache_size: Option<usize>,
    /// Entries fetched per range iterator refill.
    pub batch_size: usize,
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self {
            cache_size: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RedbConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Sets the range iterator batch size.
    #[must_use]
    pub const fn batch_size(mut self, value: usize) -> Self {
        self.batch_size = value;
        self
    }
}

/// A driver backed by redb.
///
/// Every `put`, `delete` and `write` is one redb write transaction, so
/// batches are atomic. Writes with `sync = false` commit with
/// [`Durability::Eventual`]. Range iterators open a fresh read transaction
/// per batch; snapshots keep a single read transaction alive.
pub struct RedbDriver {
    db: Database,
    batch_size: usize,
}

impl fmt::Debug for RedbDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbDriver")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl RedbDriver {
    /// Opens or creates a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle has the file open,
    /// or a backend error if redb cannot open it.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_config(path, RedbConfig::default())
    }

    /// Opens or creates a database at `path` with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle has the file open,
    /// or a backend error if redb cannot open it.
    pub fn open_with_config(path: &Path, config: RedbConfig) -> StorageResult<Self> {
        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }
        let db = builder.create(path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => {
                StorageError::Locked(path.display().to_string())
            }
            other => engine_error(other),
        })?;
        tracing::debug!(path = %path.display(), "opened redb database");
        Ok(Self {
            db,
            batch_size: config.batch_size,
        })
    }

    /// Creates a database that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns a backend error if redb cannot initialize it.
    pub fn in_memory() -> StorageResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(engine_error)?;
        Ok(Self {
            db,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Compacts the database file.
    ///
    /// # Errors
    ///
    /// Returns a backend error if a transaction is in flight or compaction fails.
    pub fn compact(&mut self) -> StorageResult<bool> {
        self.db.compact().map_err(engine_error)
    }

    fn commit(&self, ops: Vec<BatchOp>, sync: bool) -> StorageResult<()> {
        let mut txn = self.db.begin_write().map_err(engine_error)?;
        if !sync {
            txn.set_durability(Durability::Eventual);
        }
        {
            let mut table = txn.open_table(DATA_TABLE).map_err(engine_error)?;
            for op in &ops {
                match op {
                    BatchOp::Put { key, value } => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(engine_error)?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(key.as_slice()).map_err(engine_error)?;
                    }
                }
            }
        }
        txn.commit().map_err(engine_error)
    }
}

fn get_in(txn: &ReadTransaction, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
    match txn.open_table(DATA_TABLE) {
        Ok(table) => Ok(table
            .get(key)
            .map_err(engine_error)?
            .map(|v| v.value().to_vec())),
        Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(engine_error(e)),
    }
}

fn fetch_in(
    txn: &ReadTransaction,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    reverse: bool,
    include_value: bool,
    limit: usize,
) -> StorageResult<Vec<KvEntry>> {
    if is_empty_range(lower, upper) {
        return Ok(Vec::new());
    }
    let table = match txn.open_table(DATA_TABLE) {
        Ok(table) => table,
        Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(e) => return Err(engine_error(e)),
    };
    let range = table
        .range::<&[u8]>((lower, upper))
        .map_err(engine_error)?;

    let mut entries = Vec::with_capacity(limit.min(DEFAULT_BATCH_SIZE));
    if reverse {
        for item in range.rev().take(limit) {
            let (k, v) = item.map_err(engine_error)?;
            entries.push(KvEntry::new(
                k.value().to_vec(),
                include_value.then(|| v.value().to_vec()),
            ));
        }
    } else {
        for item in range.take(limit) {
            let (k, v) = item.map_err(engine_error)?;
            entries.push(KvEntry::new(
                k.value().to_vec(),
                include_value.then(|| v.value().to_vec()),
            ));
        }
    }
    Ok(entries)
}

impl RangeSource for RedbDriver {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        let txn = self.db.begin_read().map_err(engine_error)?;
        fetch_in(&txn, lower, upper, reverse, include_value, limit)
    }
}

impl Driver for RedbDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(engine_error)?;
        get_in(&txn, key)
    }

    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> StorageResult<()> {
        self.commit(
            vec![BatchOp::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
            sync,
        )
    }

    fn delete(&self, key: &[u8], sync: bool) -> StorageResult<()> {
        self.commit(vec![BatchOp::Delete { key: key.to_vec() }], sync)
    }

    fn range_iter(&self, options: RangeOptions) -> StorageResult<KvIter<'_>> {
        options.validate()?;
        Ok(Box::new(BatchedRangeIter::new(
            self,
            options,
            self.batch_size,
        )))
    }

    fn write(&self, batch: WriteBatch, sync: bool) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.commit(batch.into_ops(), sync)
    }

    fn create_snapshot(&self) -> StorageResult<Box<dyn Snapshot + '_>> {
        let txn = self.db.begin_read().map_err(engine_error)?;
        Ok(Box::new(RedbSnapshot {
            txn,
            batch_size: self.batch_size,
        }))
    }
}

/// Point-in-time view of a [`RedbDriver`], backed by one read transaction.
pub struct RedbSnapshot {
    txn: ReadTransaction,
    batch_size: usize,
}

impl fmt::Debug for RedbSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbSnapshot").finish_non_exhaustive()
    }
}

impl RangeSource for RedbSnapshot {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        fetch_in(&self.txn, lower, upper, reverse, include_value, limit)
    }
}

impl Snapshot for RedbSnapshot {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        get_in(&self.txn, key)
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

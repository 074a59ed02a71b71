//! Replication change log.
//!
//! Every write made through the Store's logged write path appends one entry
//! to the reserved `_binlog` table inside the same driver batch as the write
//! itself. Entry keys are `_binlog:<16 hex digits>` of a big-endian `u64`
//! sequence, so they sort in sequence order.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tablekv_codec::{encode_value, CodecError, Record};
use tablekv_storage::{Driver, RangeOptions, WriteBatch};

/// Reserved table holding binlog entries.
pub const BINLOG_TABLE: &str = "_binlog";

/// Entries deleted per driver batch while trimming.
const DELETE_BATCH_SIZE: usize = 100;

/// Width of a legacy decimal entry id.
const LEGACY_ID_WIDTH: usize = 20;

/// Kind of a logged mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    /// Insert or overwrite.
    Put,
    /// Removal.
    Delete,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Put => "put",
            Self::Delete => "delete",
        })
    }
}

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinlogEntry {
    /// Sequence number, taken from the entry key.
    #[serde(skip)]
    pub seq: u64,
    /// Mutation kind.
    pub optype: OpType,
    /// Target record key.
    pub key: String,
    /// Value before the mutation; `null` if the key was absent.
    #[serde(default)]
    pub old_value: Option<Value>,
    /// Value after the mutation, when new values are recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Formats a sequence as an entry id.
///
/// ```
/// use tablekv_core::binlog::pack_id;
///
/// assert_eq!(pack_id(255), "00000000000000ff");
/// ```
#[must_use]
pub fn pack_id(seq: u64) -> String {
    format!("{seq:016x}")
}

/// Parses an entry id. Accepts 16 hex digits and legacy 20-digit decimals.
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn unpack_id(id: &str) -> CoreResult<u64> {
    let parsed = if id.len() == LEGACY_ID_WIDTH {
        id.parse::<u64>().ok()
    } else if id.len() == 16 {
        u64::from_str_radix(id, 16).ok()
    } else {
        None
    };
    parsed.ok_or_else(|| CoreError::validation(format!("invalid binlog id '{id}'")))
}

/// Returns the key of the entry with sequence `seq`.
#[must_use]
pub fn record_key(seq: u64) -> String {
    format!("{BINLOG_TABLE}:{}", pack_id(seq))
}

fn table_range() -> RangeOptions {
    let mut upper = format!("{BINLOG_TABLE}:").into_bytes();
    upper.push(0xFF);
    RangeOptions::new()
        .key_from(format!("{BINLOG_TABLE}:"))
        .key_to(upper)
}

/// Drivers that currently have a live binlog, by `Arc` address.
static CLAIMED_DRIVERS: Mutex<BTreeSet<usize>> = parking_lot::const_mutex(BTreeSet::new());

fn driver_addr(driver: &Arc<dyn Driver>) -> usize {
    Arc::as_ptr(driver).cast::<()>() as usize
}

fn seq_of_key(key: &[u8]) -> CoreResult<u64> {
    let key = std::str::from_utf8(key)
        .map_err(|_| CoreError::validation("binlog key is not UTF-8"))?;
    let id = key
        .strip_prefix(BINLOG_TABLE)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| CoreError::validation(format!("'{key}' is not a binlog key")))?;
    unpack_id(id)
}

/// Returns the sequence of the newest well-formed entry, skipping malformed
/// keys.
fn newest_seq(driver: &dyn Driver) -> CoreResult<u64> {
    for item in driver.range_iter(table_range().reverse(true).include_value(false))? {
        let entry = item?;
        match seq_of_key(&entry.key) {
            Ok(seq) => return Ok(seq),
            Err(e) => tracing::warn!(
                key = %String::from_utf8_lossy(&entry.key),
                error = %e,
                "skipping malformed binlog key"
            ),
        }
    }
    Ok(0)
}

/// The change log of one [`crate::Store`].
///
/// Only the store creates a binlog, and at most one binlog is live per
/// driver, so there is exactly one sequence per driver.
pub struct Binlog {
    driver: Arc<dyn Driver>,
    last_seq: ReentrantMutex<Cell<u64>>,
    delete_lock: Mutex<()>,
    enabled: AtomicBool,
    max_size: AtomicUsize,
    record_value: AtomicBool,
    sync: bool,
}

impl fmt::Debug for Binlog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binlog")
            .field("last_seq", &self.last_seq())
            .field("enabled", &self.is_enabled())
            .field("max_size", &self.max_size())
            .finish_non_exhaustive()
    }
}

impl Binlog {
    /// Claims `driver` and loads the last sequence from it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if another binlog is live on the
    /// same driver, or a driver error.
    pub(crate) fn open(driver: Arc<dyn Driver>, config: &Config) -> CoreResult<Self> {
        let addr = driver_addr(&driver);
        if !CLAIMED_DRIVERS.lock().insert(addr) {
            return Err(CoreError::configuration(format!(
                "a store is already open on this {} driver",
                driver.name()
            )));
        }
        let last = match newest_seq(driver.as_ref()) {
            Ok(last) => last,
            Err(e) => {
                CLAIMED_DRIVERS.lock().remove(&addr);
                return Err(e);
            }
        };

        tracing::debug!(last_seq = last, "binlog opened");
        Ok(Self {
            driver,
            last_seq: ReentrantMutex::new(Cell::new(last)),
            delete_lock: Mutex::new(()),
            enabled: AtomicBool::new(config.binlog_enabled),
            max_size: AtomicUsize::new(config.binlog_max_size),
            record_value: AtomicBool::new(config.binlog_record_value),
            sync: config.sync_writes,
        })
    }

    /// Turns logging on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Returns true if writes are logged.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Sets the number of entries kept by [`Binlog::delete_expired`].
    pub fn set_max_size(&self, max_size: usize) {
        self.max_size.store(max_size, Ordering::SeqCst);
    }

    /// Returns the retention size.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size.load(Ordering::SeqCst)
    }

    /// Sets whether entries carry the new value.
    pub fn set_record_value(&self, record_value: bool) {
        self.record_value.store(record_value, Ordering::SeqCst);
    }

    /// Returns true if entries carry the new value.
    #[must_use]
    pub fn records_value(&self) -> bool {
        self.record_value.load(Ordering::SeqCst)
    }

    /// Returns the last issued sequence (0 before the first entry).
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq.lock().get()
    }

    /// Appends an entry.
    ///
    /// With a `batch` the entry is queued there and becomes visible when the
    /// caller writes the batch; otherwise it is written immediately. `value`
    /// is stored only when new values are recorded.
    ///
    /// Returns the entry's sequence, or `None` when logging is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded or written; the
    /// sequence is not consumed in that case.
    pub fn add_log(
        &self,
        optype: OpType,
        key: &str,
        value: Option<&Value>,
        old_value: Option<&Value>,
        batch: Option<&mut WriteBatch>,
    ) -> CoreResult<Option<u64>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let last = self.last_seq.lock();
        let seq = last.get() + 1;
        let entry = BinlogEntry {
            seq,
            optype,
            key: key.to_string(),
            old_value: old_value.cloned(),
            value: if self.records_value() {
                value.cloned()
            } else {
                None
            },
        };
        let body = serde_json::to_value(&entry)
            .map_err(CodecError::serialize)
            .and_then(|body| encode_value(&body))?;

        match batch {
            Some(batch) => {
                batch.put(record_key(seq), body);
            }
            None => self.driver.put(record_key(seq).as_bytes(), &body, self.sync)?,
        }
        last.set(seq);
        Ok(Some(seq))
    }

    /// Writes `batch` for one record mutation together with its entry.
    ///
    /// The old value is read and the batch written while the sequence lock
    /// is held, so sequence order is commit order and `old_value` is exactly
    /// what this write replaced. On a failed write the sequence is rolled
    /// back.
    pub(crate) fn commit(
        &self,
        optype: OpType,
        key: &str,
        record: Option<&Record>,
        mut batch: WriteBatch,
    ) -> CoreResult<Option<u64>> {
        let last = self.last_seq.lock();
        let previous = last.get();

        let old_value = self
            .driver
            .get(key.as_bytes())?
            .map(|bytes| tablekv_codec::decode(&bytes).into_value());
        let value = if self.records_value() {
            record.map(|r| Value::from(r.clone()))
        } else {
            None
        };

        let seq = self.add_log(optype, key, value.as_ref(), old_value.as_ref(), Some(&mut batch))?;
        if let Err(e) = self.driver.write(batch, self.sync) {
            last.set(previous);
            return Err(e.into());
        }
        Ok(seq)
    }

    /// Returns up to `limit` entries with sequence greater than `last_seq`,
    /// oldest first.
    ///
    /// A `last_seq` of 0 reads the table from its first key, which also
    /// picks up entries with legacy decimal ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails or an entry is malformed.
    pub fn list(&self, last_seq: u64, limit: usize) -> CoreResult<Vec<BinlogEntry>> {
        let options = match last_seq {
            0 => table_range(),
            u64::MAX => return Ok(Vec::new()),
            seq => table_range().key_from(record_key(seq + 1)),
        };

        let mut entries = Vec::new();
        for item in self.driver.range_iter(options)?.take(limit) {
            let item = item?;
            let mut entry: BinlogEntry = serde_json::from_slice(item.value.as_deref().unwrap_or_default())
                .map_err(CodecError::deserialize)?;
            entry.seq = seq_of_key(&item.key)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn count_size(&self) -> CoreResult<usize> {
        let mut count = 0;
        for item in self.driver.range_iter(table_range().include_value(false))? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Returns the oldest stored sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn first_seq(&self) -> CoreResult<Option<u64>> {
        self.driver
            .range_iter(table_range().include_value(false))?
            .next()
            .transpose()?
            .map(|entry| seq_of_key(&entry.key))
            .transpose()
    }

    /// Deletes the oldest entries until at most `max_size` remain.
    ///
    /// Returns the number of deleted entries.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_size` is 0, or a driver error.
    pub fn delete_expired(&self) -> CoreResult<usize> {
        let max_size = self.max_size();
        if max_size == 0 {
            return Err(CoreError::configuration("binlog max_size must be greater than 0"));
        }

        let _guard = self.delete_lock.lock();
        let size = self.count_size()?;
        if size <= max_size {
            return Ok(0);
        }

        let excess = size - max_size;
        let mut deleted = 0;
        let mut batch = WriteBatch::new();
        for item in self
            .driver
            .range_iter(table_range().include_value(false))?
            .take(excess)
        {
            batch.delete(item?.key);
            if batch.len() >= DELETE_BATCH_SIZE {
                deleted += batch.len();
                self.driver.write(std::mem::take(&mut batch), self.sync)?;
            }
        }
        if !batch.is_empty() {
            deleted += batch.len();
            self.driver.write(batch, self.sync)?;
        }

        tracing::info!(size, max_size, deleted, "binlog trimmed");
        Ok(deleted)
    }
}

impl Drop for Binlog {
    fn drop(&mut self) {
        CLAIMED_DRIVERS.lock().remove(&driver_addr(&self.driver));
    }
}

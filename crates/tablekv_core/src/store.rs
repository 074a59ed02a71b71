//! Store facade.

use crate::binlog::{Binlog, OpType, BINLOG_TABLE};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::ids::{IdGenerator, IdType};
use crate::iter::{normalize_prefix, PrefixIter, PrefixQuery};
use crate::lock::RecordLocks;
use crate::registry::{TableRegistry, KEY_SEPARATOR};
use crate::table::Table;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tablekv_codec::{decode, encode, Decoded, Record};
use tablekv_storage::{open_driver, Driver, DriverConfig, MemoryDriver, RangeOptions, WriteBatch};

/// The main store handle.
///
/// A `Store` owns everything a process needs to work with one driver:
/// - the table registry every written key is checked against
/// - record locks and the ID generator
/// - the binlog, which mirrors writes made through the store
///
/// # Example
///
/// ```rust
/// use tablekv_core::{IdType, Store};
/// use tablekv_codec::Record;
///
/// let store = Store::in_memory().unwrap();
/// store.register_table("note", "notes").unwrap();
///
/// let notes = store.table("note").unwrap();
/// let key = notes.insert(&Record::from_iter([("title", "a")]), IdType::TimeSeq).unwrap();
/// assert_eq!(notes.get_by_key(&key).unwrap().unwrap().get_str("title"), Some("a"));
/// ```
pub struct Store {
    driver: Arc<dyn Driver>,
    config: Config,
    registry: TableRegistry,
    locks: RecordLocks,
    ids: IdGenerator,
    binlog: Binlog,
    writes_since_trim: AtomicU64,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("driver", &self.driver.name())
            .field("config", &self.config)
            .field("tables", &self.registry.len())
            .field("binlog", &self.binlog)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Store`].
#[derive(Default)]
pub struct StoreBuilder {
    driver: Option<Arc<dyn Driver>>,
    driver_config: Option<DriverConfig>,
    config: Config,
}

impl fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("driver", &self.driver.as_ref().map(|d| d.name()))
            .field("driver_config", &self.driver_config)
            .field("config", &self.config)
            .finish()
    }
}

impl StoreBuilder {
    /// Uses an already opened driver.
    #[must_use]
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Opens a driver from `config` at build time.
    #[must_use]
    pub fn driver_config(mut self, config: DriverConfig) -> Self {
        self.driver_config = Some(config);
        self
    }

    /// Sets the store configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if no driver was given, or the
    /// driver's error if it fails to open.
    pub fn build(self) -> CoreResult<Store> {
        let driver = match (self.driver, self.driver_config) {
            (Some(driver), _) => driver,
            (None, Some(config)) => open_driver(&config)?,
            (None, None) => {
                return Err(CoreError::configuration("no storage driver configured"))
            }
        };
        Store::open(driver, self.config)
    }
}

impl Store {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Opens a store over `driver`.
    ///
    /// At most one store may be open on a driver at a time; dropping the
    /// store releases it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if another store is open on
    /// `driver`, or an error if the binlog state cannot be read.
    pub fn open(driver: Arc<dyn Driver>, config: Config) -> CoreResult<Self> {
        let registry = TableRegistry::new();
        registry.register_in(BINLOG_TABLE, "replication change log", "system")?;
        let binlog = Binlog::open(Arc::clone(&driver), &config)?;

        tracing::debug!(driver = driver.name(), read_only = config.read_only, "store opened");
        Ok(Self {
            driver,
            ids: IdGenerator::new(config.id_lock_slots),
            config,
            registry,
            locks: RecordLocks::new(),
            binlog,
            writes_since_trim: AtomicU64::new(0),
        })
    }

    /// Opens a store over a fresh [`MemoryDriver`] with default configuration.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`Store::open`].
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(Arc::new(MemoryDriver::new()), Config::default())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the table registry.
    #[must_use]
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Registers a table in the default category.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is invalid.
    pub fn register_table(&self, name: &str, description: &str) -> CoreResult<()> {
        self.registry.register(name, description)
    }

    /// Registers a table in `category`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is invalid.
    pub fn register_table_in(&self, name: &str, description: &str, category: &str) -> CoreResult<()> {
        self.registry.register_in(name, description, category)
    }

    /// Returns the record locks.
    #[must_use]
    pub fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    /// Returns the ID generator.
    #[must_use]
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Returns the binlog.
    #[must_use]
    pub fn binlog(&self) -> &Binlog {
        &self.binlog
    }

    /// Returns the raw driver.
    ///
    /// Writes made directly on the driver skip the registry check, the
    /// write guard and the binlog.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Returns a view of a registered table.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the table is not registered.
    pub fn table(&self, name: &str) -> CoreResult<Table<'_>> {
        self.registry.check(name)?;
        Ok(Table::new(self, name))
    }

    /// Reads and decodes the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn get(&self, key: &str) -> CoreResult<Option<Decoded>> {
        Ok(self.driver.get(key.as_bytes())?.map(|bytes| decode(&bytes)))
    }

    /// Stores `record` at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnly`] under the write guard, a validation
    /// error if the key's table is not registered, or a driver error.
    pub fn put(&self, key: &str, record: &Record) -> CoreResult<()> {
        self.write(OpType::Put, key, Some(record))
    }

    /// Stores `record` under a new ID in `table` and returns its key.
    ///
    /// # Errors
    ///
    /// Same as [`Store::put`].
    pub fn insert(&self, table: &str, record: &Record, id_type: IdType) -> CoreResult<String> {
        let key = self.new_key(table, id_type);
        self.put(&key, record)?;
        Ok(key)
    }

    /// Removes `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`Store::put`].
    pub fn delete(&self, key: &str) -> CoreResult<()> {
        self.write(OpType::Delete, key, None)
    }

    /// Scans `[key_from, key_to]`; `None` leaves a side open.
    ///
    /// # Errors
    ///
    /// Returns an error if `key_from > key_to` or the driver fails.
    pub fn scan(
        &self,
        key_from: Option<&str>,
        key_to: Option<&str>,
        reverse: bool,
    ) -> CoreResult<PrefixIter<'_>> {
        PrefixIter::range(self.driver.as_ref(), key_from, key_to, reverse)
    }

    /// Scans every key under `prefix`.
    ///
    /// The prefix is normalized to end with `:`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty prefix, `key_from` with
    /// `reverse`, or a `key_from` outside the prefix.
    pub fn prefix_iter<'a>(&'a self, prefix: &str, query: PrefixQuery<'a>) -> CoreResult<PrefixIter<'a>> {
        PrefixIter::open(self.driver.as_ref(), prefix, query)
    }

    /// Collects [`Store::prefix_iter`].
    ///
    /// # Errors
    ///
    /// Same as [`Store::prefix_iter`], plus driver errors while scanning.
    pub fn prefix_list(&self, prefix: &str, query: PrefixQuery<'_>) -> CoreResult<Vec<(String, Decoded)>> {
        self.prefix_iter(prefix, query)?.collect()
    }

    /// Counts keys under `prefix` accepted by `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`Store::prefix_list`].
    pub fn prefix_count<'a>(
        &'a self,
        prefix: &str,
        filter: Option<Box<dyn FnMut(&str, &Decoded) -> bool + 'a>>,
    ) -> CoreResult<usize> {
        let mut query = PrefixQuery::new();
        if let Some(filter) = filter {
            query = query.filter(filter);
        }
        let mut count = 0;
        for item in self.prefix_iter(prefix, query)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Counts keys under `name:` without reading values.
    ///
    /// `name` may itself carry subkeys, e.g. `note:alice`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name, or a driver error.
    pub fn count_table(&self, name: &str) -> CoreResult<usize> {
        let prefix = normalize_prefix(name)?;
        let mut upper = prefix.clone().into_bytes();
        upper.push(0xFF);
        let options = RangeOptions::new()
            .key_from(prefix)
            .key_to(upper)
            .include_value(false);

        let mut count = 0;
        for item in self.driver.range_iter(options)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Builds `prefix:<new id>`; `prefix` may include subkeys.
    pub(crate) fn new_key(&self, prefix: &str, id_type: IdType) -> String {
        let prefix = prefix.trim_end_matches(KEY_SEPARATOR);
        let id = self.ids.generate(id_type, prefix);
        format!("{prefix}{KEY_SEPARATOR}{id}")
    }

    fn check_writable(&self) -> CoreResult<()> {
        if self.config.read_only {
            Err(CoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// The logged write path.
    fn write(&self, optype: OpType, key: &str, record: Option<&Record>) -> CoreResult<()> {
        self.check_writable()?;
        self.registry.check_key(key)?;

        let mut batch = WriteBatch::new();
        match record {
            Some(record) => {
                batch.put(key, encode(record)?);
            }
            None => {
                batch.delete(key);
            }
        }

        if self.binlog.is_enabled() {
            let seq = self.binlog.commit(optype, key, record, batch)?;
            tracing::debug!(%optype, key, ?seq, "logged write");
            self.maybe_trim_binlog();
        } else {
            self.driver.write(batch, self.config.sync_writes)?;
            tracing::debug!(%optype, key, "write");
        }
        Ok(())
    }

    fn maybe_trim_binlog(&self) {
        let interval = self.config.binlog_trim_interval;
        if interval == 0 {
            return;
        }
        let writes = self.writes_since_trim.fetch_add(1, Ordering::SeqCst) + 1;
        if writes < interval {
            return;
        }
        self.writes_since_trim.store(0, Ordering::SeqCst);
        if let Err(e) = self.binlog.delete_expired() {
            tracing::warn!(error = %e, "binlog trimming failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(title: &str) -> Record {
        Record::from_iter([("title", title)])
    }

    fn logged_store(config: Config) -> Store {
        let store = Store::builder()
            .driver(Arc::new(MemoryDriver::new()))
            .config(config.binlog_enabled(true))
            .build()
            .unwrap();
        store.register_table("note", "notes").unwrap();
        store
    }

    #[test]
    fn builder_without_driver_fails() {
        let err = Store::builder().build().unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn builder_with_driver_config() {
        let store = Store::builder()
            .driver_config(DriverConfig::memory())
            .build()
            .unwrap();
        assert_eq!(store.driver().name(), "memory");
    }

    #[test]
    fn put_requires_registered_table() {
        let store = Store::in_memory().unwrap();
        let err = store.put("note:1", &note("a")).unwrap_err();
        assert!(err.is_validation());
        assert!(store.driver().get(b"note:1").unwrap().is_none());

        store.register_table("note", "").unwrap();
        store.put("note:1", &note("a")).unwrap();
        let value = store.get("note:1").unwrap().unwrap();
        assert_eq!(value.as_record().unwrap().get_str("title"), Some("a"));
    }

    #[test]
    fn reads_do_not_check_registry() {
        let store = Store::in_memory().unwrap();
        store.driver().put(b"legacy:1", b"42", false).unwrap();
        assert_eq!(store.get("legacy:1").unwrap(), Some(Decoded::Value(json!(42))));
        assert_eq!(store.count_table("legacy").unwrap(), 1);
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = Store::open(Arc::new(MemoryDriver::new()), Config::new().read_only(true)).unwrap();
        store.register_table("note", "").unwrap();
        assert!(matches!(store.put("note:1", &note("a")), Err(CoreError::ReadOnly)));
        assert!(matches!(store.delete("note:1"), Err(CoreError::ReadOnly)));
    }

    #[test]
    fn insert_builds_table_key() {
        let store = Store::in_memory().unwrap();
        store.register_table("note", "").unwrap();
        let key = store.insert("note", &note("a"), IdType::TimeSeq).unwrap();
        assert!(key.starts_with("note:"));
        assert_eq!(key.len(), "note:".len() + crate::ids::TIMESEQ_WIDTH);
    }

    #[test]
    fn logged_writes_carry_old_values() {
        let store = logged_store(Config::new().binlog_record_value(true));
        store.put("note:1", &note("a")).unwrap();
        store.put("note:1", &note("b")).unwrap();
        store.delete("note:1").unwrap();

        let entries = store.binlog().list(0, 10).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].old_value, None);
        assert_eq!(entries[0].value, Some(json!({"title": "a"})));
        assert_eq!(entries[1].old_value, Some(json!({"title": "a"})));
        assert_eq!(entries[2].optype, OpType::Delete);
        assert_eq!(entries[2].old_value, Some(json!({"title": "b"})));
        assert_eq!(entries[2].value, None);
    }

    #[test]
    fn automatic_trim_runs_every_interval() {
        let store = logged_store(Config::new().binlog_max_size(3).binlog_trim_interval(5));
        for i in 0..4 {
            store.put(&format!("note:{i}"), &note("x")).unwrap();
        }
        assert_eq!(store.binlog().count_size().unwrap(), 4);

        store.put("note:4", &note("x")).unwrap();
        assert_eq!(store.binlog().count_size().unwrap(), 3);
        assert_eq!(store.binlog().first_seq().unwrap(), Some(3));
    }

    #[test]
    fn binlog_table_is_registered() {
        let store = Store::in_memory().unwrap();
        assert!(store.registry().contains(BINLOG_TABLE));
    }

    #[test]
    fn prefix_count_with_filter() {
        let store = Store::in_memory().unwrap();
        store.register_table("note", "").unwrap();
        store.put("note:1", &note("a")).unwrap();
        store.put("note:2", &note("b")).unwrap();

        assert_eq!(store.prefix_count("note", None).unwrap(), 2);
        let only_a: Box<dyn FnMut(&str, &Decoded) -> bool> = Box::new(|_: &str, v: &Decoded| {
            v.as_record().and_then(|r| r.get_str("title")) == Some("a")
        });
        assert_eq!(store.prefix_count("note", Some(only_a)).unwrap(), 1);
    }
}

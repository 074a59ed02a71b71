//! Test fixtures and store helpers.
//!
//! Provides convenience functions for opening stores over each driver and
//! for common test scenarios.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablekv_core::{Config, Store};
use tablekv_storage::{Driver, DriverKind, LogDriver, MemoryDriver, RedbDriver};
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    path: Option<PathBuf>,
    /// Kept alive so the data file outlives the store.
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Opens a store over a fresh memory driver.
    pub fn memory() -> Self {
        Self::open(DriverKind::Memory, Config::default())
    }

    /// Opens a store over a log driver in a temporary directory.
    pub fn log() -> Self {
        Self::open(DriverKind::Log, Config::default())
    }

    /// Opens a store over a redb driver in a temporary directory.
    pub fn redb() -> Self {
        Self::open(DriverKind::Redb, Config::default())
    }

    /// Opens a store over `kind` with `config`.
    pub fn open(kind: DriverKind, config: Config) -> Self {
        let temp_dir = kind
            .is_persistent()
            .then(|| TempDir::new().expect("Failed to create temp directory"));
        let path = temp_dir
            .as_ref()
            .map(|dir| dir.path().join(format!("test.{kind}")));
        let driver = match (&path, kind) {
            (Some(path), DriverKind::Log) => open_log(path),
            (Some(path), DriverKind::Redb) => open_redb(path),
            _ => Arc::new(MemoryDriver::new()) as Arc<dyn Driver>,
        };

        Self {
            store: Store::open(driver, config).expect("Failed to open store"),
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the data file path, `None` for the memory driver.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes the store and opens the same data file again.
    ///
    /// Table registrations are not persisted, so callers register again.
    ///
    /// # Panics
    ///
    /// Panics for the memory driver, which has nothing to reopen.
    pub fn reopen(self, config: Config) -> Self {
        let Self {
            store,
            path,
            _temp_dir,
        } = self;
        let kind = match store.driver().name() {
            "log" => DriverKind::Log,
            "redb" => DriverKind::Redb,
            other => panic!("Cannot reopen a {other} store"),
        };
        drop(store);

        let path = path.expect("Persistent store should have a path");
        let driver = match kind {
            DriverKind::Log => open_log(&path),
            _ => open_redb(&path),
        };
        Self {
            store: Store::open(driver, config).expect("Failed to reopen store"),
            path: Some(path),
            _temp_dir,
        }
    }
}

fn open_log(path: &Path) -> Arc<dyn Driver> {
    Arc::new(LogDriver::open(path).expect("Failed to open log driver"))
}

fn open_redb(path: &Path) -> Arc<dyn Driver> {
    Arc::new(RedbDriver::open(path).expect("Failed to open redb driver"))
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Every driver kind, for tests that run against all of them.
pub const ALL_DRIVERS: [DriverKind; 3] = [DriverKind::Memory, DriverKind::Log, DriverKind::Redb];

/// Runs `f` once per driver with a fresh store.
pub fn for_each_driver<F>(config: Config, mut f: F)
where
    F: FnMut(DriverKind, &Store),
{
    for kind in ALL_DRIVERS {
        let test_store = TestStore::open(kind, config.clone());
        f(kind, &test_store.store);
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use tablekv_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     store.register_table("note", "").unwrap();
///     assert!(store.registry().contains("note"));
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use tablekv_core::IdType;

    /// Creates a memory store with table `note` holding `count` records
    /// `{"index": i}` under time-sequence keys, in insertion order.
    pub fn populated_table(count: usize) -> (TestStore, Vec<String>) {
        let test_store = TestStore::memory();
        test_store
            .register_table("note", "test notes")
            .expect("Failed to register table");
        let notes = test_store.table("note").expect("Table should exist");

        let keys = (0..count)
            .map(|i| {
                notes
                    .insert(&serde_json::json!({ "index": i }), IdType::TimeSeq)
                    .expect("Failed to insert record")
            })
            .collect();
        (test_store, keys)
    }

    /// Creates a memory store with table `note` and `per_user` records for
    /// each of `users`.
    pub fn multi_user_table(users: &[&str], per_user: usize) -> TestStore {
        let test_store = TestStore::memory();
        test_store
            .register_table("note", "test notes")
            .expect("Failed to register table");
        let notes = test_store.table("note").expect("Table should exist");

        for user in users {
            for i in 0..per_user {
                notes
                    .insert_by_user(user, &serde_json::json!({ "user": user, "index": i }), IdType::TimeSeq)
                    .expect("Failed to insert record");
            }
        }
        test_store
    }
}

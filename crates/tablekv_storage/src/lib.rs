//! # tablekv storage
//!
//! Ordered byte key-value driver contract and its implementations.
//!
//! Drivers are **opaque byte stores**: they order keys byte-wise and never
//! interpret values. Tables, records and the binlog live in higher layers.
//!
//! ## Design Principles
//!
//! - One contract for every engine: get, put, delete, range scan, batch, snapshot
//! - Range scans are lazy and batched, so no engine lock is held between items
//! - Must be `Send + Sync` so one driver can be shared by the whole process
//!
//! ## Available Drivers
//!
//! - [`MemoryDriver`] - For testing and ephemeral storage
//! - [`LogDriver`] - Log-structured single file with crash recovery
//! - [`RedbDriver`] - Embedded B-tree store
//!
//! ## Example
//!
//! ```rust
//! use tablekv_storage::{Driver, MemoryDriver, RangeOptions};
//!
//! let driver = MemoryDriver::new();
//! driver.put(b"note:2", b"{}", false).unwrap();
//! driver.put(b"note:1", b"{}", false).unwrap();
//!
//! let keys: Vec<Vec<u8>> = driver
//!     .range_iter(RangeOptions::new())
//!     .unwrap()
//!     .map(|entry| entry.unwrap().key)
//!     .collect();
//! assert_eq!(keys, vec![b"note:1".to_vec(), b"note:2".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod driver;
mod error;
mod log;
mod memory;
mod range;
mod redb_driver;

pub use batch::{BatchOp, WriteBatch};
pub use config::{open_driver, DriverConfig, DriverKind};
pub use driver::{Driver, KvEntry, KvIter, RangeOptions, Snapshot};
pub use error::{StorageError, StorageResult};
pub use log::{LogConfig, LogDriver, LogSnapshot, LogStats};
pub use memory::{MemoryDriver, MemorySnapshot};
pub use range::DEFAULT_BATCH_SIZE;
pub use redb_driver::{RedbConfig, RedbDriver, RedbSnapshot};

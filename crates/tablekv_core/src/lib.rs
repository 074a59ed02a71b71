//! # tablekv core
//!
//! Virtual tables over an ordered key-value driver.
//!
//! This crate provides:
//! - A table registry; every written key must belong to a registered table
//! - Table views with insert, update, delete, paging and counting
//! - Lazy prefix iteration with filter, offset and limit
//! - Named record locks and a time-sequence ID generator
//! - A binlog recording every write made through the [`Store`]
//! - A schema manager for tables on a relational engine
//!
//! ## Key layout
//!
//! Keys are UTF-8 and colon-delimited: `table:id` or `table:user:id`.
//! Values are JSON records (see `tablekv_codec`).
//!
//! ## Example
//!
//! ```rust
//! use tablekv_core::{Config, IdType, Store};
//! use tablekv_storage::MemoryDriver;
//! use std::sync::Arc;
//!
//! let store = Store::builder()
//!     .driver(Arc::new(MemoryDriver::new()))
//!     .config(Config::new().binlog_enabled(true))
//!     .build()
//!     .unwrap();
//! store.register_table("note", "notes").unwrap();
//!
//! let notes = store.table("note").unwrap();
//! notes.insert(&serde_json::json!({"title": "a"}), IdType::TimeSeq).unwrap();
//!
//! assert_eq!(notes.count().unwrap(), 1);
//! assert_eq!(store.binlog().list(0, 10).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod binlog;
mod config;
mod error;
mod ids;
mod iter;
mod lock;
mod registry;
pub mod schema;
mod store;
mod table;

pub use binlog::{Binlog, BinlogEntry, OpType};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use ids::{IdGenerator, IdType, TIMESEQ_WIDTH};
pub use iter::{normalize_prefix, Filter, PrefixIter, PrefixQuery, Values};
pub use lock::{LockPool, RecordLockGuard, RecordLocks, DEFAULT_LOCK_SLOTS};
pub use registry::{table_of, validate_table_name, TableInfo, TableRegistry, DEFAULT_CATEGORY, KEY_SEPARATOR};
pub use schema::{ColumnInfo, Dialect, SqlExecutor, TableManager};
pub use store::{Store, StoreBuilder};
pub use table::Table;

//! # tablekv testkit
//!
//! Test utilities for tablekv.
//!
//! This crate provides:
//! - Store fixtures over every driver, with temporary files cleaned up on drop
//! - Property-based test generators using proptest
//! - A driver contract suite and a model-checked driver harness
//! - Stress helpers for concurrent inserts, record locks and the binlog
//!
//! ## Usage
//!
//! ```rust
//! use tablekv_testkit::prelude::*;
//!
//! let store = TestStore::memory();
//! store.register_table("note", "").unwrap();
//! assert_eq!(store.table("note").unwrap().count().unwrap(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contract::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use contract::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;

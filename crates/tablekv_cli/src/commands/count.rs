//! Count command implementation.

use super::{emit, Target};
use serde::Serialize;

/// Number of keys under a prefix.
#[derive(Debug, Serialize)]
pub struct CountResult {
    /// Normalized prefix.
    pub prefix: String,
    /// Number of keys.
    pub count: usize,
}

/// Runs the count command.
pub fn run(target: &Target, prefix: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = target.open_store()?;
    let result = CountResult {
        prefix: tablekv_core::normalize_prefix(prefix)?,
        count: store.count_table(prefix)?,
    };
    emit(format, &result, |r| println!("{}\t{}", r.prefix, r.count))
}

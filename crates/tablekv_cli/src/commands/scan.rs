//! Scan command implementation.

use super::{emit, Target};
use serde::Serialize;
use serde_json::Value;
use tablekv_core::{PrefixQuery, Store};

/// One scanned entry.
#[derive(Debug, Serialize)]
pub struct ScanEntry {
    /// Key.
    pub key: String,
    /// Decoded value.
    pub value: Value,
}

/// Runs the scan command.
pub fn run(
    target: &Target,
    prefix: Option<&str>,
    offset: usize,
    limit: Option<usize>,
    reverse: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = target.open_store()?;
    let entries = collect(&store, prefix, offset, limit, reverse)?;
    emit(format, &entries, |entries| print_text_output(entries))
}

/// Collects a page of entries, under `prefix` if given.
pub fn collect(
    store: &Store,
    prefix: Option<&str>,
    offset: usize,
    limit: Option<usize>,
    reverse: bool,
) -> Result<Vec<ScanEntry>, Box<dyn std::error::Error>> {
    let iter = match prefix {
        Some(prefix) => {
            let mut query = PrefixQuery::new().offset(offset).reverse(reverse);
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            store.prefix_iter(prefix, query)?
        }
        None => store.scan(None, None, reverse)?,
    };

    // Prefix scans page inside the iterator; plain scans page here.
    let (skip, take) = match prefix {
        Some(_) => (0, usize::MAX),
        None => (offset, limit.unwrap_or(usize::MAX)),
    };
    let mut entries = Vec::new();
    for item in iter.skip(skip).take(take) {
        let (key, value) = item?;
        entries.push(ScanEntry {
            key,
            value: value.into_value(),
        });
    }
    Ok(entries)
}

fn print_text_output(entries: &[ScanEntry]) {
    for entry in entries {
        println!("{}\t{}", entry.key, entry.value);
    }
    println!("({} entries)", entries.len());
}

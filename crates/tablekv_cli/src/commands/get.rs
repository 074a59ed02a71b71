//! Get command implementation.

use super::{emit, Target};
use serde::Serialize;
use serde_json::Value;
use tablekv_core::Store;

/// A key and its decoded value.
#[derive(Debug, Serialize)]
pub struct GetResult {
    /// Requested key.
    pub key: String,
    /// Stored value; `None` if the key is absent.
    pub value: Option<Value>,
    /// True if the stored bytes were not valid JSON.
    pub raw: bool,
}

/// Runs the get command.
pub fn run(target: &Target, key: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = target.open_store()?;
    let result = lookup(&store, key)?;
    emit(format, &result, print_text_output)
}

/// Reads `key` from `store`.
pub fn lookup(store: &Store, key: &str) -> Result<GetResult, Box<dyn std::error::Error>> {
    let decoded = store.get(key)?;
    let raw = decoded.as_ref().is_some_and(|d| d.is_raw());
    Ok(GetResult {
        key: key.to_string(),
        value: decoded.map(|d| d.into_value()),
        raw,
    })
}

fn print_text_output(result: &GetResult) {
    match &result.value {
        Some(value) if result.raw => println!("{} (not JSON): {value}", result.key),
        Some(value) => println!("{value}"),
        None => println!("{}: not found", result.key),
    }
}

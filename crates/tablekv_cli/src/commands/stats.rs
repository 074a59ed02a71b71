//! Stats command implementation.

use super::{emit, Target};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tablekv_core::{table_of, Config, Store};
use tablekv_storage::{DriverKind, LogDriver, RangeOptions};

/// Store statistics.
#[derive(Debug, Serialize)]
pub struct StatsResult {
    /// Driver name.
    pub driver: String,
    /// Data file path, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Data file size in bytes, if the store has a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Bytes held by dead log frames (log driver only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_bytes: Option<u64>,
    /// Total number of keys.
    pub key_count: usize,
    /// Keys per table, by first key segment.
    pub tables: BTreeMap<String, usize>,
    /// Keys without a table segment.
    pub untabled_keys: usize,
    /// Number of binlog entries.
    pub binlog_size: usize,
    /// Oldest binlog sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binlog_first_seq: Option<u64>,
    /// Newest binlog sequence.
    pub binlog_last_seq: u64,
}

/// Runs the stats command.
pub fn run(target: &Target, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = match target.kind {
        DriverKind::Log => {
            let driver = Arc::new(LogDriver::open(target.path()?)?);
            let log_stats = driver.stats();
            let store = Store::open(driver, Config::new().read_only(true))?;
            let mut result = collect(&store)?;
            result.file_size = Some(log_stats.file_size);
            result.dead_bytes = Some(log_stats.dead_bytes());
            result
        }
        DriverKind::Redb => {
            let path = target.path()?;
            let mut result = collect(&target.open_store()?)?;
            result.file_size = Some(std::fs::metadata(path)?.len());
            result
        }
        DriverKind::Memory => collect(&target.open_store()?)?,
    };
    result.path = target.path.as_ref().map(|p| p.display().to_string());
    emit(format, &result, print_text_output)
}

/// Gathers key and binlog statistics from `store`.
pub fn collect(store: &Store) -> Result<StatsResult, Box<dyn std::error::Error>> {
    let mut tables = BTreeMap::new();
    let mut key_count = 0;
    let mut untabled_keys = 0;
    for item in store
        .driver()
        .range_iter(RangeOptions::new().include_value(false))?
    {
        let key = item?.key;
        key_count += 1;
        match table_of(&String::from_utf8_lossy(&key)) {
            Some(table) => *tables.entry(table.to_string()).or_insert(0) += 1,
            None => untabled_keys += 1,
        }
    }

    let binlog = store.binlog();
    Ok(StatsResult {
        driver: store.driver().name().to_string(),
        path: None,
        file_size: None,
        dead_bytes: None,
        key_count,
        tables,
        untabled_keys,
        binlog_size: binlog.count_size()?,
        binlog_first_seq: binlog.first_seq()?,
        binlog_last_seq: binlog.last_seq(),
    })
}

fn print_text_output(result: &StatsResult) {
    println!("Store Statistics");
    println!("================");
    println!("Driver:     {}", result.driver);
    if let Some(path) = &result.path {
        println!("Path:       {path}");
    }
    if let Some(size) = result.file_size {
        println!("File size:  {size} bytes");
    }
    if let Some(dead) = result.dead_bytes {
        println!("Dead bytes: {dead} bytes");
    }
    println!("Keys:       {}", result.key_count);
    println!();
    println!("Tables:");
    for (table, count) in &result.tables {
        println!("  {table:<20} {count}");
    }
    if result.untabled_keys > 0 {
        println!("  (no table)           {}", result.untabled_keys);
    }
    println!();
    println!("Binlog:");
    println!("  Entries:  {}", result.binlog_size);
    match result.binlog_first_seq {
        Some(first) => println!("  Sequence: {first}..={}", result.binlog_last_seq),
        None => println!("  Sequence: {}", result.binlog_last_seq),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekv_codec::Record;
    use tablekv_storage::MemoryDriver;

    #[test]
    fn collect_groups_keys_by_table() {
        let store = Store::builder()
            .driver(Arc::new(MemoryDriver::new()))
            .config(Config::new().binlog_enabled(true))
            .build()
            .unwrap();
        store.register_table("note", "").unwrap();
        store.register_table("user", "").unwrap();
        store.put("note:1", &Record::new()).unwrap();
        store.put("note:2", &Record::new()).unwrap();
        store.put("user:1", &Record::new()).unwrap();
        store.driver().put(b"orphan", b"1", false).unwrap();

        let stats = collect(&store).unwrap();
        assert_eq!(stats.key_count, 7);
        assert_eq!(stats.tables["note"], 2);
        assert_eq!(stats.tables["user"], 1);
        assert_eq!(stats.tables["_binlog"], 3);
        assert_eq!(stats.untabled_keys, 1);
        assert_eq!(stats.binlog_size, 3);
        assert_eq!(stats.binlog_first_seq, Some(1));
        assert_eq!(stats.binlog_last_seq, 3);
    }
}

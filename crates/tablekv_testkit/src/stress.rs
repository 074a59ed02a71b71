//! Stress helpers for tablekv.
//!
//! These exercise stores under concurrent access. Each helper returns a
//! [`StressTestResult`] and leaves invariant checks to the caller.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tablekv_codec::Record;
use tablekv_core::{IdType, Store};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Table the helpers write to; must be registered.
    pub table: String,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            table: "stress".to_string(),
        }
    }
}

impl StressConfig {
    /// Small configuration for unit tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            operations: 25,
            threads: 4,
            ..Self::default()
        }
    }
}

/// Inserts from every thread concurrently and returns the result with all
/// generated keys.
pub fn stress_concurrent_inserts(
    store: &Store,
    config: &StressConfig,
    id_type: IdType,
) -> (StressTestResult, Vec<String>) {
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    let keys: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|t| {
                let failed = &failed;
                scope.spawn(move || {
                    let table = store.table(&config.table).expect("Stress table must be registered");
                    let mut keys = Vec::with_capacity(config.operations);
                    for i in 0..config.operations {
                        let record = Record::from_iter([("thread", t), ("index", i)]);
                        match table.insert(&record, id_type) {
                            Ok(key) => keys.push(key),
                            Err(_) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                    keys
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("Stress thread panicked"))
            .collect()
    });

    let result = StressTestResult::new(keys.len(), failed.into_inner(), start.elapsed());
    (result, keys)
}

/// Increments one counter record from every thread with a read-modify-write
/// guarded by a record lock. Returns the result and the final counter.
pub fn stress_locked_counter(store: &Store, config: &StressConfig) -> (StressTestResult, i64) {
    let key = format!("{}:counter", config.table);
    store
        .put(&key, &Record::from_iter([("n", 0)]))
        .expect("Failed to seed counter");

    let failed = AtomicUsize::new(0);
    let successful = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                for _ in 0..config.operations {
                    let _guard = store
                        .locks()
                        .acquire(&key, None)
                        .expect("Unbounded wait always acquires");
                    let current = store
                        .get(&key)
                        .ok()
                        .flatten()
                        .and_then(|v| v.into_record())
                        .and_then(|r| r.get_i64("n"))
                        .unwrap_or(0);
                    match store.put(&key, &Record::from_iter([("n", current + 1)])) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    let result = StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    );
    let counter = store
        .get(&key)
        .expect("Failed to read counter")
        .and_then(|v| v.into_record())
        .and_then(|r| r.get_i64("n"))
        .unwrap_or(0);
    (result, counter)
}

/// Returns the keys that appear more than once.
pub fn duplicates(keys: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|key| !seen.insert(key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    #[test]
    fn concurrent_inserts_make_unique_keys() {
        let store = TestStore::memory();
        store.register_table("stress", "").unwrap();
        let config = StressConfig::quick();

        let (result, keys) = stress_concurrent_inserts(&store, &config, IdType::TimeSeq);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(keys.len(), config.threads * config.operations);
        assert!(duplicates(&keys).is_empty());
    }

    #[test]
    fn locked_counter_loses_no_updates() {
        let store = TestStore::memory();
        store.register_table("stress", "").unwrap();
        let config = StressConfig::quick();

        let (result, counter) = stress_locked_counter(&store, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(counter, (config.threads * config.operations) as i64);
    }
}

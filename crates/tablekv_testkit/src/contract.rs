//! Driver contract suite.
//!
//! Every [`Driver`] must behave the same way for the operations checked
//! here. The checks assume an empty driver and panic on the first
//! violation.

use std::collections::BTreeMap;
use tablekv_storage::{Driver, RangeOptions, WriteBatch};

fn collect(driver: &dyn Driver, options: RangeOptions) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
    driver
        .range_iter(options)
        .expect("Failed to open range")
        .map(|entry| {
            let entry = entry.expect("Range item failed");
            (entry.key, entry.value)
        })
        .collect()
}

fn keys(driver: &dyn Driver, options: RangeOptions) -> Vec<Vec<u8>> {
    collect(driver, options).into_iter().map(|(k, _)| k).collect()
}

/// Checks get, put, overwrite and delete.
pub fn check_get_put_delete(driver: &dyn Driver) {
    assert_eq!(driver.get(b"k").unwrap(), None);

    driver.put(b"k", b"v1", false).unwrap();
    assert_eq!(driver.get(b"k").unwrap(), Some(b"v1".to_vec()));

    driver.put(b"k", b"v2", true).unwrap();
    assert_eq!(driver.get(b"k").unwrap(), Some(b"v2".to_vec()));

    driver.delete(b"k", false).unwrap();
    assert_eq!(driver.get(b"k").unwrap(), None);

    // Deleting a missing key is not an error.
    driver.delete(b"k", false).unwrap();

    driver.put(b"empty", b"", false).unwrap();
    assert_eq!(driver.get(b"empty").unwrap(), Some(Vec::new()));
    driver.delete(b"empty", false).unwrap();
}

/// Checks that a batch applies its operations in order.
pub fn check_batch(driver: &dyn Driver) {
    driver.put(b"b:gone", b"x", false).unwrap();

    let mut batch = WriteBatch::new();
    batch
        .put(b"b:1".to_vec(), b"one".to_vec())
        .put(b"b:2".to_vec(), b"two".to_vec())
        .delete(b"b:gone".to_vec())
        .put(b"b:1".to_vec(), b"uno".to_vec());
    driver.write(batch, false).unwrap();

    assert_eq!(driver.get(b"b:1").unwrap(), Some(b"uno".to_vec()));
    assert_eq!(driver.get(b"b:2").unwrap(), Some(b"two".to_vec()));
    assert_eq!(driver.get(b"b:gone").unwrap(), None);

    driver.write(WriteBatch::new(), false).unwrap();

    let mut cleanup = WriteBatch::new();
    cleanup.delete(b"b:1".to_vec()).delete(b"b:2".to_vec());
    driver.write(cleanup, true).unwrap();
    assert!(keys(driver, RangeOptions::new()).is_empty());
}

/// Checks range bounds, direction and keys-only scans.
pub fn check_range(driver: &dyn Driver) {
    for key in ["r:a", "r:b", "r:c", "r:d", "s:a"] {
        driver.put(key.as_bytes(), key.as_bytes(), false).unwrap();
    }

    let all = keys(driver, RangeOptions::new());
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0] < w[1]), "keys must ascend");

    let bounded = keys(driver, RangeOptions::new().key_from("r:b").key_to("r:c"));
    assert_eq!(bounded, vec![b"r:b".to_vec(), b"r:c".to_vec()]);

    let mut reverse = keys(driver, RangeOptions::new().reverse(true));
    reverse.reverse();
    assert_eq!(reverse, all, "reverse scan must be the exact reverse");

    let tail = keys(driver, RangeOptions::new().key_from("r:c").reverse(true));
    assert_eq!(tail, vec![b"s:a".to_vec(), b"r:d".to_vec(), b"r:c".to_vec()]);

    let keys_only = collect(driver, RangeOptions::new().key_to("r:b").include_value(false));
    assert_eq!(keys_only, vec![(b"r:a".to_vec(), None), (b"r:b".to_vec(), None)]);

    let with_values = collect(driver, RangeOptions::new().key_from("s:a"));
    assert_eq!(with_values, vec![(b"s:a".to_vec(), Some(b"s:a".to_vec()))]);

    assert!(driver
        .range_iter(RangeOptions::new().key_from("z").key_to("a"))
        .is_err());

    for key in ["r:a", "r:b", "r:c", "r:d", "s:a"] {
        driver.delete(key.as_bytes(), false).unwrap();
    }
}

/// Checks that a snapshot does not see later writes.
pub fn check_snapshot_isolation(driver: &dyn Driver) {
    driver.put(b"snap:1", b"before", false).unwrap();
    let snapshot = driver.create_snapshot().unwrap();

    driver.put(b"snap:1", b"after", false).unwrap();
    driver.put(b"snap:2", b"new", false).unwrap();

    assert_eq!(snapshot.get(b"snap:1").unwrap(), Some(b"before".to_vec()));
    assert_eq!(snapshot.get(b"snap:2").unwrap(), None);
    let seen: Vec<Vec<u8>> = snapshot
        .range_iter(RangeOptions::new())
        .unwrap()
        .map(|e| e.unwrap().key)
        .collect();
    assert_eq!(seen, vec![b"snap:1".to_vec()]);
    drop(snapshot);

    assert_eq!(driver.get(b"snap:1").unwrap(), Some(b"after".to_vec()));
    driver.delete(b"snap:1", false).unwrap();
    driver.delete(b"snap:2", false).unwrap();
}

/// Checks that writes made while a range is being iterated don't break it.
pub fn check_write_during_iteration(driver: &dyn Driver) {
    for i in 0..600u32 {
        driver.put(format!("w:{i:04}").as_bytes(), b"x", false).unwrap();
    }

    let mut seen = 0;
    for entry in driver.range_iter(RangeOptions::new().key_from("w:")).unwrap() {
        let entry = entry.unwrap();
        driver.delete(&entry.key, false).unwrap();
        seen += 1;
    }
    assert_eq!(seen, 600);
    assert!(keys(driver, RangeOptions::new()).is_empty());
}

/// Runs every contract check in sequence on an empty driver.
pub fn run_driver_contract(driver: &dyn Driver) {
    check_get_put_delete(driver);
    check_batch(driver);
    check_range(driver);
    check_snapshot_isolation(driver);
    check_write_during_iteration(driver);
}

/// A driver paired with an in-memory model of what it should contain.
pub struct ModelHarness<'a> {
    driver: &'a dyn Driver,
    model: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a> ModelHarness<'a> {
    /// Wraps an empty driver.
    pub fn new(driver: &'a dyn Driver) -> Self {
        Self {
            driver,
            model: BTreeMap::new(),
        }
    }

    /// Applies `op` to both the driver and the model.
    pub fn apply(&mut self, op: &crate::generators::KvOperation) {
        use crate::generators::KvOperation;

        match op {
            KvOperation::Put { key, value } => {
                self.driver.put(key, value, false).expect("Failed to put");
                self.model.insert(key.clone(), value.clone());
            }
            KvOperation::Delete { key } => {
                self.driver.delete(key, false).expect("Failed to delete");
                self.model.remove(key);
            }
            KvOperation::Batch(ops) => {
                let mut batch = WriteBatch::new();
                for (key, value) in ops {
                    match value {
                        Some(value) => {
                            batch.put(key.clone(), value.clone());
                            self.model.insert(key.clone(), value.clone());
                        }
                        None => {
                            batch.delete(key.clone());
                            self.model.remove(key);
                        }
                    }
                }
                self.driver.write(batch, false).expect("Failed to write batch");
            }
        }
    }

    /// Asserts that a full forward and reverse scan match the model.
    pub fn verify_all(&self) {
        let forward = collect(self.driver, RangeOptions::new());
        let expected: Vec<_> = self
            .model
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect();
        assert_eq!(forward, expected, "forward scan differs from model");

        let mut reverse = collect(self.driver, RangeOptions::new().reverse(true));
        reverse.reverse();
        assert_eq!(reverse, expected, "reverse scan differs from model");

        for (key, value) in &self.model {
            assert_eq!(self.driver.get(key).unwrap().as_ref(), Some(value));
        }
    }

    /// Returns the number of keys the model holds.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}

//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, records and driver operations
//! that respect the key layout rules.

use proptest::prelude::*;
use serde_json::Value;
use tablekv_codec::Record;

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating key segments (user names, ids).
pub fn key_segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,12}").expect("Invalid regex")
}

/// Strategy for generating scalar JSON field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 éü中]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for generating records with up to eight fields.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::vec(
        (
            prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
            field_value_strategy(),
        ),
        0..8,
    )
    .prop_map(|fields| fields.into_iter().collect())
}

/// One operation against a driver.
#[derive(Debug, Clone)]
pub enum KvOperation {
    /// Store a value.
    Put {
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Key.
        key: Vec<u8>,
    },
    /// Apply puts (`Some`) and deletes (`None`) as one batch.
    Batch(Vec<(Vec<u8>, Option<Vec<u8>>)>),
}

/// Strategy for keys from a small key space, so operations collide.
pub fn small_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    (0u8..4, 0u8..16).prop_map(|(table, id)| format!("t{table}:{id:02}").into_bytes())
}

/// Strategy for generating driver operations.
pub fn kv_operation_strategy() -> impl Strategy<Value = KvOperation> {
    let value = prop::collection::vec(any::<u8>(), 0..32);
    prop_oneof![
        4 => (small_key_strategy(), value.clone())
            .prop_map(|(key, value)| KvOperation::Put { key, value }),
        2 => small_key_strategy().prop_map(|key| KvOperation::Delete { key }),
        1 => prop::collection::vec(
            (small_key_strategy(), prop::option::of(value)),
            1..6,
        )
        .prop_map(KvOperation::Batch),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<KvOperation>> {
    prop::collection::vec(kv_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekv_core::validate_table_name;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn table_names_are_registrable(name in table_name_strategy()) {
            prop_assert!(validate_table_name(&name).is_ok());
        }

        #[test]
        fn key_segments_have_no_separator(segment in key_segment_strategy()) {
            prop_assert!(!segment.is_empty());
            prop_assert!(!segment.contains(':'));
        }

        #[test]
        fn records_encode(record in record_strategy()) {
            let bytes = tablekv_codec::encode(&record).unwrap();
            prop_assert_eq!(tablekv_codec::decode(&bytes).into_record(), Some(record));
        }
    }
}

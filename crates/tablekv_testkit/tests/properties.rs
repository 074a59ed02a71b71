//! Property tests over the store.

use proptest::prelude::*;
use tablekv_core::{Config, IdType, PrefixQuery};
use tablekv_storage::DriverKind;
use tablekv_testkit::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn inserted_records_read_back_equal(
        table in table_name_strategy(),
        user in key_segment_strategy(),
        records in prop::collection::vec(record_strategy(), 1..10),
    ) {
        let store = TestStore::memory();
        store.register_table(&table, "").unwrap();
        let view = store.table(&table).unwrap();

        for record in &records {
            let key = view.insert_by_user(&user, record, IdType::Uuid).unwrap();
            prop_assert!(view.is_valid_key(&key, Some(&user)));
            let back = view.get_by_key(&key).unwrap().unwrap();
            prop_assert_eq!(&back, record);
        }
        prop_assert_eq!(view.count_by_user(&user).unwrap(), records.len());
    }

    #[test]
    fn binlog_lists_every_write(writes in 1usize..60) {
        let store = TestStore::open(
            DriverKind::Memory,
            Config::new().binlog_enabled(true).binlog_trim_interval(0),
        );
        store.register_table("note", "").unwrap();
        let mut keys = Vec::new();
        for i in 0..writes {
            let key = format!("note:{}", i % 5);
            store.put(&key, &tablekv_codec::Record::new()).unwrap();
            keys.push(key);
        }

        let entries = store.binlog().list(0, writes).unwrap();
        prop_assert_eq!(entries.len(), writes);
        prop_assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
        let logged: Vec<String> = entries.into_iter().map(|e| e.key).collect();
        prop_assert_eq!(logged, keys);
    }

    #[test]
    fn trimming_keeps_exactly_retention(size in 1usize..300, retention in 1usize..150) {
        let store = TestStore::open(
            DriverKind::Memory,
            Config::new()
                .binlog_enabled(true)
                .binlog_trim_interval(0)
                .binlog_max_size(retention),
        );
        store.register_table("note", "").unwrap();
        for i in 0..size {
            store.put(&format!("note:{i}"), &tablekv_codec::Record::new()).unwrap();
        }

        let deleted = store.binlog().delete_expired().unwrap();
        prop_assert_eq!(deleted, size.saturating_sub(retention));
        prop_assert_eq!(store.binlog().count_size().unwrap(), size.min(retention));
        let first = store.binlog().first_seq().unwrap();
        prop_assert_eq!(first, Some((size.saturating_sub(retention) + 1) as u64));
    }

    #[test]
    fn prefix_pages_concatenate_to_full_scan(count in 0usize..25, page in 1usize..7) {
        let (store, keys) = scenarios::populated_table(count);
        let mut paged = Vec::new();
        let mut offset = 0;
        loop {
            let chunk: Vec<String> = store
                .prefix_iter("note", PrefixQuery::new().offset(offset).limit(page))
                .unwrap()
                .map(|item| item.unwrap().0)
                .collect();
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len();
            paged.extend(chunk);
        }
        prop_assert_eq!(paged, keys);
    }
}

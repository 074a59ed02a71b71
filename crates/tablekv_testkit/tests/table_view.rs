//! Table views over every driver.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tablekv_codec::Record;
use tablekv_core::{Config, CoreError, IdType, PrefixQuery};
use tablekv_testkit::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    title: String,
    tags: Vec<String>,
}

#[test]
fn get_after_insert_returns_equal_record() {
    for_each_driver(Config::default(), |kind, store| {
        store.register_table("note", "notes").unwrap();
        let notes = store.table("note").unwrap();
        let note = Note {
            title: "grüße".to_string(),
            tags: vec!["a".to_string(), "中文".to_string()],
        };

        for id_type in [IdType::Uuid, IdType::TimeSeq] {
            let key = notes.insert(&note, id_type).unwrap();
            assert_eq!(notes.get_as::<Note>(&key).unwrap(), Some(note.clone()), "{kind}");
        }
    });
}

#[test]
fn rapid_timeseq_inserts_sort_in_order() {
    let store = TestStore::memory();
    store.register_table("note", "").unwrap();
    let notes = store.table("note").unwrap();

    let first = notes.insert(&json!({"title": "a"}), IdType::TimeSeq).unwrap();
    let second = notes.insert(&json!({"title": "a"}), IdType::TimeSeq).unwrap();
    assert_ne!(first, second);
    assert!(second > first);
}

#[test]
fn prefix_iter_offset_and_limit_pick_middle_records() {
    let (store, keys) = scenarios::populated_table(5);
    let found: Vec<String> = store
        .prefix_iter("note:", PrefixQuery::new().offset(1).limit(2))
        .unwrap()
        .map(|item| item.unwrap().0)
        .collect();
    assert_eq!(found, keys[1..3].to_vec());
}

#[test]
fn listing_order_is_stable_and_reversible() {
    for_each_driver(Config::default(), |kind, store| {
        store.register_table("note", "").unwrap();
        let notes = store.table("note").unwrap();
        for i in 0..20 {
            notes.insert_by_user("alice", &json!({ "i": i }), IdType::TimeSeq).unwrap();
        }

        let forward: Vec<String> = notes
            .list_by_user("alice", 0, None, false)
            .unwrap()
            .into_iter()
            .map(|r| r.key().unwrap().to_string())
            .collect();
        assert_eq!(forward.len(), 20, "{kind}");
        assert!(forward.windows(2).all(|w| w[0] < w[1]), "{kind}");

        let mut reverse: Vec<String> = notes
            .list_by_user("alice", 0, None, true)
            .unwrap()
            .into_iter()
            .map(|r| r.key().unwrap().to_string())
            .collect();
        reverse.reverse();
        assert_eq!(forward, reverse, "{kind}");
    });
}

#[test]
fn cross_table_delete_leaves_store_unchanged() {
    for_each_driver(Config::new().binlog_enabled(true), |kind, store| {
        store.register_table("note", "").unwrap();
        store.register_table("user", "").unwrap();
        store.put("user:1", &Record::from_iter([("name", "bob")])).unwrap();
        let before = store.binlog().last_seq();

        let notes = store.table("note").unwrap();
        let err = notes.delete_by_key("user:1").unwrap_err();
        assert!(err.is_validation(), "{kind}");
        assert!(store.get("user:1").unwrap().is_some(), "{kind}");
        assert_eq!(store.binlog().last_seq(), before, "{kind}");
    });
}

#[test]
fn writes_to_unregistered_tables_fail() {
    let store = TestStore::memory();
    let err = store.put("ghost:1", &Record::new()).unwrap_err();
    assert!(err.is_validation());
    assert!(store.get("ghost:1").unwrap().is_none());

    let err = store.put("nocolon", &Record::new()).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn read_only_store_rejects_table_writes() {
    let store = TestStore::open(
        tablekv_storage::DriverKind::Memory,
        Config::new().read_only(true),
    );
    store.register_table("note", "").unwrap();
    let notes = store.table("note").unwrap();
    assert!(matches!(
        notes.insert(&json!({"a": 1}), IdType::Uuid),
        Err(CoreError::ReadOnly)
    ));
    assert_eq!(notes.count().unwrap(), 0);
}

#[test]
fn users_are_isolated() {
    let store = scenarios::multi_user_table(&["alice", "bob", "bobby"], 3);
    let notes = store.table("note").unwrap();
    assert_eq!(notes.count().unwrap(), 9);
    assert_eq!(notes.count_by_user("bob").unwrap(), 3);

    let bobs = notes.list_by_user("bob", 0, None, false).unwrap();
    assert!(bobs.iter().all(|r| r.get_str("user") == Some("bob")));

    let late = notes
        .count_by_func(Some("bobby"), |_, r| r.get_i64("index") >= Some(1))
        .unwrap();
    assert_eq!(late, 2);
}

#[test]
fn update_then_read_back() {
    for_each_driver(Config::default(), |kind, store| {
        store.register_table("note", "").unwrap();
        let notes = store.table("note").unwrap();
        let key = notes.insert(&json!({"title": "draft"}), IdType::Uuid).unwrap();

        let mut record = notes.get_by_key(&key).unwrap().unwrap();
        record.set("title", "final");
        record.set("done", true);
        notes.update(&record).unwrap();

        let back = notes.get_by_key(&key).unwrap().unwrap();
        assert_eq!(back.get_str("title"), Some("final"), "{kind}");
        assert_eq!(back.get_bool("done"), Some(true), "{kind}");
        assert_eq!(back, record, "{kind}");
    });
}

//! Table views.

use crate::error::{CoreError, CoreResult};
use crate::ids::IdType;
use crate::iter::PrefixQuery;
use crate::registry::KEY_SEPARATOR;
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tablekv_codec::{CodecError, Decoded, Record};

/// A view of one registered table.
///
/// Keys of the table look like `name:<id>` or, for per-user rows,
/// `name:<user>:<id>`. Every operation of the view stays inside the
/// `name:` prefix.
#[derive(Debug, Clone)]
pub struct Table<'s> {
    store: &'s Store,
    name: String,
    prefix: String,
}

impl<'s> Table<'s> {
    pub(crate) fn new(store: &'s Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            prefix: format!("{name}{KEY_SEPARATOR}"),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the key prefix, `name:`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Joins `segments` under the table prefix.
    ///
    /// ```
    /// # use tablekv_core::Store;
    /// let store = Store::in_memory().unwrap();
    /// store.register_table("note", "").unwrap();
    /// let notes = store.table("note").unwrap();
    /// assert_eq!(notes.build_key(&["alice", "1"]).unwrap(), "note:alice:1");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a validation error if there are no segments, or a segment is
    /// empty or contains `:`.
    pub fn build_key(&self, segments: &[&str]) -> CoreResult<String> {
        if segments.is_empty() {
            return Err(CoreError::validation("key needs at least one segment"));
        }
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || s.contains(KEY_SEPARATOR))
        {
            return Err(CoreError::validation(format!("invalid key segment '{bad}'")));
        }
        Ok(format!("{}{}", self.prefix, segments.join(":")))
    }

    /// Returns true if `key` belongs to this table, and to `user` if given.
    ///
    /// Keys with an empty segment, such as `note::1`, are never valid.
    #[must_use]
    pub fn is_valid_key(&self, key: &str, user: Option<&str>) -> bool {
        let Some(rest) = key.strip_prefix(&self.prefix) else {
            return false;
        };
        let segments_ok = |s: &str| s.split(KEY_SEPARATOR).all(|segment| !segment.is_empty());
        match user {
            None => segments_ok(rest),
            Some(user) if user.is_empty() => false,
            Some(user) => rest
                .strip_prefix(user)
                .and_then(|r| r.strip_prefix(KEY_SEPARATOR))
                .is_some_and(segments_ok),
        }
    }

    fn check_key(&self, key: &str) -> CoreResult<()> {
        if self.is_valid_key(key, None) {
            Ok(())
        } else {
            Err(CoreError::validation(format!(
                "key '{key}' is not in table '{}'",
                self.name
            )))
        }
    }

    fn user_prefix(&self, user: &str) -> CoreResult<String> {
        Ok(format!("{}{KEY_SEPARATOR}", self.build_key(&[user])?))
    }

    /// Reads the record at `key`, with its key attached.
    ///
    /// # Errors
    ///
    /// Returns a validation error for keys outside the table, a codec error
    /// if the stored value is not a record, or a driver error.
    pub fn get_by_key(&self, key: &str) -> CoreResult<Option<Record>> {
        self.check_key(key)?;
        match self.store.get(key)? {
            None => Ok(None),
            Some(Decoded::Record(record)) => Ok(Some(record.with_key(key))),
            Some(Decoded::Value(value)) => Err(CodecError::NotAMapping {
                found: tablekv_codec::json_type_name(&value),
            }
            .into()),
            Some(Decoded::Raw(_)) => Err(CoreError::Codec(CodecError::deserialize(format!(
                "value at '{key}' is not valid JSON"
            )))),
        }
    }

    /// Reads the record at `key` into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Table::get_by_key`], plus a codec error if the record does
    /// not fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        self.get_by_key(key)?
            .map(|record| record.to_typed().map_err(CoreError::from))
            .transpose()
    }

    /// Stores `value` under a new ID and returns its key.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `value` does not serialize to a
    /// mapping, otherwise the errors of [`Store::put`].
    pub fn insert<T: Serialize + ?Sized>(&self, value: &T, id_type: IdType) -> CoreResult<String> {
        let record = to_record(value)?;
        self.store.insert(&self.name, &record, id_type)
    }

    /// Stores `value` under a new ID in `user`'s partition and returns its
    /// key, `name:<user>:<id>`.
    ///
    /// # Errors
    ///
    /// Same as [`Table::insert`], plus a validation error for a bad user.
    pub fn insert_by_user<T: Serialize + ?Sized>(
        &self,
        user: &str,
        value: &T,
        id_type: IdType,
    ) -> CoreResult<String> {
        let record = to_record(value)?;
        let prefix = self.build_key(&[user])?;
        self.store.insert(&prefix, &record, id_type)
    }

    /// Writes `record` back to its own key.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record has no key or its key is
    /// outside the table.
    pub fn update(&self, record: &Record) -> CoreResult<()> {
        let key = record
            .key()
            .ok_or_else(|| CoreError::validation("record has no key"))?;
        self.update_by_key(key, record)
    }

    /// Replaces the record at `key`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `key` is outside the table.
    pub fn update_by_key(&self, key: &str, record: &Record) -> CoreResult<()> {
        self.check_key(key)?;
        self.store.put(key, record)
    }

    /// Deletes the record at its own key.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record has no key or its key is
    /// outside the table.
    pub fn delete(&self, record: &Record) -> CoreResult<()> {
        let key = record
            .key()
            .ok_or_else(|| CoreError::validation("record has no key"))?;
        self.delete_by_key(key)
    }

    /// Deletes the record at `key`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `key` is outside the table.
    pub fn delete_by_key(&self, key: &str) -> CoreResult<()> {
        self.check_key(key)?;
        self.store.delete(key)
    }

    /// Lists records of the table, skipping values that are not records.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn list(&self, offset: usize, limit: Option<usize>, reverse: bool) -> CoreResult<Vec<Record>> {
        self.collect(&self.prefix, |_, _| true, offset, limit, reverse)
    }

    /// Lists `user`'s records.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad user, or a driver error.
    pub fn list_by_user(
        &self,
        user: &str,
        offset: usize,
        limit: Option<usize>,
        reverse: bool,
    ) -> CoreResult<Vec<Record>> {
        let prefix = self.user_prefix(user)?;
        self.collect(&prefix, |_, _| true, offset, limit, reverse)
    }

    /// Lists records accepted by `filter`, optionally within `user`'s
    /// partition. `offset` and `limit` count accepted records.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad user, or a driver error.
    pub fn list_by_func<'f>(
        &'f self,
        user: Option<&str>,
        filter: impl FnMut(&str, &Record) -> bool + 'f,
        offset: usize,
        limit: Option<usize>,
        reverse: bool,
    ) -> CoreResult<Vec<Record>> {
        let prefix = self.partition(user)?;
        self.collect(&prefix, filter, offset, limit, reverse)
    }

    /// Counts keys of the table without reading values.
    ///
    /// Values that are not records are counted too, so this can exceed the
    /// length of [`Table::list`]. Use [`Table::count_by_func`] to count
    /// records only.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub fn count(&self) -> CoreResult<usize> {
        self.store.count_table(&self.prefix)
    }

    /// Counts keys in `user`'s partition; like [`Table::count`], values
    /// that are not records are included.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad user, or a driver error.
    pub fn count_by_user(&self, user: &str) -> CoreResult<usize> {
        self.store.count_table(&self.user_prefix(user)?)
    }

    /// Counts records accepted by `filter`, optionally within `user`'s
    /// partition.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad user, or a driver error.
    pub fn count_by_func<'f>(
        &'f self,
        user: Option<&str>,
        filter: impl FnMut(&str, &Record) -> bool + 'f,
    ) -> CoreResult<usize> {
        let prefix = self.partition(user)?;
        let mut count = 0;
        for item in self.store.prefix_iter(&prefix, record_query(filter))? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn partition(&self, user: Option<&str>) -> CoreResult<String> {
        match user {
            Some(user) => self.user_prefix(user),
            None => Ok(self.prefix.clone()),
        }
    }

    fn collect<'f>(
        &'f self,
        prefix: &str,
        filter: impl FnMut(&str, &Record) -> bool + 'f,
        offset: usize,
        limit: Option<usize>,
        reverse: bool,
    ) -> CoreResult<Vec<Record>> {
        let mut query = record_query(filter).offset(offset).reverse(reverse);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        self.store
            .prefix_iter(prefix, query)?
            .map(|item| {
                let (key, value) = item?;
                Ok(value.into_record().unwrap_or_default().with_key(key))
            })
            .collect()
    }
}

/// A query that keeps records accepted by `filter` and skips other values.
fn record_query<'f>(mut filter: impl FnMut(&str, &Record) -> bool + 'f) -> PrefixQuery<'f> {
    PrefixQuery::new().filter(move |key: &str, value: &Decoded| {
        value.as_record().is_some_and(|record| filter(key, record))
    })
}

fn to_record<T: Serialize + ?Sized>(value: &T) -> CoreResult<Record> {
    Record::from_serialize(value).map_err(|e| match e {
        CodecError::NotAMapping { .. } => CoreError::validation(e.to_string()),
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        stars: i64,
    }

    fn store() -> Store {
        let store = Store::in_memory().unwrap();
        store.register_table("note", "notes").unwrap();
        store.register_table("notebook", "notebooks").unwrap();
        store
    }

    fn note(title: &str, stars: i64) -> Note {
        Note {
            title: title.to_string(),
            stars,
        }
    }

    #[test]
    fn build_key_rejects_bad_segments() {
        let store = store();
        let notes = store.table("note").unwrap();
        assert_eq!(notes.build_key(&["1"]).unwrap(), "note:1");
        assert!(notes.build_key(&[]).unwrap_err().is_validation());
        assert!(notes.build_key(&["a:b"]).unwrap_err().is_validation());
        assert!(notes.build_key(&[""]).unwrap_err().is_validation());
    }

    #[test]
    fn is_valid_key_checks_table_and_user() {
        let store = store();
        let notes = store.table("note").unwrap();
        assert!(notes.is_valid_key("note:1", None));
        assert!(!notes.is_valid_key("note:", None));
        assert!(!notes.is_valid_key("notebook:1", None));
        assert!(notes.is_valid_key("note:alice:1", Some("alice")));
        assert!(!notes.is_valid_key("note:alicia:1", Some("alice")));
        assert!(!notes.is_valid_key("note:alice:", Some("alice")));
    }

    #[test]
    fn empty_segments_are_invalid() {
        let store = store();
        let notes = store.table("note").unwrap();
        assert!(!notes.is_valid_key("note::1", None));
        assert!(!notes.is_valid_key("note:1:", None));
        assert!(!notes.is_valid_key("note:alice::1", Some("alice")));
        assert!(!notes.is_valid_key("note::1", Some("")));

        store.driver().put(b"note::1", b"{}", false).unwrap();
        assert!(notes.delete_by_key("note::1").unwrap_err().is_validation());
        assert!(notes
            .update_by_key("note::1", &Record::new())
            .unwrap_err()
            .is_validation());
        assert!(store.get("note::1").unwrap().is_some());
    }

    #[test]
    fn unregistered_table_has_no_view() {
        let store = store();
        assert!(store.table("user").unwrap_err().is_validation());
    }

    #[test]
    fn insert_and_get_typed() {
        let store = store();
        let notes = store.table("note").unwrap();
        let key = notes.insert(&note("a", 3), IdType::Uuid).unwrap();

        let record = notes.get_by_key(&key).unwrap().unwrap();
        assert_eq!(record.key(), Some(key.as_str()));
        assert_eq!(record.get_i64("stars"), Some(3));
        assert_eq!(notes.get_as::<Note>(&key).unwrap(), Some(note("a", 3)));
    }

    #[test]
    fn insert_rejects_non_mapping() {
        let store = store();
        let notes = store.table("note").unwrap();
        assert!(notes.insert(&[1, 2, 3], IdType::Uuid).unwrap_err().is_validation());
        assert_eq!(notes.count().unwrap(), 0);
    }

    #[test]
    fn get_non_record_is_codec_error() {
        let store = store();
        store.driver().put(b"note:1", b"[1]", false).unwrap();
        let notes = store.table("note").unwrap();
        assert!(matches!(notes.get_by_key("note:1"), Err(CoreError::Codec(_))));
        assert!(notes.get_by_key("note:2").unwrap().is_none());
    }

    #[test]
    fn update_round_trips_through_key() {
        let store = store();
        let notes = store.table("note").unwrap();
        let key = notes.insert(&note("a", 1), IdType::TimeSeq).unwrap();

        let mut record = notes.get_by_key(&key).unwrap().unwrap();
        record.set("stars", 5);
        notes.update(&record).unwrap();
        assert_eq!(notes.get_as::<Note>(&key).unwrap(), Some(note("a", 5)));

        assert!(notes.update(&Record::new()).unwrap_err().is_validation());
        let foreign = Record::new().with_key("notebook:1");
        assert!(notes.update(&foreign).unwrap_err().is_validation());
        assert!(store.get("notebook:1").unwrap().is_none());
    }

    #[test]
    fn delete_stays_in_table() {
        let store = store();
        store.put("notebook:1", &Record::from_iter([("n", 1)])).unwrap();
        let notes = store.table("note").unwrap();
        assert!(notes.delete_by_key("notebook:1").unwrap_err().is_validation());
        assert!(store.get("notebook:1").unwrap().is_some());

        let key = notes.insert(&note("a", 1), IdType::Uuid).unwrap();
        let record = notes.get_by_key(&key).unwrap().unwrap();
        notes.delete(&record).unwrap();
        assert!(notes.get_by_key(&key).unwrap().is_none());
    }

    #[test]
    fn list_excludes_longer_table_names_and_non_records() {
        let store = store();
        store.put("note:1", &Record::from_iter([("n", 1)])).unwrap();
        store.put("note:2", &Record::from_iter([("n", 2)])).unwrap();
        store.put("notebook:1", &Record::from_iter([("n", 9)])).unwrap();
        store.driver().put(b"note:3", b"\"text\"", false).unwrap();

        let notes = store.table("note").unwrap();
        let listed = notes.list(0, None, false).unwrap();
        let keys: Vec<_> = listed.iter().map(|r| r.key().unwrap()).collect();
        assert_eq!(keys, vec!["note:1", "note:2"]);

        let reversed = notes.list(0, Some(1), true).unwrap();
        assert_eq!(reversed[0].key(), Some("note:2"));
        assert_eq!(notes.count().unwrap(), 3);
    }

    #[test]
    fn per_user_partitions() {
        let store = store();
        let notes = store.table("note").unwrap();
        for i in 0..3 {
            notes.insert_by_user("alice", &note("a", i), IdType::TimeSeq).unwrap();
        }
        notes.insert_by_user("alicia", &note("b", 0), IdType::TimeSeq).unwrap();

        assert_eq!(notes.count_by_user("alice").unwrap(), 3);
        assert_eq!(notes.count_by_user("alicia").unwrap(), 1);
        assert_eq!(notes.count().unwrap(), 4);

        let page = notes.list_by_user("alice", 1, Some(1), false).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get_i64("stars"), Some(1));
        assert!(notes.is_valid_key(page[0].key().unwrap(), Some("alice")));
    }

    #[test]
    fn list_and_count_by_func() {
        let store = store();
        let notes = store.table("note").unwrap();
        for i in 0..6 {
            notes.insert(&json!({"stars": i}), IdType::TimeSeq).unwrap();
        }
        let starred = |_: &str, r: &Record| r.get_i64("stars").is_some_and(|s| s >= 2);

        assert_eq!(notes.count_by_func(None, starred).unwrap(), 4);
        store.driver().put(b"note:zz", b"[1]", false).unwrap();
        assert_eq!(notes.count_by_func(None, |_, _| true).unwrap(), 6);
        assert_eq!(notes.count().unwrap(), 7);
        let page = notes.list_by_func(None, starred, 1, Some(2), false).unwrap();
        let stars: Vec<_> = page.iter().filter_map(|r| r.get_i64("stars")).collect();
        assert_eq!(stars, vec![3, 4]);
    }
}

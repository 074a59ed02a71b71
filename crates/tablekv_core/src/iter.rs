//! Prefix and range iteration over decoded records.

use crate::error::{CoreError, CoreResult};
use crate::registry::KEY_SEPARATOR;
use std::fmt;
use tablekv_codec::{decode, Decoded};
use tablekv_storage::{Driver, KvIter, RangeOptions};

/// Upper-bound suffix for prefix scans. Never appears in UTF-8 keys.
const PREFIX_END: u8 = 0xFF;

/// Predicate applied to each `(key, value)` pair of a scan.
pub type Filter<'a> = Box<dyn FnMut(&str, &Decoded) -> bool + 'a>;

/// Returns `prefix` terminated by exactly one `:`.
///
/// # Errors
///
/// Returns a validation error for an empty prefix.
pub fn normalize_prefix(prefix: &str) -> CoreResult<String> {
    if prefix.is_empty() {
        return Err(CoreError::validation("prefix can not be empty"));
    }
    let mut prefix = prefix.to_string();
    if !prefix.ends_with(KEY_SEPARATOR) {
        prefix.push(KEY_SEPARATOR);
    }
    Ok(prefix)
}

/// Options of a prefix scan.
///
/// ```
/// use tablekv_core::PrefixQuery;
///
/// let query = PrefixQuery::new()
///     .offset(10)
///     .limit(20)
///     .filter(|_key, value| value.as_record().is_some());
/// ```
#[derive(Default)]
pub struct PrefixQuery<'a> {
    filter: Option<Filter<'a>>,
    offset: usize,
    limit: Option<usize>,
    reverse: bool,
    key_from: Option<String>,
}

impl fmt::Debug for PrefixQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixQuery")
            .field("filter", &self.filter.is_some())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("reverse", &self.reverse)
            .field("key_from", &self.key_from)
            .finish()
    }
}

impl<'a> PrefixQuery<'a> {
    /// Matches every key under the prefix, ascending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only pairs for which `filter` returns true.
    #[must_use]
    pub fn filter(mut self, filter: impl FnMut(&str, &Decoded) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Skips this many matches.
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Stops after this many matches.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the scan direction.
    #[must_use]
    pub const fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Starts a forward scan at this key instead of the prefix.
    #[must_use]
    pub fn key_from(mut self, key: impl Into<String>) -> Self {
        self.key_from = Some(key.into());
        self
    }
}

/// Lazy iterator over `(key, value)` pairs, produced by
/// [`crate::Store::prefix_iter`] and [`crate::Store::scan`].
///
/// Stops at the first key outside the prefix. Driver errors are yielded
/// once, then the iterator ends.
pub struct PrefixIter<'a> {
    inner: KvIter<'a>,
    prefix: Vec<u8>,
    filter: Option<Filter<'a>>,
    skip: usize,
    remaining: Option<usize>,
    done: bool,
}

impl fmt::Debug for PrefixIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixIter")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .field("skip", &self.skip)
            .field("remaining", &self.remaining)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'a> PrefixIter<'a> {
    /// Opens a prefix scan on `driver`.
    pub(crate) fn open(
        driver: &'a dyn Driver,
        prefix: &str,
        query: PrefixQuery<'a>,
    ) -> CoreResult<Self> {
        let prefix = normalize_prefix(prefix)?;
        let mut upper = prefix.clone().into_bytes();
        upper.push(PREFIX_END);

        let options = match (query.reverse, &query.key_from) {
            (true, Some(_)) => {
                return Err(CoreError::validation(
                    "key_from can not be combined with reverse",
                ))
            }
            (false, Some(from)) if !from.starts_with(&prefix) => {
                return Err(CoreError::validation(format!(
                    "key_from '{from}' does not start with '{prefix}'"
                )))
            }
            (reverse, key_from) => RangeOptions::new()
                .key_from(key_from.clone().unwrap_or_else(|| prefix.clone()))
                .key_to(upper)
                .reverse(reverse),
        };

        let inner = driver.range_iter(options)?;
        Ok(Self::new(inner, prefix.into_bytes(), query))
    }

    /// Opens a plain range scan; both bounds inclusive.
    pub(crate) fn range(
        driver: &'a dyn Driver,
        key_from: Option<&str>,
        key_to: Option<&str>,
        reverse: bool,
    ) -> CoreResult<Self> {
        let mut options = RangeOptions::new().reverse(reverse);
        if let Some(from) = key_from {
            options = options.key_from(from);
        }
        if let Some(to) = key_to {
            options = options.key_to(to);
        }
        let inner = driver.range_iter(options)?;
        Ok(Self::new(inner, Vec::new(), PrefixQuery::new()))
    }

    fn new(inner: KvIter<'a>, prefix: Vec<u8>, query: PrefixQuery<'a>) -> Self {
        Self {
            inner,
            prefix,
            filter: query.filter,
            skip: query.offset,
            remaining: query.limit,
            done: false,
        }
    }

    /// Drops keys, yielding values only.
    pub fn values(self) -> Values<'a> {
        Values { inner: self }
    }
}

impl Iterator for PrefixIter<'_> {
    type Item = CoreResult<(String, Decoded)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.remaining == Some(0) {
                return None;
            }
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if !entry.key.starts_with(&self.prefix) {
                self.done = true;
                return None;
            }

            let key = String::from_utf8_lossy(&entry.key).into_owned();
            let value = decode(entry.value.as_deref().unwrap_or_default());
            if let Some(filter) = self.filter.as_mut() {
                if !filter(&key, &value) {
                    continue;
                }
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Some(Ok((key, value)));
        }
    }
}

/// Value-only view of a [`PrefixIter`].
#[derive(Debug)]
pub struct Values<'a> {
    inner: PrefixIter<'a>,
}

impl Iterator for Values<'_> {
    type Item = CoreResult<Decoded>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| item.map(|(_, value)| value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekv_storage::MemoryDriver;

    fn driver_with(keys: &[&str]) -> MemoryDriver {
        MemoryDriver::with_data(
            keys.iter()
                .enumerate()
                .map(|(i, k)| (k.as_bytes().to_vec(), format!(r#"{{"n":{i}}}"#).into_bytes())),
        )
        .with_batch_size(2)
    }

    fn keys(iter: PrefixIter<'_>) -> Vec<String> {
        iter.map(|item| item.unwrap().0).collect()
    }

    #[test]
    fn normalize_adds_separator() {
        assert_eq!(normalize_prefix("note").unwrap(), "note:");
        assert_eq!(normalize_prefix("note:").unwrap(), "note:");
        assert!(normalize_prefix("").is_err());
    }

    #[test]
    fn prefix_does_not_leak_into_longer_names() {
        let driver = driver_with(&["note:1", "note:2", "notebook:1", "nota:1"]);
        let found = keys(PrefixIter::open(&driver, "note", PrefixQuery::new()).unwrap());
        assert_eq!(found, vec!["note:1", "note:2"]);
    }

    #[test]
    fn reverse_is_exact_reverse() {
        let driver = driver_with(&["a:1", "t:1", "t:2", "t:3", "u:1"]);
        let forward = keys(PrefixIter::open(&driver, "t", PrefixQuery::new()).unwrap());
        let mut reverse =
            keys(PrefixIter::open(&driver, "t", PrefixQuery::new().reverse(true)).unwrap());
        reverse.reverse();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn offset_and_limit_count_matches() {
        let driver = driver_with(&["t:1", "t:2", "t:3", "t:4", "t:5"]);
        let found = keys(
            PrefixIter::open(&driver, "t:", PrefixQuery::new().offset(1).limit(2)).unwrap(),
        );
        assert_eq!(found, vec!["t:2", "t:3"]);
    }

    #[test]
    fn offset_applies_after_filter() {
        let driver = driver_with(&["t:1", "t:2", "t:3", "t:4", "t:5", "t:6"]);
        let odd_n = |_: &str, v: &Decoded| {
            v.as_record()
                .and_then(|r| r.get_i64("n"))
                .is_some_and(|n| n % 2 == 1)
        };
        let found = keys(
            PrefixIter::open(&driver, "t", PrefixQuery::new().filter(odd_n).offset(1)).unwrap(),
        );
        assert_eq!(found, vec!["t:4", "t:6"]);
    }

    #[test]
    fn key_from_starts_mid_prefix() {
        let driver = driver_with(&["t:1", "t:2", "t:3"]);
        let found =
            keys(PrefixIter::open(&driver, "t", PrefixQuery::new().key_from("t:2")).unwrap());
        assert_eq!(found, vec!["t:2", "t:3"]);
    }

    #[test]
    fn key_from_validation() {
        let driver = driver_with(&[]);
        let reversed = PrefixIter::open(&driver, "t", PrefixQuery::new().key_from("t:1").reverse(true));
        assert!(reversed.unwrap_err().is_validation());

        let outside = PrefixIter::open(&driver, "t", PrefixQuery::new().key_from("u:1"));
        assert!(outside.unwrap_err().is_validation());
    }

    #[test]
    fn values_drop_keys() {
        let driver = driver_with(&["t:1"]);
        let values: Vec<Decoded> = PrefixIter::open(&driver, "t", PrefixQuery::new())
            .unwrap()
            .values()
            .map(Result::unwrap)
            .collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_record().unwrap().get_i64("n"), Some(0));
    }

    #[test]
    fn range_scan_is_inclusive() {
        let driver = driver_with(&["a", "b", "c", "d"]);
        let found = keys(PrefixIter::range(&driver, Some("b"), Some("c"), false).unwrap());
        assert_eq!(found, vec!["b", "c"]);
        let all = keys(PrefixIter::range(&driver, None, None, true).unwrap());
        assert_eq!(all, vec!["d", "c", "b", "a"]);
    }
}

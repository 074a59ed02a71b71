//! Batched range iteration shared by all drivers.
//!
//! Iterators never hold an engine lock between items. Each refill fetches at
//! most `batch_size` entries under the driver's lock, then the next refill
//! resumes strictly after the last key returned.

use crate::driver::{KvEntry, RangeOptions};
use crate::error::StorageResult;
use std::collections::VecDeque;
use std::ops::Bound;

/// Default number of entries fetched per refill.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Something that can return one ordered slice of a keyspace.
pub(crate) trait RangeSource {
    /// Returns at most `limit` entries inside `(lower, upper)`, ascending, or
    /// descending starting from `upper` when `reverse` is set.
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>>;
}

impl<T: RangeSource + ?Sized> RangeSource for &T {
    fn fetch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
        include_value: bool,
        limit: usize,
    ) -> StorageResult<Vec<KvEntry>> {
        (**self).fetch(lower, upper, reverse, include_value, limit)
    }
}

/// Returns true if no key can satisfy both bounds.
///
/// `BTreeMap::range` panics on such bounds, so sources check this first.
pub(crate) fn is_empty_range(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

fn as_ref_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Lazy iterator that pulls a range from a [`RangeSource`] batch by batch.
pub(crate) struct BatchedRangeIter<S> {
    source: S,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    reverse: bool,
    include_value: bool,
    batch_size: usize,
    buffer: VecDeque<KvEntry>,
    done: bool,
}

impl<S: RangeSource> BatchedRangeIter<S> {
    /// Creates an iterator for validated `options`.
    pub(crate) fn new(source: S, options: RangeOptions, batch_size: usize) -> Self {
        let lower = options.key_from.map_or(Bound::Unbounded, Bound::Included);
        let upper = options.key_to.map_or(Bound::Unbounded, Bound::Included);
        Self {
            source,
            lower,
            upper,
            reverse: options.reverse,
            include_value: options.include_value,
            batch_size: batch_size.max(1),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn refill(&mut self) -> StorageResult<()> {
        if is_empty_range(as_ref_bound(&self.lower), as_ref_bound(&self.upper)) {
            self.done = true;
            return Ok(());
        }

        let batch = self.source.fetch(
            as_ref_bound(&self.lower),
            as_ref_bound(&self.upper),
            self.reverse,
            self.include_value,
            self.batch_size,
        )?;

        if batch.len() < self.batch_size {
            self.done = true;
        }
        if let Some(last) = batch.last() {
            if self.reverse {
                self.upper = Bound::Excluded(last.key.clone());
            } else {
                self.lower = Bound::Excluded(last.key.clone());
            }
        }
        self.buffer.extend(batch);
        Ok(())
    }
}

impl<S: RangeSource> Iterator for BatchedRangeIter<S> {
    type Item = StorageResult<KvEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.refill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    struct CountingSource {
        map: BTreeMap<Vec<u8>, Vec<u8>>,
        fetches: Cell<usize>,
    }

    impl RangeSource for CountingSource {
        fn fetch(
            &self,
            lower: Bound<&[u8]>,
            upper: Bound<&[u8]>,
            reverse: bool,
            include_value: bool,
            limit: usize,
        ) -> StorageResult<Vec<KvEntry>> {
            self.fetches.set(self.fetches.get() + 1);
            let range = self.map.range::<[u8], _>((lower, upper));
            let to_entry = |(k, v): (&Vec<u8>, &Vec<u8>)| {
                KvEntry::new(k.clone(), include_value.then(|| v.clone()))
            };
            Ok(if reverse {
                range.rev().take(limit).map(to_entry).collect()
            } else {
                range.take(limit).map(to_entry).collect()
            })
        }
    }

    fn source(n: u8) -> CountingSource {
        let map = (0..n).map(|i| (vec![b'k', i], vec![i])).collect();
        CountingSource {
            map,
            fetches: Cell::new(0),
        }
    }

    #[test]
    fn batched_iteration_visits_every_key_once() {
        let src = source(10);
        let keys: Vec<Vec<u8>> = BatchedRangeIter::new(&src, RangeOptions::new(), 3)
            .map(|e| e.unwrap().key)
            .collect();
        assert_eq!(keys.len(), 10);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(src.fetches.get(), 4);
    }

    #[test]
    fn batched_reverse_iteration() {
        let src = source(7);
        let keys: Vec<Vec<u8>> =
            BatchedRangeIter::new(&src, RangeOptions::new().reverse(true), 2)
                .map(|e| e.unwrap().key)
                .collect();
        assert_eq!(keys.len(), 7);
        assert!(keys.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn early_stop_fetches_one_batch() {
        let src = source(100);
        let first: Vec<_> = BatchedRangeIter::new(&src, RangeOptions::new(), 8)
            .take(2)
            .collect();
        assert_eq!(first.len(), 2);
        assert_eq!(src.fetches.get(), 1);
    }

    #[test]
    fn empty_range_detection() {
        assert!(is_empty_range(Bound::Included(b"b"), Bound::Included(b"a")));
        assert!(is_empty_range(Bound::Excluded(b"a"), Bound::Included(b"a")));
        assert!(!is_empty_range(Bound::Included(b"a"), Bound::Included(b"a")));
        assert!(!is_empty_range(Bound::Unbounded, Bound::Excluded(b"a")));
    }

    proptest! {
        #[test]
        fn batched_matches_plain_range(
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 0..4), 0..40),
            batch_size in 1usize..10,
            reverse in any::<bool>(),
        ) {
            let src = CountingSource {
                map: keys.iter().map(|k| (k.clone(), Vec::new())).collect(),
                fetches: Cell::new(0),
            };
            let got: Vec<Vec<u8>> =
                BatchedRangeIter::new(&src, RangeOptions::new().reverse(reverse), batch_size)
                    .map(|e| e.unwrap().key)
                    .collect();
            let mut expected: Vec<Vec<u8>> = keys.into_iter().collect();
            if reverse {
                expected.reverse();
            }
            prop_assert_eq!(got, expected);
        }
    }
}

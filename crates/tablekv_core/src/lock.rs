//! Record locks and lock pools.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

/// Named mutual exclusion for logical records.
///
/// A lock key is any string, usually a record key. At most one
/// [`RecordLockGuard`] exists per lock key at a time; other callers block on
/// a condition variable until it is dropped.
///
/// # Example
///
/// ```rust
/// use tablekv_core::RecordLocks;
/// use std::time::Duration;
///
/// let locks = RecordLocks::new();
/// let guard = locks.acquire("note:1", None).unwrap();
/// assert!(locks.acquire("note:1", Some(Duration::from_millis(5))).is_none());
/// drop(guard);
/// assert!(!locks.is_locked("note:1"));
/// ```
#[derive(Debug, Default)]
pub struct RecordLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl RecordLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `lock_key` is free, then takes it.
    ///
    /// `None` or a zero timeout waits forever. Otherwise `None` is returned
    /// once the timeout elapses without the key becoming free.
    pub fn acquire(&self, lock_key: &str, timeout: Option<Duration>) -> Option<RecordLockGuard<'_>> {
        let deadline = timeout
            .filter(|d| !d.is_zero())
            .map(|d| Instant::now() + d);

        let mut held = self.held.lock();
        while held.contains(lock_key) {
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut held, deadline).timed_out()
                        && held.contains(lock_key)
                    {
                        tracing::debug!(lock_key, "record lock timed out");
                        return None;
                    }
                }
                None => self.released.wait(&mut held),
            }
        }
        held.insert(lock_key.to_string());
        Some(RecordLockGuard::new(self, lock_key))
    }

    /// Takes `lock_key` if it is free, without waiting.
    pub fn try_acquire(&self, lock_key: &str) -> Option<RecordLockGuard<'_>> {
        let mut held = self.held.lock();
        if held.insert(lock_key.to_string()) {
            Some(RecordLockGuard::new(self, lock_key))
        } else {
            None
        }
    }

    /// Returns true if some guard currently holds `lock_key`.
    #[must_use]
    pub fn is_locked(&self, lock_key: &str) -> bool {
        self.held.lock().contains(lock_key)
    }

    /// Returns the number of held lock keys.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn release(&self, lock_key: &str) {
        let removed = self.held.lock().remove(lock_key);
        if removed {
            self.released.notify_all();
        }
    }
}

/// Ownership of one lock key. Released on drop.
#[derive(Debug)]
#[must_use = "the record lock is released as soon as the guard is dropped"]
pub struct RecordLockGuard<'a> {
    locks: &'a RecordLocks,
    key: String,
}

impl<'a> RecordLockGuard<'a> {
    fn new(locks: &'a RecordLocks, key: &str) -> Self {
        Self {
            locks,
            key: key.to_string(),
        }
    }

    /// Returns the held lock key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the lock now.
    pub fn release(self) {}
}

impl Drop for RecordLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}

/// Fixed set of mutexes selected by key hash.
///
/// Unrelated keys usually land in different slots and don't contend; keys
/// in the same slot share its state.
#[derive(Debug)]
pub struct LockPool<T> {
    slots: Vec<Mutex<T>>,
}

/// Default number of slots in a [`LockPool`].
pub const DEFAULT_LOCK_SLOTS: usize = 10;

impl<T: Default> LockPool<T> {
    /// Creates a pool of `size` default-initialized slots (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size.max(1)).map(|_| Mutex::new(T::default())).collect(),
        }
    }
}

impl<T: Default> Default for LockPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_SLOTS)
    }
}

impl<T> LockPool<T> {
    /// Returns the slot index for `key`.
    #[must_use]
    pub fn slot_of(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.slots.len() as u64) as usize
    }

    /// Locks the slot for `key`.
    pub fn lock(&self, key: &str) -> MutexGuard<'_, T> {
        self.slots[self.slot_of(key)].lock()
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a pool has at least one slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_and_release() {
        let locks = RecordLocks::new();
        let guard = locks.acquire("a", None).unwrap();
        assert!(locks.is_locked("a"));
        assert_eq!(guard.key(), "a");

        guard.release();
        assert!(!locks.is_locked("a"));
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn different_keys_do_not_block() {
        let locks = RecordLocks::new();
        let _a = locks.acquire("a", None).unwrap();
        let b = locks.try_acquire("b");
        assert!(b.is_some());
    }

    #[test]
    fn timeout_returns_none() {
        let locks = RecordLocks::new();
        let _held = locks.acquire("a", None).unwrap();

        let start = Instant::now();
        assert!(locks.acquire("a", Some(Duration::from_millis(20))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(locks.try_acquire("a").is_none());
    }

    #[test]
    fn waiter_wakes_on_release() {
        let locks = Arc::new(RecordLocks::new());
        let guard = locks.acquire("k", None).unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire("k", Some(Duration::from_secs(5))).is_some())
        };
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn mutual_exclusion_under_contention() {
        let locks = Arc::new(RecordLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _guard = locks.acquire("shared", None).unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!locks.is_locked("shared"));
    }

    #[test]
    fn lock_pool_slot_is_stable() {
        let pool: LockPool<u64> = LockPool::new(10);
        assert_eq!(pool.len(), 10);
        assert_eq!(pool.slot_of("note"), pool.slot_of("note"));
        assert!(pool.slot_of("note") < 10);

        *pool.lock("note") = 7;
        assert_eq!(*pool.lock("note"), 7);
    }

    #[test]
    fn lock_pool_has_at_least_one_slot() {
        let pool: LockPool<()> = LockPool::new(0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.slot_of("anything"), 0);
    }
}

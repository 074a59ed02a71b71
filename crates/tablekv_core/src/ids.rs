//! Record ID generation.

use crate::error::CoreError;
use crate::lock::LockPool;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Width of a time-sequence ID.
pub const TIMESEQ_WIDTH: usize = 20;

/// How a table allocates the last key segment of a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdType {
    /// 32 hex characters of a random UUID.
    #[default]
    Uuid,
    /// 20-digit zero-padded Unix milliseconds, increasing per table.
    TimeSeq,
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uuid => "uuid",
            Self::TimeSeq => "timeseq",
        })
    }
}

impl FromStr for IdType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uuid" => Ok(Self::Uuid),
            "timeseq" => Ok(Self::TimeSeq),
            other => Err(CoreError::validation(format!("unknown id type '{other}'"))),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Generates record IDs.
///
/// Time-sequence state is kept per lock slot, with the slot chosen by key
/// prefix, so tables in different slots never wait on each other.
#[derive(Debug)]
pub struct IdGenerator {
    last: LockPool<u64>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(crate::lock::DEFAULT_LOCK_SLOTS)
    }
}

impl IdGenerator {
    /// Creates a generator with `slots` lock slots.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            last: LockPool::new(slots),
        }
    }

    /// Returns a new ID of the given type for a key under `prefix`.
    #[must_use]
    pub fn generate(&self, id_type: IdType, prefix: &str) -> String {
        match id_type {
            IdType::Uuid => Self::uuid(),
            IdType::TimeSeq => self.timeseq(prefix),
        }
    }

    /// Returns a time-sequence ID strictly greater than the previous one
    /// issued for `prefix`.
    ///
    /// If the clock hasn't moved since the last ID, waits one millisecond and
    /// reads it again; if it still hasn't moved, uses the last value plus one.
    #[must_use]
    pub fn timeseq(&self, prefix: &str) -> String {
        let mut last = self.last.lock(prefix);
        let mut now = now_millis();
        if now == *last {
            thread::sleep(Duration::from_millis(1));
            now = now_millis();
        }
        if now <= *last {
            now = *last + 1;
        }
        *last = now;
        Self::timeseq_at(now)
    }

    /// Formats `millis` as a time-sequence ID.
    ///
    /// ```
    /// use tablekv_core::IdGenerator;
    ///
    /// assert_eq!(IdGenerator::timeseq_at(1_650_000_000_000), "00000001650000000000");
    /// ```
    #[must_use]
    pub fn timeseq_at(millis: u64) -> String {
        format!("{millis:0width$}", width = TIMESEQ_WIDTH)
    }

    /// Returns a random 32-character hex token.
    #[must_use]
    pub fn uuid() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn id_type_parse_and_display() {
        assert_eq!("timeseq".parse::<IdType>().unwrap(), IdType::TimeSeq);
        assert_eq!(IdType::Uuid.to_string(), "uuid");
        assert!("serial".parse::<IdType>().is_err());
    }

    #[test]
    fn timeseq_is_fixed_width_and_increasing() {
        let ids = IdGenerator::new(4);
        let a = ids.timeseq("note");
        let b = ids.timeseq("note");
        assert_eq!(a.len(), TIMESEQ_WIDTH);
        assert!(a.bytes().all(|c| c.is_ascii_digit()));
        assert!(b > a);
    }

    #[test]
    fn uuid_is_32_hex() {
        let id = IdGenerator::uuid();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, IdGenerator::uuid());
    }

    #[test]
    fn concurrent_timeseq_never_repeats() {
        let ids = Arc::new(IdGenerator::new(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..20).map(|_| ids.timeseq("note")).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate time-sequence id");
            }
        }
        assert_eq!(seen.len(), 160);
    }
}

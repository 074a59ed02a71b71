//! Store configuration.

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Reject every write with [`crate::CoreError::ReadOnly`].
    pub read_only: bool,

    /// Ask the driver to make each write durable before returning.
    pub sync_writes: bool,

    /// Record every write in the binlog.
    pub binlog_enabled: bool,

    /// Number of binlog entries kept by trimming.
    pub binlog_max_size: usize,

    /// Store the new value in binlog entries, not only the old one.
    pub binlog_record_value: bool,

    /// Trim the binlog after this many logged writes (0 = never).
    pub binlog_trim_interval: u64,

    /// Number of lock slots used by the time-sequence ID generator.
    pub id_lock_slots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_only: false,
            sync_writes: false,
            binlog_enabled: false,
            binlog_max_size: 10_000,
            binlog_record_value: false,
            binlog_trim_interval: 100,
            id_lock_slots: 10,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the write guard.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether writes are synced.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Enables or disables the binlog.
    #[must_use]
    pub const fn binlog_enabled(mut self, value: bool) -> Self {
        self.binlog_enabled = value;
        self
    }

    /// Sets the binlog retention size.
    #[must_use]
    pub const fn binlog_max_size(mut self, size: usize) -> Self {
        self.binlog_max_size = size;
        self
    }

    /// Sets whether binlog entries carry the new value.
    #[must_use]
    pub const fn binlog_record_value(mut self, value: bool) -> Self {
        self.binlog_record_value = value;
        self
    }

    /// Sets the automatic trimming interval.
    #[must_use]
    pub const fn binlog_trim_interval(mut self, writes: u64) -> Self {
        self.binlog_trim_interval = writes;
        self
    }

    /// Sets the number of ID generator lock slots.
    #[must_use]
    pub const fn id_lock_slots(mut self, slots: usize) -> Self {
        self.id_lock_slots = slots;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.read_only);
        assert!(!config.binlog_enabled);
        assert_eq!(config.binlog_max_size, 10_000);
        assert_eq!(config.binlog_trim_interval, 100);
        assert_eq!(config.id_lock_slots, 10);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .binlog_enabled(true)
            .binlog_max_size(5)
            .binlog_record_value(true)
            .read_only(true);

        assert!(config.binlog_enabled);
        assert!(config.binlog_record_value);
        assert!(config.read_only);
        assert_eq!(config.binlog_max_size, 5);
    }
}

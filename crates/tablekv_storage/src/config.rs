//! Driver selection.

use crate::driver::Driver;
use crate::error::{StorageError, StorageResult};
use crate::log::{LogConfig, LogDriver};
use crate::memory::MemoryDriver;
use crate::redb_driver::{RedbConfig, RedbDriver};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Which engine a [`DriverConfig`] opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// [`MemoryDriver`].
    #[default]
    Memory,
    /// [`LogDriver`].
    Log,
    /// [`RedbDriver`].
    Redb,
}

impl DriverKind {
    /// Returns the lowercase name used in configuration and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Log => "log",
            Self::Redb => "redb",
        }
    }

    /// Returns true if the driver needs a path.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        !matches!(self, Self::Memory)
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "log" => Ok(Self::Log),
            "redb" => Ok(Self::Redb),
            _ => Err(StorageError::backend("config", format!("unknown driver '{s}'"))),
        }
    }
}

/// Settings for [`open_driver`].
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Engine to open.
    pub kind: DriverKind,
    /// Data file path. Required for persistent drivers.
    pub path: Option<PathBuf>,
    /// Settings for [`DriverKind::Log`].
    pub log: LogConfig,
    /// Settings for [`DriverKind::Redb`].
    pub redb: RedbConfig,
}

impl DriverConfig {
    /// Config for an in-memory driver.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Config for a log driver at `path`.
    #[must_use]
    pub fn log(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: DriverKind::Log,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Config for a redb driver at `path`.
    #[must_use]
    pub fn redb(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: DriverKind::Redb,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Replaces the log driver settings.
    #[must_use]
    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log = config;
        self
    }

    /// Replaces the redb driver settings.
    #[must_use]
    pub fn with_redb_config(mut self, config: RedbConfig) -> Self {
        self.redb = config;
        self
    }
}

/// Opens the driver described by `config`.
///
/// # Errors
///
/// Returns an error if a persistent driver has no path or fails to open.
pub fn open_driver(config: &DriverConfig) -> StorageResult<Arc<dyn Driver>> {
    let path = || {
        config.path.as_deref().ok_or_else(|| {
            StorageError::backend(
                config.kind.as_str(),
                format!("{} driver requires a path", config.kind),
            )
        })
    };

    let driver: Arc<dyn Driver> = match config.kind {
        DriverKind::Memory => Arc::new(MemoryDriver::new()),
        DriverKind::Log => Arc::new(LogDriver::open_with_config(path()?, config.log.clone())?),
        DriverKind::Redb => Arc::new(RedbDriver::open_with_config(path()?, config.redb)?),
    };
    tracing::debug!(driver = driver.name(), "driver opened");
    Ok(driver)
}

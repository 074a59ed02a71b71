//! CLI command implementations.

pub mod binlog;
pub mod compact;
pub mod count;
pub mod get;
pub mod scan;
pub mod stats;

use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tablekv_core::{Config, Store};
use tablekv_storage::{DriverConfig, DriverKind};

/// The store a command works on.
#[derive(Debug, Clone)]
pub struct Target {
    /// Driver to open.
    pub kind: DriverKind,
    /// Data file path.
    pub path: Option<PathBuf>,
}

impl Target {
    /// Parses the driver name and checks that persistent drivers have a path.
    pub fn new(driver: &str, path: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let kind: DriverKind = driver.parse()?;
        if kind.is_persistent() && path.is_none() {
            return Err(format!("--path is required for the {kind} driver").into());
        }
        Ok(Self { kind, path })
    }

    /// Returns the path of a persistent driver.
    pub fn path(&self) -> Result<&Path, Box<dyn Error>> {
        self.path
            .as_deref()
            .ok_or_else(|| format!("--path is required for the {} driver", self.kind).into())
    }

    fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            kind: self.kind,
            path: self.path.clone(),
            ..DriverConfig::default()
        }
    }

    /// Opens a read-only store over the target.
    pub fn open_store(&self) -> Result<Store, Box<dyn Error>> {
        let store = Store::builder()
            .driver_config(self.driver_config())
            .config(Config::new().read_only(true))
            .build()?;
        Ok(store)
    }
}

/// Prints `value` as pretty JSON when `format` is `json`, otherwise calls
/// `text`.
pub fn emit<T: Serialize>(
    format: &str,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<(), Box<dyn Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        _ => text(value),
    }
    Ok(())
}

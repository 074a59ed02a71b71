//! Compact command implementation.

use super::{emit, Target};
use serde::Serialize;
use std::path::Path;
use tablekv_storage::{DriverKind, LogDriver, RedbDriver};

/// Compaction outcome.
#[derive(Debug, Serialize)]
pub struct CompactResult {
    /// Driver that was compacted.
    pub driver: &'static str,
    /// File size before compaction, in bytes.
    pub bytes_before: u64,
    /// File size after compaction, in bytes.
    pub bytes_after: u64,
    /// Whether the driver reported any work done.
    pub compacted: bool,
}

impl CompactResult {
    /// Bytes reclaimed.
    #[must_use]
    pub fn saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Runs the compact command.
pub fn run(target: &Target, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = compact(target)?;
    emit(format, &result, print_text_output)
}

/// Compacts the target's data file.
pub fn compact(target: &Target) -> Result<CompactResult, Box<dyn std::error::Error>> {
    match target.kind {
        DriverKind::Memory => Err("the memory driver has nothing to compact".into()),
        DriverKind::Log => {
            let driver = LogDriver::open(target.path()?)?;
            let before = driver.stats().file_size;
            let after = driver.compact()?.file_size;
            Ok(CompactResult {
                driver: "log",
                bytes_before: before,
                bytes_after: after,
                compacted: after != before,
            })
        }
        DriverKind::Redb => {
            let path = target.path()?;
            let before = file_size(path)?;
            let compacted = RedbDriver::open(path)?.compact()?;
            Ok(CompactResult {
                driver: "redb",
                bytes_before: before,
                bytes_after: file_size(path)?,
                compacted,
            })
        }
    }
}

fn file_size(path: &Path) -> std::io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

fn print_text_output(result: &CompactResult) {
    println!("Compacted {} store", result.driver);
    println!("  Size before: {} bytes", result.bytes_before);
    println!("  Size after:  {} bytes", result.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        result.saved(),
        if result.bytes_before > 0 {
            (result.saved() as f64 / result.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekv_storage::Driver;
    use tempfile::tempdir;

    #[test]
    fn compact_log_reclaims_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");
        {
            let driver = LogDriver::open(&path).unwrap();
            for i in 0..20u8 {
                driver.put(b"k", &[i; 64], false).unwrap();
            }
        }

        let target = Target::new("log", Some(path.clone())).unwrap();
        let result = compact(&target).unwrap();
        assert!(result.compacted);
        assert!(result.bytes_after < result.bytes_before);

        let driver = LogDriver::open(&path).unwrap();
        assert_eq!(driver.get(b"k").unwrap(), Some(vec![19u8; 64]));
    }

    #[test]
    fn compact_memory_is_an_error() {
        let target = Target::new("memory", None).unwrap();
        assert!(compact(&target).is_err());
    }
}

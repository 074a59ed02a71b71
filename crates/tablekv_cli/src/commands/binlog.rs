//! Binlog command implementation.

use super::{emit, Target};
use serde::Serialize;
use tablekv_core::BinlogEntry;

/// An entry with its sequence, which the entry body doesn't carry.
#[derive(Debug, Serialize)]
pub struct BinlogRow {
    /// Entry sequence.
    pub seq: u64,
    /// Entry body.
    #[serde(flatten)]
    pub entry: BinlogEntry,
}

/// Runs the binlog command.
pub fn run(
    target: &Target,
    since: u64,
    limit: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = target.open_store()?;
    let rows: Vec<BinlogRow> = store
        .binlog()
        .list(since, limit)?
        .into_iter()
        .map(|entry| BinlogRow {
            seq: entry.seq,
            entry,
        })
        .collect();
    emit(format, &rows, |rows| print_text_output(rows))
}

fn print_text_output(rows: &[BinlogRow]) {
    if rows.is_empty() {
        println!("No binlog entries.");
        return;
    }
    println!("{:<10} {:<7} KEY", "SEQ", "OP");
    for row in rows {
        println!(
            "{:<10} {:<7} {}",
            row.seq,
            row.entry.optype.to_string(),
            row.entry.key
        );
    }
}

//! tablekv CLI
//!
//! Command-line tools for inspecting tablekv stores.
//!
//! # Commands
//!
//! - `get` - Print the value stored at a key
//! - `scan` - List keys and values, optionally under a prefix
//! - `count` - Count keys under a prefix
//! - `binlog` - Dump binlog entries after a sequence
//! - `compact` - Rewrite the data file to reclaim space
//! - `stats` - Display key, table and binlog statistics

mod commands;

use clap::{Parser, Subcommand};
use commands::Target;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tablekv command-line tools.
#[derive(Parser)]
#[command(name = "tablekv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage driver (memory, log, redb)
    #[arg(global = true, short, long, default_value = "log")]
    driver: String,

    /// Path to the data file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored at a key
    Get {
        /// Key to read
        key: String,
    },

    /// List keys and values in key order
    Scan {
        /// Only keys under this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip this many entries
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Scan in descending key order
        #[arg(short, long)]
        reverse: bool,
    },

    /// Count keys under a prefix
    Count {
        /// Table name or key prefix
        prefix: String,
    },

    /// Dump binlog entries
    Binlog {
        /// Only entries after this sequence
        #[arg(short, long, default_value = "0")]
        since: u64,

        /// Maximum number of entries
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Rewrite the data file to reclaim space
    Compact,

    /// Display key, table and binlog statistics
    Stats,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("tablekv CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let target = Target::new(&cli.driver, cli.path)?;
    let format = cli.format.as_str();

    match cli.command {
        Commands::Get { key } => commands::get::run(&target, &key, format)?,
        Commands::Scan {
            prefix,
            limit,
            offset,
            reverse,
        } => commands::scan::run(&target, prefix.as_deref(), offset, limit, reverse, format)?,
        Commands::Count { prefix } => commands::count::run(&target, &prefix, format)?,
        Commands::Binlog { since, limit } => commands::binlog::run(&target, since, limit, format)?,
        Commands::Compact => commands::compact::run(&target, format)?,
        Commands::Stats => commands::stats::run(&target, format)?,
        Commands::Version => {}
    }

    Ok(())
}

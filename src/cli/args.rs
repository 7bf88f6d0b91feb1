//! CLI argument definitions using clap
//!
//! Commands:
//! - flatdex stats --index <path>
//! - flatdex equivalence --dir <path> [--max N] [--min N] [--cycles N] [--seed S]

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// flatdex - ordered secondary indexes over append-only flat files
#[derive(Parser, Debug)]
#[command(name = "flatdex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log lifecycle events to stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the header statistics of an index file
    Stats {
        /// Path to the index file
        #[arg(long)]
        index: PathBuf,
    },

    /// Drive an on-disk map and std's BTreeMap with the same random
    /// operations and fail on the first difference
    Equivalence {
        /// Directory for the index and flat files
        #[arg(long, default_value = "./equivalence")]
        dir: PathBuf,

        /// Grow the map to this many elements each cycle
        #[arg(long, default_value_t = 10_000)]
        max: u32,

        /// Shrink the map to this many elements each cycle
        #[arg(long, default_value_t = 10)]
        min: u32,

        /// Smallest generated key
        #[arg(long, default_value_t = 0)]
        low: i32,

        /// Largest generated key (0: twice max)
        #[arg(long, default_value_t = 0)]
        high: i32,

        /// Number of grow/shrink cycles
        #[arg(long, default_value_t = 3)]
        cycles: u32,

        /// Seed for the insert and erase key generators
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Node size of the index file
        #[arg(long, default_value_t = 128)]
        node_size: u32,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

//! CLI module for flatdex
//!
//! Provides command-line interface for:
//! - stats: Print the header statistics of an index file
//! - equivalence: Randomized comparison of an on-disk map against BTreeMap

mod args;
mod commands;
mod equivalence;
mod errors;

pub use args::{Cli, Command};
pub use commands::{equivalence, run, run_command, stats, stats_report};
pub use equivalence::{run_equivalence, Counts, EquivalenceOptions};
pub use errors::{CliError, CliErrorCode, CliResult};

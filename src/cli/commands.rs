//! CLI command implementations

use std::path::Path;

use tracing::{debug, Level};

use super::args::{Cli, Command};
use super::equivalence::{run_equivalence, Counts, EquivalenceOptions};
use super::errors::CliResult;
use crate::tree::PositionTree;

/// Main CLI entry point
///
/// Parses arguments, installs the log subscriber and dispatches.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    run_command(cli.command)
}

/// Installs a stderr subscriber; 0 = warn, 1 = info, 2+ = debug.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    // Already installed when embedded in a host that set its own subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Stats { index } => stats(&index),
        Command::Equivalence {
            dir,
            max,
            min,
            low,
            high,
            cycles,
            seed,
            node_size,
        } => equivalence(EquivalenceOptions {
            dir,
            max,
            min,
            low,
            high,
            cycles,
            seed,
            node_size,
        }),
    }
}

/// Print the header statistics of an index file
pub fn stats(index: &Path) -> CliResult<()> {
    print!("{}", stats_report(index)?);
    Ok(())
}

/// Header statistics of `index`, read without opening its flat file.
pub fn stats_report(index: &Path) -> CliResult<String> {
    let header = PositionTree::read_header(index)?;
    debug!(path = %index.display(), kind = %header.kind, "INDEX_HEADER_READ");
    Ok(format!("{}:\n{}", index.display(), header))
}

/// Run the randomized comparison against `BTreeMap`
pub fn equivalence(options: EquivalenceOptions) -> CliResult<()> {
    println!("{}", describe(&options));
    let counts: Counts = run_equivalence(&options)?;
    print!("{}", counts);
    println!("all test cycles complete");
    Ok(())
}

fn describe(options: &EquivalenceOptions) -> String {
    format!(
        "equivalence: dir={} max={} min={} low={} high={} cycles={} seed={} node_size={}",
        options.dir.display(),
        options.max,
        options.min,
        options.low,
        if options.high == 0 {
            "auto".to_string()
        } else {
            options.high.to_string()
        },
        options.cycles,
        options.seed,
        options.node_size
    )
}

//! Command-line arguments and subcommands for the driverprobe CLI.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "driverprobe",
    version,
    about = "Black-box conformance harness for compiler drivers."
)]
pub struct DriverprobeArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Console,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every case of the given scenario files or directories.
    Run {
        /// The compiler driver under test.
        #[arg(long, value_name = "PATH")]
        compiler: PathBuf,
        /// Resolve fixtures here instead of next to each scenario file.
        #[arg(long, value_name = "DIR")]
        fixtures: Option<PathBuf>,
        /// Directory under which per-case workspaces are created.
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
        /// Default per-invocation timeout in seconds.
        #[arg(long, value_name = "SECS", default_value_t = 60)]
        timeout: u64,
        /// Only run cases whose name contains this substring (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
        /// Number of cases run concurrently.
        #[arg(long, short = 'j', default_value_t = 1)]
        jobs: usize,
        #[arg(long, value_enum, default_value_t = Format::Console)]
        format: Format,
        /// Disable colored output.
        #[arg(long)]
        no_color: bool,
        /// Print a progress line per case to stderr.
        #[arg(long, short)]
        verbose: bool,
        /// Scenario files or directories to search for them.
        #[arg(required = true, value_name = "SCENARIO|DIR")]
        paths: Vec<PathBuf>,
    },
    /// List suites, cases and the argv each case would run.
    List {
        #[arg(required = true, value_name = "SCENARIO|DIR")]
        paths: Vec<PathBuf>,
    },
    /// Classify files the way the artifact assertions do.
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Console)]
        format: Format,
    },
}

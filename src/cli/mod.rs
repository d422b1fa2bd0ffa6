//! The driverprobe command-line interface.
//!
//! Exit status: 0 when every executed case passed, 1 when any case failed,
//! 2 when the harness itself could not run (missing compiler or fixture,
//! unreadable scenario).

use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use crate::cli::args::{Command, DriverprobeArgs, Format};
use crate::errors::{HarnessError, HarnessResult};
use crate::inspect;
use crate::platform::Platform;
use crate::report::{ConsoleReporter, JsonReporter, Reporter, SuiteReport};
use crate::runner::{CompilerRunner, RunnerConfig};
use crate::scenario::{self, Scenario};
use crate::suite::{Suite, SuiteOptions};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = DriverprobeArgs::parse();
    let code = match execute(args.command) {
        Ok(code) => code,
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };
    process::exit(code);
}

/// Dispatch one subcommand and return the process exit status.
pub fn execute(command: Command) -> HarnessResult<i32> {
    match command {
        Command::Run {
            compiler,
            fixtures,
            work_dir,
            timeout,
            filter,
            jobs,
            format,
            no_color,
            verbose,
            paths,
        } => {
            let config = RunnerConfig::new(compiler).with_timeout(Duration::from_secs(timeout));
            let options = SuiteOptions {
                work_root: work_dir.unwrap_or_else(|| SuiteOptions::default().work_root),
                filter,
                jobs,
                verbose,
            };
            handle_run(config, fixtures.as_deref(), &options, &paths, format, no_color)
        }
        Command::List { paths } => handle_list(&paths),
        Command::Inspect { files, format } => handle_inspect(&files, format),
    }
}

fn handle_run(
    config: RunnerConfig,
    fixtures: Option<&Path>,
    options: &SuiteOptions,
    paths: &[PathBuf],
    format: Format,
    no_color: bool,
) -> HarnessResult<i32> {
    let suites: Vec<Suite> = scenario::load_all(paths)?
        .into_iter()
        .map(|s| s.into_suite(fixtures))
        .collect();
    let runner = CompilerRunner::new(config);

    // Every prerequisite is checked before the first case runs.
    for suite in &suites {
        suite.preflight(&runner)?;
    }

    let reports: Vec<SuiteReport> = suites
        .iter()
        .map(|suite| suite.run(&runner, options))
        .collect();

    let status = match format {
        Format::Console => {
            ConsoleReporter::stdout(output::use_colors(no_color)).render(&reports)
        }
        Format::Json => JsonReporter::new(io::stdout().lock()).render(&reports),
    };
    status.map_err(HarnessError::ReportWrite)
}

fn handle_list(paths: &[PathBuf]) -> HarnessResult<i32> {
    let scenarios: Vec<Scenario> = scenario::load_all(paths)?;
    let mut out = output::stdout(output::use_colors(false));
    output::write_listing(&mut out, &scenarios, &Platform::current())
        .and_then(|()| out.flush())
        .map_err(HarnessError::ReportWrite)?;
    Ok(0)
}

fn handle_inspect(files: &[PathBuf], format: Format) -> HarnessResult<i32> {
    let host = Platform::current();
    let mut inspections = Vec::with_capacity(files.len());
    for path in files {
        let summary = inspect::summarize(path).map_err(|source| HarnessError::Inspect {
            path: path.clone(),
            source,
        })?;
        inspections.push(output::Inspection::new(path, summary, &host));
    }

    let written = match format {
        Format::Console => {
            let mut out = output::stdout(output::use_colors(false));
            inspections
                .iter()
                .try_for_each(|i| output::write_inspection(&mut out, i))
                .and_then(|()| out.flush())
        }
        Format::Json => output::write_inspections_json(&mut io::stdout().lock(), &inspections),
    };
    written.map_err(HarnessError::ReportWrite)?;
    Ok(0)
}

//! Harness-level errors.
//!
//! Only conditions that stop the harness itself live here: missing
//! prerequisites, unreadable scenario files, failures to write reports.
//! Anything that happens while a case runs (spawn failures, timeouts, failed
//! assertions) is recorded as an outcome instead.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("compiler executable not found: {}", path.display())]
    #[diagnostic(
        code(driverprobe::missing_executable),
        help("build the compiler first or pass its location with --compiler")
    )]
    MissingExecutable { path: PathBuf },

    #[error("fixture not found: {}", path.display())]
    #[diagnostic(
        code(driverprobe::missing_fixture),
        help("fixtures are resolved against the scenario's fixtures_dir or --fixtures")
    )]
    MissingFixture { path: PathBuf },

    #[error("failed to prepare workspace under {}", root.display())]
    #[diagnostic(code(driverprobe::workspace))]
    Workspace {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read scenario file {}", path.display())]
    #[diagnostic(code(driverprobe::scenario_read))]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario file {}", path.display())]
    #[diagnostic(
        code(driverprobe::scenario_parse),
        help("each case needs a name and an `expect` list of {{ check: ... }} entries")
    )]
    ScenarioParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to walk {}", root.display())]
    #[diagnostic(code(driverprobe::discovery))]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no scenario files found under {}", root.display())]
    #[diagnostic(code(driverprobe::no_scenarios))]
    NoScenarios { root: PathBuf },

    #[error("failed to read artifact {}", path.display())]
    #[diagnostic(code(driverprobe::inspect))]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report")]
    #[diagnostic(code(driverprobe::report_write))]
    ReportWrite(#[source] std::io::Error),
}

impl HarnessError {
    /// Process exit status for a harness error; distinct from "assertions failed".
    pub fn exit_code(&self) -> i32 {
        2
    }
}

//! driverprobe: black-box conformance testing for compiler drivers.
//!
//! A suite of cases, each one compiler invocation in a fresh workspace,
//! checked by assertions over exit status, argv, console output and the
//! artifacts left behind.

pub use crate::assertions::{Assertion, Check, Outcome};
pub use crate::errors::{HarnessError, HarnessResult};
pub use crate::inspect::{classify_file, ArtifactKind, Classification};
pub use crate::plan::{InvocationPlan, NamingRules, OutputMode};
pub use crate::platform::{Arch, Os, Platform};
pub use crate::report::{ConsoleReporter, JsonReporter, Report, Reporter, SuiteReport};
pub use crate::runner::{CompilerRunner, RunResult, RunnerConfig, Termination};
pub use crate::suite::{Suite, SuiteOptions, TestCase};

pub mod assertions;
pub mod cli;
pub mod errors;
pub mod inspect;
pub mod plan;
pub mod platform;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod suite;
pub mod workspace;

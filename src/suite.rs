//! Test cases and suites.
//!
//! A [`TestCase`] binds a plan to an ordered list of assertions. Running it
//! executes the plan exactly once and evaluates every assertion, even after
//! one fails. A [`Suite`] runs each case in its own fresh [`Workspace`],
//! sequentially or across worker threads, and returns reports in suite order.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::assertions::{Assertion, Outcome};
use crate::errors::{HarnessError, HarnessResult};
use crate::plan::InvocationPlan;
use crate::platform::{Os, Platform};
use crate::report::{Report, RunSummary, SuiteReport};
use crate::runner::{CompilerRunner, RunResult, Termination};
use crate::workspace::Workspace;

// =============================================================================
// TEST CASE
// =============================================================================

#[derive(Debug)]
pub struct TestCase {
    pub name: String,
    pub plan: InvocationPlan,
    pub assertions: Vec<Box<dyn Assertion>>,
    /// Operating systems the case applies to; `None` means all.
    pub platforms: Option<Vec<Os>>,
    /// Overrides the runner's timeout for this case.
    pub timeout: Option<Duration>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, plan: InvocationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
            assertions: Vec::new(),
            platforms: None,
            timeout: None,
        }
    }

    pub fn expect(mut self, assertion: impl Assertion + 'static) -> Self {
        self.assertions.push(Box::new(assertion));
        self
    }

    pub fn expect_all<I, A>(mut self, assertions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Assertion + 'static,
    {
        for assertion in assertions {
            self.assertions.push(Box::new(assertion));
        }
        self
    }

    pub fn only_on(mut self, platforms: impl IntoIterator<Item = Os>) -> Self {
        self.platforms = Some(platforms.into_iter().collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn applies_to(&self, platform: &Platform) -> bool {
        self.platforms
            .as_ref()
            .map_or(true, |oses| oses.contains(&platform.os))
    }

    /// Execute the plan once in `workspace` and evaluate every assertion.
    pub fn run(&self, runner: &CompilerRunner, workspace: &Path) -> Report {
        let timeout = self.timeout.or(runner.config().timeout);
        let result = runner.execute_with_timeout(&self.plan, workspace, timeout);
        let outcomes = self.evaluate(&result, workspace);
        Report::new(&self.name, outcomes, Some(RunSummary::from(&result)))
    }

    /// Evaluate all assertions against an existing result, never stopping early.
    pub fn evaluate(&self, result: &RunResult, workspace: &Path) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(self.assertions.len() + 1);
        match result.termination {
            Termination::LaunchFailed => outcomes.push(Outcome::fail(format!(
                "run: could not launch subject: {}",
                result.stderr.trim()
            ))),
            Termination::TimedOut { after_ms } => outcomes.push(Outcome::fail(format!(
                "run: timed out after {after_ms} ms; process terminated"
            ))),
            Termination::Exited { .. } | Termination::Signaled { .. } => {}
        }
        for assertion in &self.assertions {
            outcomes.push(evaluate_guarded(assertion.as_ref(), result, workspace));
        }
        outcomes
    }
}

/// A panicking assertion becomes a failed outcome instead of aborting the case.
fn evaluate_guarded(assertion: &dyn Assertion, result: &RunResult, workspace: &Path) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(|| assertion.evaluate(result, workspace))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Outcome::fail(format!("{}: assertion panicked: {reason}", assertion.describe()))
        }
    }
}

// =============================================================================
// SUITE
// =============================================================================

/// How a suite is run.
#[derive(Debug, Clone)]
pub struct SuiteOptions {
    /// Directory under which per-case workspaces are created.
    pub work_root: PathBuf,
    /// Case-insensitive substring a case name must contain to run.
    pub filter: Option<String>,
    /// Worker threads; 1 runs cases sequentially.
    pub jobs: usize,
    /// Print a progress line per case to stderr.
    pub verbose: bool,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("driverprobe-work"),
            filter: None,
            jobs: 1,
            verbose: false,
        }
    }
}

#[derive(Debug)]
pub struct Suite {
    pub name: String,
    pub cases: Vec<TestCase>,
    /// Files copied into every workspace before its case runs.
    pub fixtures: Vec<PathBuf>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            fixtures: Vec::new(),
        }
    }

    pub fn case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn fixture(mut self, fixture: impl Into<PathBuf>) -> Self {
        self.fixtures.push(fixture.into());
        self
    }

    /// Check that the subject executable and every fixture exist.
    pub fn preflight(&self, runner: &CompilerRunner) -> HarnessResult<()> {
        let executable = runner.executable();
        if !executable_available(executable) {
            return Err(HarnessError::MissingExecutable {
                path: executable.to_path_buf(),
            });
        }
        for fixture in &self.fixtures {
            if !fixture.is_file() {
                return Err(HarnessError::MissingFixture {
                    path: fixture.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run every case in its own workspace and collect reports in suite order.
    pub fn run(&self, runner: &CompilerRunner, options: &SuiteOptions) -> SuiteReport {
        let platform = runner.config().platform;
        let run_one = |case: &TestCase| -> Report {
            if let Some(reason) = self.skip_reason(case, &platform, options.filter.as_deref()) {
                return Report::skipped(&case.name, reason);
            }
            let report = self.run_isolated(case, runner, &options.work_root);
            if options.verbose {
                let took = report.run.as_ref().map_or(0, |r| r.duration_ms);
                let status = if report.passed { "ok" } else { "FAILED" };
                eprintln!("RUN  {}::{} ... {status} ({took} ms)", self.name, case.name);
            }
            report
        };

        let jobs = options.jobs.max(1).min(self.cases.len().max(1));
        let reports = if jobs == 1 {
            self.cases.iter().map(run_one).collect()
        } else {
            run_parallel(&self.cases, jobs, &run_one)
        };
        SuiteReport::new(&self.name, reports)
    }

    fn skip_reason(&self, case: &TestCase, platform: &Platform, filter: Option<&str>) -> Option<String> {
        if !case.applies_to(platform) {
            return Some(format!("not applicable on {}", platform.os));
        }
        if let Some(f) = filter {
            if !case.name.to_lowercase().contains(&f.to_lowercase()) {
                return Some(format!("filtered out by substring: {f}"));
            }
        }
        None
    }

    /// Acquire a workspace, run the case, and always tear the workspace down.
    fn run_isolated(&self, case: &TestCase, runner: &CompilerRunner, work_root: &Path) -> Report {
        let prefix = format!("{}_{}", self.name, case.name);
        let workspace = match Workspace::create(work_root, &prefix) {
            Ok(ws) => ws,
            Err(e) => return setup_failure(case, e),
        };
        if let Err(e) = workspace.copy_fixtures(&self.fixtures) {
            return setup_failure(case, e);
        }

        let mut report = case.run(runner, workspace.path());
        let location = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            report.outcomes.push(Outcome::fail(format!(
                "workspace: failed to remove {}: {e}",
                location.display()
            )));
            report.passed = false;
        }
        report
    }
}

fn setup_failure(case: &TestCase, error: HarnessError) -> Report {
    let detail = match std::error::Error::source(&error) {
        Some(source) => format!("{error}: {source}"),
        None => error.to_string(),
    };
    Report::new(&case.name, vec![Outcome::fail(format!("setup: {detail}"))], None)
}

/// Work-queue execution across `jobs` scoped threads; output keeps case order.
fn run_parallel<F>(cases: &[TestCase], jobs: usize, run_one: &F) -> Vec<Report>
where
    F: Fn(&TestCase) -> Report + Sync,
{
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<Report>>> = Mutex::new(vec![None; cases.len()]);
    thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(case) = cases.get(index) else {
                    break;
                };
                let report = run_one(case);
                if let Ok(mut slots) = slots.lock() {
                    slots[index] = Some(report);
                }
            });
        }
    });
    let slots = slots.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    slots
        .into_iter()
        .zip(cases)
        .map(|(slot, case)| {
            slot.unwrap_or_else(|| {
                Report::new(&case.name, vec![Outcome::fail("run: no report was produced")], None)
            })
        })
        .collect()
}

/// Whether `executable` names an existing file, searching `PATH` for bare names.
pub fn executable_available(executable: &Path) -> bool {
    if executable.components().count() > 1 || executable.is_absolute() {
        return executable.is_file();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return executable.is_file();
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(executable);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

//! Case and suite reports, and the reporters that render them.
//!
//! A [`Report`] is built once per case after every assertion has been
//! evaluated; a [`SuiteReport`] keeps case reports in suite order. Reporters
//! render one or more suite reports and return the process exit status:
//! zero iff every executed case passed.

use serde::Serialize;
use std::io::{self, Write};
use termcolor::{Buffer, Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::assertions::Outcome;
use crate::runner::{RunResult, Termination};

/// Exit status when at least one case failed.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// What the subject did during a case, kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub argv: Vec<String>,
    pub exit_code: i32,
    pub termination: Termination,
    pub duration_ms: u64,
}

impl From<&RunResult> for RunSummary {
    fn from(result: &RunResult) -> Self {
        Self {
            argv: result.argv.clone(),
            exit_code: result.exit_code,
            termination: result.termination,
            duration_ms: result.duration.as_millis() as u64,
        }
    }
}

/// Result of one case: every outcome, in assertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub case: String,
    pub outcomes: Vec<Outcome>,
    /// Conjunction of all outcomes. Vacuously true for skipped cases, which
    /// carry no outcomes; `skipped` tells them apart from executed passes.
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSummary>,
}

impl Report {
    pub fn new(case: impl Into<String>, outcomes: Vec<Outcome>, run: Option<RunSummary>) -> Self {
        let passed = outcomes.iter().all(|o| o.passed);
        Self {
            case: case.into(),
            outcomes,
            passed,
            skipped: None,
            run,
        }
    }

    pub fn skipped(case: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            outcomes: Vec::new(),
            passed: true,
            skipped: Some(reason.into()),
            run: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn is_failed(&self) -> bool {
        !self.is_skipped() && !self.passed
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

/// Reports of one suite, in suite order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub reports: Vec<Report>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>, reports: Vec<Report>) -> Self {
        Self {
            suite: suite.into(),
            reports,
        }
    }

    pub fn passed(&self) -> bool {
        !self.reports.iter().any(Report::is_failed)
    }

    /// Counts of (passed, failed, skipped) cases.
    pub fn counts(&self) -> (usize, usize, usize) {
        let skipped = self.reports.iter().filter(|r| r.is_skipped()).count();
        let failed = self.reports.iter().filter(|r| r.is_failed()).count();
        (self.reports.len() - skipped - failed, failed, skipped)
    }
}

/// Process exit status for a set of suite reports.
pub fn exit_status(suites: &[SuiteReport]) -> i32 {
    if suites.iter().all(SuiteReport::passed) {
        0
    } else {
        FAILURE_EXIT_CODE
    }
}

/// Renders suite reports and derives the exit status.
pub trait Reporter {
    fn render(&mut self, suites: &[SuiteReport]) -> io::Result<i32>;
}

// ============================================================================
// CONSOLE REPORTER
// ============================================================================

/// Human-readable PASS/FAIL/SKIP listing with failing outcome messages.
pub struct ConsoleReporter<W: WriteColor> {
    out: W,
}

impl ConsoleReporter<StandardStream> {
    pub fn stdout(use_colors: bool) -> Self {
        let choice = if use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stdout(choice))
    }
}

impl ConsoleReporter<Buffer> {
    /// Uncolored in-memory rendering, mostly for tests.
    pub fn buffer() -> Self {
        Self::new(Buffer::no_color())
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(self.out.as_slice()).into_owned()
    }
}

impl<W: WriteColor> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn render_suite(&mut self, suite: &SuiteReport) -> io::Result<()> {
        for report in &suite.reports {
            if let Some(reason) = &report.skipped {
                self.label("SKIP", Color::Yellow)?;
                writeln!(self.out, ": {} ({})", report.case, reason)?;
            } else if report.passed {
                self.label("PASS", Color::Green)?;
                writeln!(self.out, ": {}", report.case)?;
            } else {
                self.label("FAIL", Color::Red)?;
                writeln!(self.out, ": {}", report.case)?;
                for outcome in report.failures() {
                    writeln!(self.out, "  - {}", outcome.message)?;
                }
                if let Some(run) = &report.run {
                    writeln!(self.out, "    argv: {}", run.argv.join(" "))?;
                }
            }
        }

        let (passed, failed, skipped) = suite.counts();
        writeln!(
            self.out,
            "\nSuite {}: total {}, passed {}, failed {}, skipped {}",
            suite.suite,
            suite.reports.len(),
            passed,
            failed,
            skipped
        )?;
        if failed > 0 {
            writeln!(self.out, "Failed cases:")?;
            for report in suite.reports.iter().filter(|r| r.is_failed()) {
                writeln!(self.out, "  - {}", report.case)?;
            }
        }
        Ok(())
    }

    fn label(&mut self, text: &str, color: Color) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }
}

impl<W: WriteColor> Reporter for ConsoleReporter<W> {
    fn render(&mut self, suites: &[SuiteReport]) -> io::Result<i32> {
        for (i, suite) in suites.iter().enumerate() {
            if i > 0 {
                writeln!(self.out)?;
            }
            self.render_suite(suite)?;
        }
        self.out.flush()?;
        Ok(exit_status(suites))
    }
}

// ============================================================================
// JSON REPORTER
// ============================================================================

#[derive(Serialize)]
struct JsonDocument<'a> {
    passed: bool,
    suites: &'a [SuiteReport],
}

/// Machine-readable rendering of all suites as one JSON document.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn render(&mut self, suites: &[SuiteReport]) -> io::Result<i32> {
        let status = exit_status(suites);
        let document = JsonDocument {
            passed: status == 0,
            suites,
        };
        serde_json::to_writer_pretty(&mut self.out, &document)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite() -> SuiteReport {
        SuiteReport::new(
            "smoke",
            vec![
                Report::new("ok", vec![Outcome::pass("exit code: expected 0, got 0")], None),
                Report::new(
                    "bad",
                    vec![
                        Outcome::fail("exit code: expected 0, got 1"),
                        Outcome::pass("argv: fine"),
                        Outcome::fail("output 'a.out': expected to exist, not found"),
                    ],
                    None,
                ),
                Report::skipped("mac_only", "not applicable on linux"),
            ],
        )
    }

    #[test]
    fn report_passes_only_if_all_outcomes_pass() {
        let report = Report::new("r", vec![Outcome::pass("a"), Outcome::fail("b")], None);
        assert!(!report.passed);
        assert_eq!(report.failures().count(), 1);
        assert!(Report::new("empty", vec![], None).passed);
    }

    #[test]
    fn console_lists_failures_and_summary() {
        let mut reporter = ConsoleReporter::buffer();
        let status = reporter.render(&[suite()]).unwrap();
        let text = reporter.contents();
        assert_eq!(status, FAILURE_EXIT_CODE);
        assert!(text.contains("PASS: ok"));
        assert!(text.contains("FAIL: bad"));
        assert!(text.contains("  - exit code: expected 0, got 1"));
        assert!(text.contains("  - output 'a.out': expected to exist, not found"));
        assert!(!text.contains("argv: fine"));
        assert!(text.contains("SKIP: mac_only (not applicable on linux)"));
        assert!(text.contains("Suite smoke: total 3, passed 1, failed 1, skipped 1"));
    }

    #[test]
    fn skipped_report_is_the_conjunction_of_no_outcomes() {
        let skipped = Report::skipped("mac_only", "not applicable on linux");
        assert!(skipped.passed);
        assert!(skipped.is_skipped());
        assert!(!skipped.is_failed());
        assert_eq!(suite().counts(), (1, 1, 1));
    }

    #[test]
    fn skipped_cases_do_not_fail_the_run() {
        let suites = [SuiteReport::new(
            "s",
            vec![
                Report::new("ok", vec![Outcome::pass("fine")], None),
                Report::skipped("other", "filtered"),
            ],
        )];
        assert_eq!(exit_status(&suites), 0);
        assert_eq!(exit_status(&[]), 0);
    }

    #[test]
    fn json_document_carries_outcomes() {
        let mut reporter = JsonReporter::new(Vec::new());
        let status = reporter.render(&[suite()]).unwrap();
        assert_eq!(status, FAILURE_EXIT_CODE);
        let value: serde_json::Value = serde_json::from_slice(&reporter.into_inner()).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["suites"][0]["suite"], "smoke");
        assert_eq!(value["suites"][0]["reports"][1]["outcomes"][0]["passed"], false);
        assert_eq!(value["suites"][0]["reports"][2]["skipped"], "not applicable on linux");
        assert_eq!(value["suites"][0]["reports"][2]["passed"], true);
        assert_eq!(value["suites"][0]["reports"][2]["outcomes"], serde_json::json!([]));
    }
}

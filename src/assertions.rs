//! Assertions over a finished run.
//!
//! Every assertion is a pure predicate over a [`RunResult`] and the workspace
//! root, producing an [`Outcome`] whose message embeds the expected and
//! actual values. The built-in families are the variants of [`Check`], which
//! doubles as the `expect` schema of scenario files. Custom assertion kinds
//! implement [`Assertion`] directly; the runner only sees the trait.
//!
//! Checks that take an optional `path` resolve it against the workspace when
//! given, and otherwise use the output location predicted from the plan
//! (see [`crate::plan::InvocationPlan::expected_output`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::inspect::{self, ArtifactKind};
use crate::runner::RunResult;

/// Longest stream excerpt quoted in a failure message.
const EXCERPT_LEN: usize = 240;

/// Result of evaluating one assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub passed: bool,
    pub message: String,
}

impl Outcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    fn check(passed: bool, message: String) -> Self {
        Self { passed, message }
    }
}

/// A predicate over a finished run.
pub trait Assertion: fmt::Debug + Send + Sync {
    /// Short human-readable description, used in listings.
    fn describe(&self) -> String;

    fn evaluate(&self, result: &RunResult, workspace: &Path) -> Outcome;
}

/// The built-in assertion families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    ExitCode {
        code: i32,
    },
    /// The tokens appear contiguously, in order, in the executed argv.
    ArgvContains {
        tokens: Vec<String>,
    },
    StdoutContains {
        text: String,
    },
    StderrContains {
        text: String,
    },
    OutputExists {
        path: Option<PathBuf>,
    },
    OutputAbsent {
        path: Option<PathBuf>,
    },
    /// The plan names its output explicitly, and that name matches.
    OutputName {
        name: PathBuf,
    },
    OutputNonempty {
        path: Option<PathBuf>,
    },
    OutputKind {
        artifact: ArtifactKind,
        path: Option<PathBuf>,
    },
    /// The output is the artifact kind native to the run's platform.
    NativeBinary {
        path: Option<PathBuf>,
    },
    /// The run finished on its own and took at most `millis`.
    SucceededWithin {
        millis: u64,
    },
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

pub fn exit_code(code: i32) -> Check {
    Check::ExitCode { code }
}

pub fn argv_contains<I, S>(tokens: I) -> Check
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Check::ArgvContains {
        tokens: tokens.into_iter().map(Into::into).collect(),
    }
}

pub fn stdout_contains(text: impl Into<String>) -> Check {
    Check::StdoutContains { text: text.into() }
}

pub fn stderr_contains(text: impl Into<String>) -> Check {
    Check::StderrContains { text: text.into() }
}

pub fn output_exists() -> Check {
    Check::OutputExists { path: None }
}

pub fn output_exists_at(path: impl Into<PathBuf>) -> Check {
    Check::OutputExists {
        path: Some(path.into()),
    }
}

pub fn output_absent() -> Check {
    Check::OutputAbsent { path: None }
}

pub fn output_absent_at(path: impl Into<PathBuf>) -> Check {
    Check::OutputAbsent {
        path: Some(path.into()),
    }
}

pub fn output_name(name: impl Into<PathBuf>) -> Check {
    Check::OutputName { name: name.into() }
}

pub fn output_nonempty() -> Check {
    Check::OutputNonempty { path: None }
}

pub fn output_nonempty_at(path: impl Into<PathBuf>) -> Check {
    Check::OutputNonempty {
        path: Some(path.into()),
    }
}

pub fn output_kind(artifact: ArtifactKind) -> Check {
    Check::OutputKind {
        artifact,
        path: None,
    }
}

pub fn output_kind_at(path: impl Into<PathBuf>, artifact: ArtifactKind) -> Check {
    Check::OutputKind {
        artifact,
        path: Some(path.into()),
    }
}

pub fn native_binary() -> Check {
    Check::NativeBinary { path: None }
}

pub fn native_binary_at(path: impl Into<PathBuf>) -> Check {
    Check::NativeBinary {
        path: Some(path.into()),
    }
}

pub fn succeeded_within(millis: u64) -> Check {
    Check::SucceededWithin { millis }
}

// ============================================================================
// EVALUATION
// ============================================================================

impl Assertion for Check {
    fn describe(&self) -> String {
        match self {
            Check::ExitCode { code } => format!("exit code == {code}"),
            Check::ArgvContains { tokens } => format!("argv contains {tokens:?}"),
            Check::StdoutContains { text } => format!("stdout contains {text:?}"),
            Check::StderrContains { text } => format!("stderr contains {text:?}"),
            Check::OutputExists { path } => format!("output {} exists", target(path)),
            Check::OutputAbsent { path } => format!("output {} absent", target(path)),
            Check::OutputName { name } => format!("output named '{}'", name.display()),
            Check::OutputNonempty { path } => format!("output {} nonempty", target(path)),
            Check::OutputKind { artifact, path } => {
                format!("output {} is {artifact}", target(path))
            }
            Check::NativeBinary { path } => format!("output {} is native", target(path)),
            Check::SucceededWithin { millis } => format!("finished within {millis} ms"),
        }
    }

    fn evaluate(&self, result: &RunResult, workspace: &Path) -> Outcome {
        match self {
            Check::ExitCode { code } => check_exit_code(*code, result),
            Check::ArgvContains { tokens } => check_argv(tokens, result),
            Check::StdoutContains { text } => check_stream("stdout", &result.stdout, text),
            Check::StderrContains { text } => check_stream("stderr", &result.stderr, text),
            Check::OutputExists { path } => with_output(path, result, workspace, |rel, abs| {
                Outcome::check(
                    abs.is_file(),
                    format!("output '{}': expected to exist, {}", rel.display(), presence(abs)),
                )
            }),
            Check::OutputAbsent { path } => with_output(path, result, workspace, |rel, abs| {
                Outcome::check(
                    !abs.exists(),
                    format!("output '{}': expected to be absent, {}", rel.display(), presence(abs)),
                )
            }),
            Check::OutputName { name } => check_output_name(name, result),
            Check::OutputNonempty { path } => with_output(path, result, workspace, |rel, abs| {
                let size = abs.metadata().ok().filter(|m| m.is_file()).map(|m| m.len());
                let actual = match size {
                    Some(n) => format!("{n} bytes"),
                    None => "missing".to_string(),
                };
                Outcome::check(
                    size.unwrap_or(0) > 0,
                    format!("output '{}': expected nonempty, got {actual}", rel.display()),
                )
            }),
            Check::OutputKind { artifact, path } => {
                with_output(path, result, workspace, |rel, abs| {
                    let actual = inspect::classify_file(abs).kind;
                    Outcome::check(
                        actual == *artifact,
                        format!(
                            "output '{}': expected kind {artifact}, got {actual}{}",
                            rel.display(),
                            missing_note(abs)
                        ),
                    )
                })
            }
            Check::NativeBinary { path } => with_output(path, result, workspace, |rel, abs| {
                let platform = result.platform;
                let Some(expected) = platform.native_kind() else {
                    return Outcome::fail(format!(
                        "output '{}': no native artifact kind known for {platform}",
                        rel.display()
                    ));
                };
                let actual = inspect::classify_file(abs).kind;
                Outcome::check(
                    actual == expected,
                    format!(
                        "output '{}': expected native {expected} for {platform}, got {actual}{}",
                        rel.display(),
                        missing_note(abs)
                    ),
                )
            }),
            Check::SucceededWithin { millis } => {
                let took = result.duration.as_millis();
                Outcome::check(
                    !result.timed_out() && result.launched() && took <= u128::from(*millis),
                    format!("duration: expected <= {millis} ms, took {took} ms"),
                )
            }
        }
    }
}

fn check_exit_code(expected: i32, result: &RunResult) -> Outcome {
    let actual = result.exit_code;
    let mut message = format!("exit code: expected {expected}, got {actual}");
    if actual != expected && !result.stderr.trim().is_empty() {
        message.push_str(&format!(" (stderr: {})", excerpt(&result.stderr)));
    }
    Outcome::check(actual == expected, message)
}

fn check_argv(tokens: &[String], result: &RunResult) -> Outcome {
    let found = tokens.is_empty()
        || result
            .argv
            .windows(tokens.len())
            .any(|window| window == tokens);
    Outcome::check(
        found,
        format!(
            "argv: expected contiguous {:?}, got {:?}",
            tokens, result.argv
        ),
    )
}

fn check_stream(stream: &str, actual: &str, needle: &str) -> Outcome {
    Outcome::check(
        actual.contains(needle),
        format!("{stream}: expected to contain {needle:?}, got {:?}", excerpt(actual)),
    )
}

fn check_output_name(name: &Path, result: &RunResult) -> Outcome {
    match result.plan.explicit_output() {
        Some(actual) => Outcome::check(
            actual == name,
            format!(
                "output name: expected '{}', got '{}'",
                name.display(),
                actual.display()
            ),
        ),
        None => Outcome::fail(format!(
            "output name: expected '{}', but the plan names no output",
            name.display()
        )),
    }
}

/// Resolve the checked path and hand it to `check`; fail when no path can be derived.
fn with_output<F>(path: &Option<PathBuf>, result: &RunResult, workspace: &Path, check: F) -> Outcome
where
    F: FnOnce(&Path, &Path) -> Outcome,
{
    let relative = match path {
        Some(explicit) => explicit.clone(),
        None => match result.expected_output() {
            Some(implicit) => implicit,
            None => {
                return Outcome::fail(format!(
                    "output: plan '{}' produces no file to check ({:?} mode)",
                    result.plan.name,
                    result.plan.output_mode()
                ))
            }
        },
    };
    let absolute = workspace.join(&relative);
    check(&relative, &absolute)
}

fn target(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!("'{}'", p.display()),
        None => "<implicit>".to_string(),
    }
}

fn presence(path: &Path) -> &'static str {
    if path.is_file() {
        "found file"
    } else if path.exists() {
        "found non-file"
    } else {
        "not found"
    }
}

fn missing_note(path: &Path) -> &'static str {
    if path.exists() {
        ""
    } else {
        " (file missing)"
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_LEN).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::InvocationPlan;
    use crate::platform::{Arch, Os, Platform};
    use crate::runner::Termination;
    use std::fs;
    use std::time::Duration;

    const ELF: [u8; 8] = [0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
    const MACHO: [u8; 8] = [0xcf, 0xfa, 0xed, 0xfe, 7, 0, 0, 1];
    const LINUX: Platform = Platform::new(Os::Linux, Arch::X86_64);

    fn run(plan: InvocationPlan, workspace: &Path) -> RunResult {
        let mut argv = vec!["cc".to_string()];
        argv.extend(plan.to_argv());
        RunResult {
            plan,
            argv,
            exit_code: 0,
            stdout: "target triple = \"x86_64\"\n".to_string(),
            stderr: String::new(),
            workspace: workspace.to_path_buf(),
            duration: Duration::from_millis(10),
            termination: Termination::Exited { code: 0 },
            platform: LINUX,
        }
    }

    #[test]
    fn exit_code_reports_expected_and_actual() {
        let ws = tempfile::tempdir().unwrap();
        let mut result = run(InvocationPlan::new("p"), ws.path());
        assert!(exit_code(0).evaluate(&result, ws.path()).passed);
        result.exit_code = 1;
        result.stderr = "error: unknown type name 'foo'".to_string();
        let outcome = exit_code(0).evaluate(&result, ws.path());
        assert!(!outcome.passed);
        assert!(outcome.message.contains("expected 0, got 1"));
        assert!(outcome.message.contains("unknown type name"));
    }

    #[test]
    fn argv_tokens_must_be_contiguous() {
        let ws = tempfile::tempdir().unwrap();
        let plan = InvocationPlan::new("d").source("debug.c").args(["-D", "DEBUG", "-o=debug_space"]);
        let result = run(plan, ws.path());
        assert!(argv_contains(["-D", "DEBUG"]).evaluate(&result, ws.path()).passed);
        assert!(argv_contains(["-o=debug_space"]).evaluate(&result, ws.path()).passed);
        // Both tokens present, but not adjacent.
        assert!(!argv_contains(["-D", "-o=debug_space"]).evaluate(&result, ws.path()).passed);
        assert!(!argv_contains(["DEBUG", "-D"]).evaluate(&result, ws.path()).passed);
    }

    #[test]
    fn stream_containment() {
        let ws = tempfile::tempdir().unwrap();
        let result = run(InvocationPlan::new("p"), ws.path());
        assert!(stdout_contains("target triple").evaluate(&result, ws.path()).passed);
        assert!(!stderr_contains("target triple").evaluate(&result, ws.path()).passed);
    }

    #[test]
    fn implicit_output_follows_plan() {
        let ws = tempfile::tempdir().unwrap();
        fs::write(ws.path().join("hello.o"), ELF).unwrap();
        let result = run(InvocationPlan::new("obj").source("hello.c").arg("-c"), ws.path());
        assert!(output_exists().evaluate(&result, ws.path()).passed);
        assert!(output_nonempty().evaluate(&result, ws.path()).passed);
        assert!(native_binary().evaluate(&result, ws.path()).passed);
        assert!(output_absent_at("a.out").evaluate(&result, ws.path()).passed);
        assert!(!output_absent().evaluate(&result, ws.path()).passed);
    }

    #[test]
    fn in_memory_plans_have_no_implicit_output() {
        let ws = tempfile::tempdir().unwrap();
        let plan = InvocationPlan::new("mem").source("hello.c").args(["--in-mem", "-S", "-emit-llvm"]);
        let result = run(plan, ws.path());
        let outcome = output_exists().evaluate(&result, ws.path());
        assert!(!outcome.passed);
        assert!(outcome.message.contains("produces no file"), "{}", outcome.message);
    }

    #[test]
    fn output_kind_explicit_and_missing() {
        let ws = tempfile::tempdir().unwrap();
        fs::write(ws.path().join("hello.ll"), "; ModuleID = 'hello.c'\n").unwrap();
        let result = run(InvocationPlan::new("p").source("hello.c"), ws.path());
        assert!(output_kind_at("hello.ll", ArtifactKind::LlvmIrText)
            .evaluate(&result, ws.path())
            .passed);
        let missing = output_kind_at("nope.ll", ArtifactKind::LlvmIrText).evaluate(&result, ws.path());
        assert!(!missing.passed);
        assert!(missing.message.contains("got UNKNOWN (file missing)"), "{}", missing.message);
    }

    #[test]
    fn empty_output_is_not_nonempty() {
        let ws = tempfile::tempdir().unwrap();
        fs::write(ws.path().join("empty.bc"), b"").unwrap();
        let result = run(InvocationPlan::new("p"), ws.path());
        let outcome = output_nonempty_at("empty.bc").evaluate(&result, ws.path());
        assert!(!outcome.passed);
        assert!(outcome.message.contains("got 0 bytes"));
    }

    #[test]
    fn native_binary_tracks_the_run_platform() {
        let ws = tempfile::tempdir().unwrap();
        fs::write(ws.path().join("elf"), ELF).unwrap();
        fs::write(ws.path().join("macho"), MACHO).unwrap();

        let mut result = run(InvocationPlan::new("p"), ws.path());
        assert!(native_binary_at("elf").evaluate(&result, ws.path()).passed);
        assert!(!native_binary_at("macho").evaluate(&result, ws.path()).passed);

        result.platform = Platform::new(Os::Macos, Arch::Aarch64);
        assert!(native_binary_at("macho").evaluate(&result, ws.path()).passed);
        assert!(!native_binary_at("elf").evaluate(&result, ws.path()).passed);

        result.platform = Platform::new(Os::Windows, Arch::X86_64);
        assert!(!native_binary_at("elf").evaluate(&result, ws.path()).passed);

        result.platform = Platform::new(Os::Other, Arch::Other);
        let outcome = native_binary_at("elf").evaluate(&result, ws.path());
        assert!(outcome.message.contains("no native artifact kind"));
    }

    #[test]
    fn output_name_uses_explicit_output() {
        let ws = tempfile::tempdir().unwrap();
        let named = run(InvocationPlan::new("p").source("hello.c").out("hello.out"), ws.path());
        assert!(output_name("hello.out").evaluate(&named, ws.path()).passed);
        assert!(!output_name("other").evaluate(&named, ws.path()).passed);

        let unnamed = run(InvocationPlan::new("p").source("hello.c"), ws.path());
        assert!(!output_name("a.out").evaluate(&unnamed, ws.path()).passed);
    }

    #[test]
    fn timed_out_runs_never_succeed_within() {
        let ws = tempfile::tempdir().unwrap();
        let mut result = run(InvocationPlan::new("p"), ws.path());
        assert!(succeeded_within(1000).evaluate(&result, ws.path()).passed);
        result.termination = Termination::TimedOut { after_ms: 5 };
        assert!(!succeeded_within(1000).evaluate(&result, ws.path()).passed);
    }

    #[test]
    fn checks_deserialize_from_tagged_maps() {
        let yaml = r#"
- { check: exit_code, code: 0 }
- { check: argv_contains, tokens: ["-D", "DEBUG"] }
- { check: output_kind, artifact: llvm_ir_text, path: hello.ll }
- { check: native_binary }
"#;
        let checks: Vec<Check> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            checks,
            vec![
                exit_code(0),
                argv_contains(["-D", "DEBUG"]),
                output_kind_at("hello.ll", ArtifactKind::LlvmIrText),
                native_binary(),
            ]
        );
    }

    #[test]
    fn excerpts_are_bounded() {
        let long = "x".repeat(EXCERPT_LEN * 2);
        assert_eq!(excerpt(&long).chars().count(), EXCERPT_LEN + 3);
    }
}

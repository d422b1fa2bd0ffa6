//! Subject process execution.
//!
//! [`CompilerRunner::execute`] spawns the subject compiler once with the
//! workspace as its working directory, captures stdout/stderr and the exit
//! code, and never returns an error: a compiler that cannot be launched
//! produces a [`RunResult`] with exit code 127 and an explanatory stderr, and
//! a run that exceeds its timeout is killed (with its process group on unix)
//! and reported with exit code 124.

use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::plan::{InvocationPlan, NamingRules};
use crate::platform::Platform;

/// Exit code recorded when the executable could not be launched.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 127;
/// Exit code recorded when the run was killed after its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How to run the subject compiler.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub executable: PathBuf,
    /// Upper bound on a single run; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Extra environment variables for the subject process.
    pub env: Vec<(String, String)>,
    /// Platform used for native-kind checks and default output naming.
    pub platform: Platform,
}

impl RunnerConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
            env: Vec::new(),
            platform: Platform::current(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// How the subject process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    Exited { code: i32 },
    Signaled { signal: i32 },
    TimedOut { after_ms: u64 },
    LaunchFailed,
}

/// Everything observed from one run. Produced exactly once per case.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub plan: InvocationPlan,
    /// The executable followed by the plan's arguments.
    pub argv: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub workspace: PathBuf,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub termination: Termination,
    pub platform: Platform,
}

impl RunResult {
    pub fn timed_out(&self) -> bool {
        matches!(self.termination, Termination::TimedOut { .. })
    }

    pub fn launched(&self) -> bool {
        !matches!(self.termination, Termination::LaunchFailed)
    }

    /// Output location predicted from the plan, relative to the workspace.
    pub fn expected_output(&self) -> Option<PathBuf> {
        self.plan
            .expected_output(&NamingRules::for_platform(&self.platform))
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Runs invocation plans against one subject executable.
#[derive(Debug, Clone)]
pub struct CompilerRunner {
    config: RunnerConfig,
}

impl CompilerRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn executable(&self) -> &Path {
        &self.config.executable
    }

    pub fn execute(&self, plan: &InvocationPlan, workspace: &Path) -> RunResult {
        self.execute_with_timeout(plan, workspace, self.config.timeout)
    }

    /// Execute with a timeout overriding the configured one.
    pub fn execute_with_timeout(
        &self,
        plan: &InvocationPlan,
        workspace: &Path,
        timeout: Option<Duration>,
    ) -> RunResult {
        let program = absolute_program(&self.config.executable);
        let plan_argv = plan.to_argv();
        let mut argv = Vec::with_capacity(plan_argv.len() + 1);
        argv.push(self.config.executable.to_string_lossy().into_owned());
        argv.extend(plan_argv.iter().cloned());

        let started = Instant::now();
        let mut result = RunResult {
            plan: plan.clone(),
            argv,
            exit_code: LAUNCH_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            workspace: workspace.to_path_buf(),
            duration: Duration::ZERO,
            termination: Termination::LaunchFailed,
            platform: self.config.platform,
        };

        let mut command = Command::new(&program);
        command
            .args(&plan_argv)
            .current_dir(workspace)
            .envs(self.config.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            // Own process group, so a timeout can take down grandchildren too.
            command.process_group(0);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                result.stderr = format!("failed to launch {}: {}", program.display(), e);
                result.duration = started.elapsed();
                return result;
            }
        };

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);
        let waited = wait_with_deadline(&mut child, timeout);
        // Background processes left by the child would hold the pipes open.
        kill_group(&child);
        result.stdout = join_reader(stdout);
        result.stderr = join_reader(stderr);
        result.duration = started.elapsed();

        match waited {
            Ok(Waited::Exited(status)) => {
                let (code, termination) = decode_status(status);
                result.exit_code = code;
                result.termination = termination;
            }
            Ok(Waited::TimedOut) => {
                result.exit_code = TIMEOUT_EXIT_CODE;
                result.termination = Termination::TimedOut {
                    after_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
                };
            }
            Err(e) => {
                if !result.stderr.is_empty() && !result.stderr.ends_with('\n') {
                    result.stderr.push('\n');
                }
                result.stderr.push_str(&format!("failed to wait for {}: {}", program.display(), e));
            }
        }
        result
    }
}

enum Waited {
    Exited(ExitStatus),
    TimedOut,
}

fn wait_with_deadline(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<Waited> {
    let Some(limit) = timeout else {
        return child.wait().map(Waited::Exited);
    };
    let deadline = Instant::now().checked_add(limit);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited::Exited(status));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            terminate(child);
            let _ = child.wait();
            return Ok(Waited::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child and, on unix, every process in its group.
fn terminate(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
}

/// SIGKILL the process group led by `child`. No-op off unix.
fn kill_group(child: &Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: signalling a process group we created; no memory is touched.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = child;
}

fn decode_status(status: ExitStatus) -> (i32, Termination) {
    if let Some(code) = status.code() {
        return (code, Termination::Exited { code });
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(signal) = status.signal() {
            return (128 + signal, Termination::Signaled { signal });
        }
    }
    (1, Termination::Exited { code: 1 })
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Relative paths with a directory component are resolved against the
/// harness's own working directory, not the workspace the child runs in.
fn absolute_program(executable: &Path) -> PathBuf {
    let bare_name = executable.components().count() == 1;
    if executable.is_absolute() || bare_name {
        return executable.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(executable))
        .unwrap_or_else(|_| executable.to_path_buf())
}

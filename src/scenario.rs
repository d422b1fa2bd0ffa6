//! YAML scenario files.
//!
//! A scenario file declares one suite: its fixtures and its cases, each case
//! an invocation plan plus a list of checks. Fixture paths are resolved
//! relative to the scenario file's directory unless a fixtures directory is
//! given explicitly.
//!
//! ```yaml
//! suite: smoke
//! fixtures_dir: fixtures
//! fixtures: [hello.c]
//! cases:
//!   - name: compile_elf_hello
//!     platforms: [linux]
//!     sources: [hello.c]
//!     out: hello.out
//!     expect:
//!       - { check: exit_code, code: 0 }
//!       - { check: output_kind, artifact: elf }
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::assertions::Check;
use crate::errors::{HarnessError, HarnessResult};
use crate::plan::InvocationPlan;
use crate::platform::Os;
use crate::suite::{Suite, TestCase};

const SCENARIO_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    /// Defaults to the file stem.
    #[serde(default)]
    pub suite: Option<String>,
    #[serde(default)]
    pub fixtures_dir: Option<PathBuf>,
    #[serde(default)]
    pub fixtures: Vec<PathBuf>,
    #[serde(default)]
    pub cases: Vec<CaseSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseSpec {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub out: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub platforms: Option<Vec<Os>>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub expect: Vec<Check>,
}

impl CaseSpec {
    pub fn plan(&self) -> InvocationPlan {
        InvocationPlan {
            name: self.name.clone(),
            sources: self.sources.clone(),
            out: self.out.clone(),
            extra_args: self.args.clone(),
        }
    }

    pub fn into_case(self) -> TestCase {
        let mut case = TestCase::new(&self.name, self.plan()).expect_all(self.expect);
        case.platforms = self.platforms;
        case.timeout = self.timeout_secs.map(Duration::from_secs);
        case
    }
}

/// A parsed scenario together with where it came from.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub path: PathBuf,
    pub file: ScenarioFile,
}

impl Scenario {
    pub fn name(&self) -> String {
        self.file.suite.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "suite".to_string())
        })
    }

    /// Directory fixtures are resolved against, honoring an override.
    pub fn fixtures_root(&self, override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            return dir.to_path_buf();
        }
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        match &self.file.fixtures_dir {
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        }
    }

    pub fn into_suite(self, fixtures_override: Option<&Path>) -> Suite {
        let root = self.fixtures_root(fixtures_override);
        let mut suite = Suite::new(self.name());
        suite.fixtures = self.file.fixtures.iter().map(|f| root.join(f)).collect();
        suite.cases = self.file.cases.into_iter().map(CaseSpec::into_case).collect();
        suite
    }
}

pub fn parse_scenario(path: &Path, text: &str) -> HarnessResult<Scenario> {
    let file = serde_yaml::from_str(text).map_err(|source| HarnessError::ScenarioParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Scenario {
        path: path.to_path_buf(),
        file,
    })
}

pub fn load_scenario(path: &Path) -> HarnessResult<Scenario> {
    let text = fs::read_to_string(path).map_err(|source| HarnessError::ScenarioRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenario(path, &text)
}

/// Recursively collect scenario files under `root`, sorted by path.
/// A file argument is returned as-is.
pub fn discover_scenario_files(root: &Path) -> HarnessResult<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| HarnessError::Discovery {
            root: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_scenario = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| SCENARIO_EXTENSIONS.contains(&ext));
        if entry.file_type().is_file() && is_scenario {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(HarnessError::NoScenarios {
            root: root.to_path_buf(),
        });
    }
    files.sort();
    Ok(files)
}

/// Discover and load every scenario under each of `roots`, in order.
pub fn load_all(roots: &[PathBuf]) -> HarnessResult<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    for root in roots {
        for path in discover_scenario_files(root)? {
            scenarios.push(load_scenario(&path)?);
        }
    }
    Ok(scenarios)
}

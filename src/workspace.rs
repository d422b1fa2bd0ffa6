//! Isolated per-case workspaces.
//!
//! A [`Workspace`] is a uniquely named directory created fresh for one case.
//! Fixtures are copied in, never referenced in place. The directory is
//! removed when the value is dropped, on every exit path including panics;
//! [`Workspace::close`] removes it eagerly and reports cleanup errors.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::errors::{HarnessError, HarnessResult};

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `parent`, named after the case.
    pub fn create(parent: &Path, case_name: &str) -> HarnessResult<Self> {
        let workspace_error = |source: io::Error| HarnessError::Workspace {
            root: parent.to_path_buf(),
            source,
        };
        fs::create_dir_all(parent).map_err(workspace_error)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}_", sanitize(case_name)))
            .tempdir_in(parent)
            .map_err(workspace_error)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy one fixture into the workspace root under its file name.
    pub fn copy_fixture(&self, fixture: &Path) -> io::Result<PathBuf> {
        let name = fixture.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("fixture path has no file name: {}", fixture.display()),
            )
        })?;
        let dest = self.path().join(name);
        fs::copy(fixture, &dest)?;
        Ok(dest)
    }

    pub fn copy_fixtures(&self, fixtures: &[PathBuf]) -> HarnessResult<()> {
        for fixture in fixtures {
            self.copy_fixture(fixture).map_err(|source| HarnessError::Workspace {
                root: self.path().to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Remove the workspace now, surfacing any cleanup error.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Keep workspace prefixes to portable file-name characters.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "case".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspaces_are_unique_and_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path(), "same").unwrap();
        let b = Workspace::create(root.path(), "same").unwrap();
        assert_ne!(a.path(), b.path());
        let a_path = a.path().to_path_buf();
        drop(a);
        assert!(!a_path.exists());
        b.close().unwrap();
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn fixtures_are_copied_not_linked() {
        let root = tempfile::tempdir().unwrap();
        let fixture = root.path().join("hello.c");
        fs::write(&fixture, "int main(void) { return 0; }\n").unwrap();

        let ws = Workspace::create(&root.path().join("work"), "copy").unwrap();
        ws.copy_fixtures(&[fixture.clone()]).unwrap();
        let copied = ws.path().join("hello.c");
        fs::write(&copied, "mutated").unwrap();
        assert_eq!(fs::read_to_string(&fixture).unwrap(), "int main(void) { return 0; }\n");
    }

    #[test]
    fn missing_fixture_is_a_workspace_error() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), "missing").unwrap();
        let err = ws.copy_fixtures(&[root.path().join("nope.c")]).unwrap_err();
        assert!(matches!(err, HarnessError::Workspace { .. }));
    }

    #[test]
    fn directory_prefix_is_sanitized() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path(), "a/b c").unwrap();
        let name = ws.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("a_b_c_"), "{name}");
    }
}

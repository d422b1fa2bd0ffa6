//! Shared helpers for integration tests: fake compiler drivers and fixtures.
//!
//! The fake compilers are POSIX shell scripts, so every test using them is
//! gated on `cfg(unix)`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Leading bytes of the host's native executable format, as printf escapes.
/// NUL bytes are avoided since not every `printf` emits them.
#[cfg(target_os = "macos")]
const NATIVE_MAGIC: &str = r"\317\372\355\376\007\001";
#[cfg(not(target_os = "macos"))]
const NATIVE_MAGIC: &str = r"\177ELF\002\001\001";

/// Behaves like a C driver for naming purposes: honors `-o X`, `-o=X`,
/// `-c`, `-S` and `-emit-llvm`, and writes a file of the matching format.
const DRIVER_BODY: &str = r#"
out=""
mode=link
llvm=0
first=""
expect_out=0
for arg in "$@"; do
  if [ "$expect_out" = 1 ]; then out="$arg"; expect_out=0; continue; fi
  case "$arg" in
    -o) expect_out=1 ;;
    -o=*) out="${arg#-o=}" ;;
    -c) [ "$mode" = asm ] || mode=obj ;;
    -S) mode=asm ;;
    -emit-llvm) llvm=1 ;;
    --help)
      echo "Usage: cc [options] <file>..."
      echo "Core options:"
      echo "  --instrument   enable runtime checks"
      echo "Exit codes:"
      echo "  0 success"
      exit 0 ;;
    --in-mem)
      echo "; ModuleID = 'hello.c'"
      echo "target triple = \"x86_64-unknown-linux-gnu\""
      exit 0 ;;
    -*) ;;
    *) [ -z "$first" ] && first="$arg" ;;
  esac
done
if [ -n "$first" ] && [ ! -f "$first" ]; then
  echo "error: no such file: $first" >&2
  exit 1
fi
base=$(basename "$first")
base="${base%.*}"
if [ -z "$out" ]; then
  case "$mode" in
    link) out=a.out ;;
    obj) if [ "$llvm" = 1 ]; then out="$base.bc"; else out="$base.o"; fi ;;
    asm) if [ "$llvm" = 1 ]; then out="$base.ll"; else out="$base.s"; fi ;;
  esac
fi
case "$mode$llvm" in
  obj1) printf 'BC\300\336\065\024' > "$out" ;;
  asm1) printf "; ModuleID = '%s'\ntarget triple = \"x86_64-unknown-linux-gnu\"\n" "$first" > "$out" ;;
  asm0) printf '\t.text\n\t.globl main\nmain:\n\tret\n' > "$out" ;;
  *) printf '@MAGIC@' > "$out" ;;
esac
echo "wrote $out"
"#;

/// A directory holding scripts, fixtures and a work root for one test.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn work_root(&self) -> PathBuf {
        self.path().join("work")
    }

    /// A driver that produces correctly named and formatted outputs.
    pub fn fake_compiler(&self) -> PathBuf {
        self.script("cc", &DRIVER_BODY.replace("@MAGIC@", NATIVE_MAGIC))
    }

    /// A driver that always fails with `code` and writes nothing.
    pub fn failing_compiler(&self, code: i32) -> PathBuf {
        self.script(
            "cc_fail",
            &format!("echo \"error: internal compiler error\" >&2\nexit {code}\n"),
        )
    }

    /// A driver that hangs, with a child process holding the pipes open.
    pub fn hanging_compiler(&self) -> PathBuf {
        self.script("cc_hang", "sleep 30 &\nwait\n")
    }

    /// Write the standard C fixtures and return their paths.
    pub fn fixtures(&self) -> Vec<PathBuf> {
        let dir = self.path().join("fixtures");
        fs::create_dir_all(&dir).unwrap();
        let files = [
            ("hello.c", "int main(void) { return 0; }\n"),
            ("debug.c", "int main(void) {\n#ifdef DEBUG\n  return 0;\n#endif\n  return 0;\n}\n"),
        ];
        files
            .iter()
            .map(|(name, text)| {
                let path = dir.join(name);
                fs::write(&path, text).unwrap();
                path
            })
            .collect()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[cfg(unix)]
    fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(not(unix))]
    fn script(&self, _name: &str, _body: &str) -> PathBuf {
        unimplemented!("fake compilers are shell scripts")
    }
}

/// Number of entries left directly under `dir`, zero if it does not exist.
pub fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

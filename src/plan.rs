//! Invocation plans: an immutable description of one compiler call.
//!
//! A plan renders to an argument vector deterministically:
//! sources (in order), then extra arguments (verbatim, in order), then
//! `-o <out>` when an explicit output is set. Output may instead be folded
//! into the extra arguments (`-o=NAME` or `-o NAME`); using both forms at once
//! is left to the caller and not validated.
//!
//! Plans also predict where the subject compiler will write its output when
//! no path is given, following the usual driver conventions captured in
//! [`NamingRules`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::platform::{Os, Platform};

/// Canonical two-token output flag.
pub const OUTPUT_FLAG: &str = "-o";
/// Compact single-token output prefix.
pub const OUTPUT_FLAG_COMPACT: &str = "-o=";
/// Stop after compiling to an object file.
pub const COMPILE_ONLY_FLAG: &str = "-c";
/// Stop after emitting assembly.
pub const ASSEMBLY_FLAG: &str = "-S";
/// Emit LLVM IR instead of native code.
pub const EMIT_LLVM_FLAG: &str = "-emit-llvm";
/// Print IR to stdout instead of writing a file.
pub const IN_MEMORY_FLAGS: [&str; 2] = ["--in-mem", "--in-memory"];

/// Flags whose value is the following token, so that token is never a source.
const FLAGS_WITH_VALUE: [&str; 13] = [
    "-o", "-x", "-D", "-U", "-I", "-L", "-include", "-isystem", "-iquote", "-MF", "-MT",
    "-Xclang", "-Xlinker",
];

const SOURCE_EXTENSIONS: [&str; 12] = [
    "c", "cc", "cpp", "cxx", "c++", "C", "m", "mm", "i", "ii", "ll", "bc",
];

/// What kind of output an invocation produces, as far as naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Full compile and link.
    Link,
    /// `-c`
    Object,
    /// `-S`
    Assembly,
    /// `-S -emit-llvm`
    IrText,
    /// `-c -emit-llvm`
    Bitcode,
    /// IR printed to stdout, no file written.
    InMemory,
}

/// Default output naming conventions of the subject driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingRules {
    pub default_executable: String,
    pub object_ext: String,
    pub assembly_ext: String,
    pub ir_text_ext: String,
    pub bitcode_ext: String,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            default_executable: "a.out".to_string(),
            object_ext: "o".to_string(),
            assembly_ext: "s".to_string(),
            ir_text_ext: "ll".to_string(),
            bitcode_ext: "bc".to_string(),
        }
    }
}

impl NamingRules {
    pub fn for_platform(platform: &Platform) -> Self {
        match platform.os {
            Os::Windows => Self {
                default_executable: "a.exe".to_string(),
                object_ext: "obj".to_string(),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    fn extension_for(&self, mode: OutputMode) -> Option<&str> {
        match mode {
            OutputMode::Object => Some(self.object_ext.as_str()),
            OutputMode::Assembly => Some(self.assembly_ext.as_str()),
            OutputMode::IrText => Some(self.ir_text_ext.as_str()),
            OutputMode::Bitcode => Some(self.bitcode_ext.as_str()),
            OutputMode::Link | OutputMode::InMemory => None,
        }
    }
}

/// One compiler call: ordered sources, optional output, ordered extra arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationPlan {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub out: Option<PathBuf>,
    #[serde(default, rename = "args")]
    pub extra_args: Vec<String>,
}

impl InvocationPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            out: None,
            extra_args: Vec::new(),
        }
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn out(mut self, out: impl Into<PathBuf>) -> Self {
        self.out = Some(out.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Render the argument vector, excluding the executable itself.
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.sources.len() + self.extra_args.len() + 2);
        argv.extend(self.sources.iter().map(|s| path_arg(s)));
        argv.extend(self.extra_args.iter().cloned());
        if let Some(out) = &self.out {
            argv.push(OUTPUT_FLAG.to_string());
            argv.push(path_arg(out));
        }
        argv
    }

    /// Output mode selected by the naming-relevant flags in the extra arguments.
    ///
    /// `-S` takes precedence over `-c`, as the driver stops at the earliest phase.
    pub fn output_mode(&self) -> OutputMode {
        let options = self.options();
        let has = |flag: &str| options.iter().any(|a| a.as_str() == flag);
        if IN_MEMORY_FLAGS.iter().any(|f| has(*f)) {
            return OutputMode::InMemory;
        }
        let emit_llvm = has(EMIT_LLVM_FLAG);
        match (has(ASSEMBLY_FLAG), has(COMPILE_ONLY_FLAG), emit_llvm) {
            (true, _, true) => OutputMode::IrText,
            (true, _, false) => OutputMode::Assembly,
            (false, true, true) => OutputMode::Bitcode,
            (false, true, false) => OutputMode::Object,
            (false, false, _) => OutputMode::Link,
        }
    }

    /// Output path given explicitly, either through `out` or inside the extra arguments.
    ///
    /// The last occurrence in the extra arguments wins, mirroring the driver.
    pub fn explicit_output(&self) -> Option<PathBuf> {
        if let Some(out) = &self.out {
            return Some(out.clone());
        }
        let mut found = None;
        let mut args = self.options().into_iter();
        while let Some(arg) = args.next() {
            if arg == OUTPUT_FLAG {
                if let Some(value) = args.next() {
                    found = Some(PathBuf::from(value));
                }
            } else if let Some(value) = arg.strip_prefix(OUTPUT_FLAG_COMPACT) {
                found = Some(PathBuf::from(value));
            }
        }
        found
    }

    /// First source file, from `sources` or else the first positional source in the extra arguments.
    pub fn primary_source(&self) -> Option<PathBuf> {
        if let Some(first) = self.sources.first() {
            return Some(first.clone());
        }
        let mut skip_next = false;
        let mut positional_only = false;
        for arg in &self.extra_args {
            if skip_next {
                skip_next = false;
                continue;
            }
            if !positional_only {
                if arg == "--" {
                    positional_only = true;
                    continue;
                }
                if FLAGS_WITH_VALUE.contains(&arg.as_str()) {
                    skip_next = true;
                    continue;
                }
                if arg.starts_with('-') {
                    continue;
                }
            }
            if looks_like_source(arg) {
                return Some(PathBuf::from(arg));
            }
        }
        None
    }

    /// Where the subject is expected to write its output, relative to the workspace.
    ///
    /// An explicit output always wins. Otherwise the naming rules apply:
    /// linking yields the default executable name, `-c`/`-S` (optionally with
    /// `-emit-llvm`) yield the primary source's stem with the matching
    /// extension. In-memory invocations write no file and yield `None`.
    pub fn expected_output(&self, rules: &NamingRules) -> Option<PathBuf> {
        if let Some(explicit) = self.explicit_output() {
            return Some(explicit);
        }
        let mode = self.output_mode();
        match mode {
            OutputMode::InMemory => None,
            OutputMode::Link => Some(PathBuf::from(&rules.default_executable)),
            _ => {
                let source = self.primary_source()?;
                let stem = source.file_stem()?;
                let ext = rules.extension_for(mode)?;
                Some(PathBuf::from(stem).with_extension(ext))
            }
        }
    }

    /// Extra arguments that are options, i.e. everything before a `--` separator.
    fn options(&self) -> Vec<&String> {
        self.extra_args.iter().take_while(|a| a.as_str() != "--").collect()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn looks_like_source(arg: &str) -> bool {
    Path::new(arg)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Arch;

    fn hello() -> InvocationPlan {
        InvocationPlan::new("hello").source("hello.c")
    }

    #[test]
    fn argv_order_is_sources_then_args_then_output() {
        let plan = InvocationPlan::new("multi")
            .source("b.c")
            .source("a.c")
            .args(["-DX", "-O2"])
            .out("prog");
        assert_eq!(plan.to_argv(), ["b.c", "a.c", "-DX", "-O2", "-o", "prog"]);
        assert_eq!(plan.to_argv(), plan.to_argv());
    }

    #[test]
    fn argv_without_sources_keeps_args_verbatim() {
        let plan = InvocationPlan::new("xcxx").args(["-x=c++", "cpp_as_c.c", "-o=hello_xcxx.out"]);
        assert_eq!(plan.to_argv(), ["-x=c++", "cpp_as_c.c", "-o=hello_xcxx.out"]);
        assert_eq!(plan.primary_source(), Some(PathBuf::from("cpp_as_c.c")));
    }

    #[test]
    fn implicit_object_and_ir_names() {
        let rules = NamingRules::default();
        let obj = hello().arg("-c");
        assert_eq!(obj.output_mode(), OutputMode::Object);
        assert_eq!(obj.expected_output(&rules), Some(PathBuf::from("hello.o")));

        let ir = hello().args(["-S", "-emit-llvm"]);
        assert_eq!(ir.output_mode(), OutputMode::IrText);
        assert_eq!(ir.expected_output(&rules), Some(PathBuf::from("hello.ll")));

        let asm = hello().arg("-S");
        assert_eq!(asm.expected_output(&rules), Some(PathBuf::from("hello.s")));

        let bc = hello().args(["-c", "-emit-llvm"]);
        assert_eq!(bc.expected_output(&rules), Some(PathBuf::from("hello.bc")));
    }

    #[test]
    fn link_defaults_to_platform_executable_name() {
        assert_eq!(hello().expected_output(&NamingRules::default()), Some(PathBuf::from("a.out")));
        let windows = NamingRules::for_platform(&Platform::new(Os::Windows, Arch::X86_64));
        assert_eq!(hello().expected_output(&windows), Some(PathBuf::from("a.exe")));
        assert_eq!(
            hello().arg("-c").expected_output(&windows),
            Some(PathBuf::from("hello.obj"))
        );
    }

    #[test]
    fn explicit_output_forms() {
        let rules = NamingRules::default();
        assert_eq!(hello().out("x.out").expected_output(&rules), Some(PathBuf::from("x.out")));
        assert_eq!(
            hello().args(["-c", "-o=main.o"]).expected_output(&rules),
            Some(PathBuf::from("main.o"))
        );
        assert_eq!(
            hello().args(["--instrument", "-o", "app"]).expected_output(&rules),
            Some(PathBuf::from("app"))
        );
    }

    #[test]
    fn in_memory_writes_no_file() {
        let plan = hello().args(["--in-mem", "-S", "-emit-llvm"]);
        assert_eq!(plan.output_mode(), OutputMode::InMemory);
        assert_eq!(plan.expected_output(&NamingRules::default()), None);
    }

    #[test]
    fn flag_values_are_not_mistaken_for_sources() {
        let plan = InvocationPlan::new("p").args(["-D", "DEBUG", "-I", "inc.c", "-c", "main.cpp"]);
        assert_eq!(plan.primary_source(), Some(PathBuf::from("main.cpp")));
        assert_eq!(
            plan.expected_output(&NamingRules::default()),
            Some(PathBuf::from("main.o"))
        );
    }

    #[test]
    fn arguments_after_separator_are_positional() {
        let plan = InvocationPlan::new("p").args(["-c", "--", "-weird.c"]);
        assert_eq!(plan.primary_source(), Some(PathBuf::from("-weird.c")));
        // A `-S` after the separator is a file name, not a flag.
        let plan = InvocationPlan::new("p").args(["-c", "--", "-S"]);
        assert_eq!(plan.output_mode(), OutputMode::Object);
    }

    #[test]
    fn compile_only_without_source_has_no_implicit_output() {
        let plan = InvocationPlan::new("p").arg("-c");
        assert_eq!(plan.expected_output(&NamingRules::default()), None);
    }

    #[test]
    fn source_stem_drops_directories() {
        let plan = InvocationPlan::new("p").source("src/nested/unit.cc").arg("-c");
        assert_eq!(
            plan.expected_output(&NamingRules::default()),
            Some(PathBuf::from("unit.o"))
        );
    }
}

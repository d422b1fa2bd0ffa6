//! Host platform detection.
//!
//! The host is identified once per process and cached. Components that care
//! about the platform (native binary checks, default output naming) receive a
//! [`Platform`] value explicitly, so tests can substitute any platform without
//! touching global state.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::inspect::ArtifactKind;

/// Operating system family of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    Linux,
    Macos,
    Windows,
    Other,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Macos => "macos",
            Os::Windows => "windows",
            Os::Other => "other",
        }
    }

    fn from_target(os: &str) -> Self {
        match os {
            "linux" | "android" => Os::Linux,
            "macos" | "ios" => Os::Macos,
            "windows" => Os::Windows,
            _ => Os::Other,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CPU architecture of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86_64,
    Aarch64,
    X86,
    Arm,
    Other,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::X86 => "x86",
            Arch::Arm => "arm",
            Arch::Other => "other",
        }
    }

    fn from_target(arch: &str) -> Self {
        match arch {
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Aarch64,
            "x86" => Arch::X86,
            "arm" => Arch::Arm,
            _ => Arch::Other,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An `{os, arch}` pair. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

static HOST: Lazy<Platform> = Lazy::new(|| Platform {
    os: Os::from_target(std::env::consts::OS),
    arch: Arch::from_target(std::env::consts::ARCH),
});

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The host platform, computed on first use and cached for the process lifetime.
    pub fn current() -> Platform {
        *HOST
    }

    /// The artifact kind a native compile produces on this platform.
    ///
    /// Returns `None` for operating systems without a known object format.
    pub fn native_kind(&self) -> Option<ArtifactKind> {
        match self.os {
            Os::Linux => Some(ArtifactKind::Elf),
            Os::Macos => Some(ArtifactKind::MachO),
            Os::Windows => Some(ArtifactKind::Pe),
            Os::Other => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable_across_calls() {
        assert_eq!(Platform::current(), Platform::current());
    }

    #[test]
    fn native_kind_per_os() {
        let linux = Platform::new(Os::Linux, Arch::X86_64);
        let mac = Platform::new(Os::Macos, Arch::Aarch64);
        let win = Platform::new(Os::Windows, Arch::X86_64);
        assert_eq!(linux.native_kind(), Some(ArtifactKind::Elf));
        assert_eq!(mac.native_kind(), Some(ArtifactKind::MachO));
        assert_eq!(win.native_kind(), Some(ArtifactKind::Pe));
        assert_eq!(Platform::new(Os::Other, Arch::Other).native_kind(), None);
    }

    #[test]
    fn target_names_map_to_families() {
        assert_eq!(Os::from_target("android"), Os::Linux);
        assert_eq!(Os::from_target("freebsd"), Os::Other);
        assert_eq!(Arch::from_target("riscv64"), Arch::Other);
        assert_eq!(Platform::new(Os::Linux, Arch::Aarch64).to_string(), "linux-aarch64");
    }
}

//! Content-sniffing artifact classifier.
//!
//! Files are classified from a bounded prefix of their bytes, never from
//! their name or extension. Classification is total: unreadable, empty or
//! truncated input yields [`ArtifactKind::Unknown`] rather than an error.
//!
//! Recognized formats:
//! - ELF: `7F 'E' 'L' 'F'` at offset 0
//! - Mach-O: thin 32/64-bit magics in either byte order, and fat/universal
//!   containers (whose header carries a small architecture count)
//! - PE: `MZ` DOS header whose `e_lfanew` field points at `PE\0\0`
//! - LLVM bitcode: raw `BC C0 DE` stream or the bitcode wrapper header
//! - LLVM IR text: UTF-8 text with a module or target header line near the top

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::platform::Platform;

/// Number of leading bytes read when sniffing a file.
pub const SNIFF_LEN: usize = 4096;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const BITCODE_MAGIC: [u8; 4] = [b'B', b'C', 0xc0, 0xde];
const BITCODE_WRAPPER_MAGIC: [u8; 4] = [0xde, 0xc0, 0x17, 0x0b];
const PE_SIGNATURE: [u8; 4] = [b'P', b'E', 0, 0];

const MH_MAGIC: u32 = 0xfeed_face;
const MH_CIGAM: u32 = 0xcefa_edfe;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_CIGAM_64: u32 = 0xcffa_edfe;
const FAT_MAGIC: u32 = 0xcafe_babe;
const FAT_CIGAM: u32 = 0xbeba_feca;
const FAT_MAGIC_64: u32 = 0xcafe_babf;
const FAT_CIGAM_64: u32 = 0xbfba_feca;

/// Java class files share `CAFEBABE`; their "count" field is a version
/// number well above any real universal binary's slice count.
const FAT_MAX_ARCHS: u32 = 30;

/// Offset of `e_lfanew` inside the DOS header.
const DOS_LFANEW_OFFSET: usize = 0x3c;

/// The IR header lines a textual LLVM module starts with.
static IR_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:; ModuleID = |source_filename = |target datalayout = |target triple = )")
        .expect("IR header pattern is a valid regex")
});

/// Binary or textual format of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "elf")]
    Elf,
    #[serde(rename = "macho")]
    MachO,
    #[serde(rename = "pe")]
    Pe,
    #[serde(rename = "llvm_bitcode")]
    LlvmBitcode,
    #[serde(rename = "llvm_ir_text")]
    LlvmIrText,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Elf => "ELF",
            ArtifactKind::MachO => "MACHO",
            ArtifactKind::Pe => "PE",
            ArtifactKind::LlvmBitcode => "LLVM_BITCODE",
            ArtifactKind::LlvmIrText => "LLVM_IR_TEXT",
            ArtifactKind::Unknown => "UNKNOWN",
        }
    }

    pub fn is_native_binary(&self) -> bool {
        matches!(self, ArtifactKind::Elf | ArtifactKind::MachO | ArtifactKind::Pe)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of sniffing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ArtifactKind,
    /// True for zero-byte and unreadable files.
    pub is_empty: bool,
}

impl Classification {
    const EMPTY: Classification = Classification {
        kind: ArtifactKind::Unknown,
        is_empty: true,
    };

    /// Whether the kind equals the artifact kind native to `platform`.
    pub fn is_native_for(&self, platform: &Platform) -> bool {
        platform.native_kind() == Some(self.kind)
    }
}

/// Descriptive summary of a file, used by the `inspect` command.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub kind: ArtifactKind,
    pub is_empty: bool,
    pub size: u64,
    pub sha256: String,
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Classify a byte buffer holding the start of a file (or the whole file).
///
/// PE detection needs the PE signature to lie inside `bytes`; use
/// [`classify_file`] for files whose header may be larger than the prefix.
pub fn classify_bytes(bytes: &[u8]) -> Classification {
    if bytes.is_empty() {
        return Classification::EMPTY;
    }
    let kind = sniff_binary(bytes)
        .or_else(|| pe_header_offset(bytes).and_then(|off| pe_signature_in(bytes, off)))
        .or_else(|| sniff_ir_text(bytes))
        .unwrap_or(ArtifactKind::Unknown);
    Classification {
        kind,
        is_empty: false,
    }
}

/// Classify the file at `path`. Never fails.
pub fn classify_file(path: &Path) -> Classification {
    let Ok(mut file) = File::open(path) else {
        return Classification::EMPTY;
    };
    let prefix = match read_prefix(&mut file, SNIFF_LEN) {
        Ok(prefix) => prefix,
        Err(_) => return Classification::EMPTY,
    };
    let classification = classify_bytes(&prefix);
    if classification.kind != ArtifactKind::Unknown || classification.is_empty {
        return classification;
    }

    // A DOS stub may push the PE header past the sniffed prefix.
    match pe_header_offset(&prefix) {
        Some(offset)
            if offset
                .checked_add(PE_SIGNATURE.len())
                .map_or(false, |end| end > prefix.len()) =>
        {
            if pe_signature_at(&mut file, offset) {
                Classification {
                    kind: ArtifactKind::Pe,
                    is_empty: false,
                }
            } else {
                classification
            }
        }
        _ => classification,
    }
}

/// Whether the file at `path` is the native binary kind for `platform`.
pub fn is_native_for(path: &Path, platform: &Platform) -> bool {
    classify_file(path).is_native_for(platform)
}

/// Classify `path` and compute its size and SHA-256 digest.
pub fn summarize(path: &Path) -> io::Result<ArtifactSummary> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        hasher.update(&buf[..n]);
    }
    let classification = classify_file(path);
    Ok(ArtifactSummary {
        kind: classification.kind,
        is_empty: classification.is_empty,
        size,
        sha256: format!("{:x}", hasher.finalize()),
    })
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn read_prefix(reader: &mut impl Read, limit: usize) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(limit);
    reader.take(limit as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

fn sniff_binary(bytes: &[u8]) -> Option<ArtifactKind> {
    let head: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    if head == ELF_MAGIC {
        return Some(ArtifactKind::Elf);
    }
    if head == BITCODE_MAGIC || head == BITCODE_WRAPPER_MAGIC {
        return Some(ArtifactKind::LlvmBitcode);
    }
    match u32::from_be_bytes(head) {
        MH_MAGIC | MH_CIGAM | MH_MAGIC_64 | MH_CIGAM_64 => Some(ArtifactKind::MachO),
        FAT_MAGIC | FAT_MAGIC_64 => fat_arch_count(bytes, u32::from_be_bytes),
        FAT_CIGAM | FAT_CIGAM_64 => fat_arch_count(bytes, u32::from_le_bytes),
        _ => None,
    }
}

fn fat_arch_count(bytes: &[u8], read: fn([u8; 4]) -> u32) -> Option<ArtifactKind> {
    let count: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
    let count = read(count);
    (1..=FAT_MAX_ARCHS)
        .contains(&count)
        .then_some(ArtifactKind::MachO)
}

/// Offset of the PE header announced by a DOS `MZ` header, if any.
fn pe_header_offset(bytes: &[u8]) -> Option<usize> {
    if !bytes.starts_with(b"MZ") {
        return None;
    }
    let field: [u8; 4] = bytes
        .get(DOS_LFANEW_OFFSET..DOS_LFANEW_OFFSET + 4)?
        .try_into()
        .ok()?;
    let offset = u32::from_le_bytes(field) as usize;
    // The PE header cannot overlap the DOS header itself.
    (offset >= DOS_LFANEW_OFFSET + 4).then_some(offset)
}

fn pe_signature_in(bytes: &[u8], offset: usize) -> Option<ArtifactKind> {
    let end = offset.checked_add(PE_SIGNATURE.len())?;
    (bytes.get(offset..end)? == PE_SIGNATURE).then_some(ArtifactKind::Pe)
}

fn pe_signature_at(file: &mut File, offset: usize) -> bool {
    let mut sig = [0u8; 4];
    file.seek(SeekFrom::Start(offset as u64))
        .and_then(|_| file.read_exact(&mut sig))
        .map(|_| sig == PE_SIGNATURE)
        .unwrap_or(false)
}

fn sniff_ir_text(bytes: &[u8]) -> Option<ArtifactKind> {
    let window = &bytes[..bytes.len().min(SNIFF_LEN)];
    if window.contains(&0) {
        return None;
    }
    let text = match std::str::from_utf8(window) {
        Ok(text) => text,
        // A prefix may end in the middle of a multi-byte character.
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&window[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    IR_HEADER.is_match(text).then_some(ArtifactKind::LlvmIrText)
}

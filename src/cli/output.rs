//! User-facing output for the `list` and `inspect` subcommands.
//!
//! Suite results go through [`crate::report`]; this module covers the
//! remaining console listings and keeps their coloring in one place.

use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::inspect::ArtifactSummary;
use crate::platform::Platform;
use crate::scenario::Scenario;

/// Whether stdout should be colored.
pub fn use_colors(no_color: bool) -> bool {
    !no_color && atty::is(atty::Stream::Stdout)
}

pub fn stdout(use_colors: bool) -> StandardStream {
    StandardStream::stdout(if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

// ============================================================================
// LIST
// ============================================================================

pub fn write_listing<W: WriteColor>(out: &mut W, scenarios: &[Scenario], host: &Platform) -> io::Result<()> {
    for scenario in scenarios {
        heading(out, &scenario.name())?;
        writeln!(out, " ({})", scenario.path.display())?;
        for case in &scenario.file.cases {
            let applies = case
                .platforms
                .as_ref()
                .map_or(true, |oses| oses.contains(&host.os));
            write!(out, "  {}", case.name)?;
            if !applies {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
                write!(out, " [not on {}]", host.os)?;
                out.reset()?;
            }
            writeln!(out)?;
            writeln!(out, "    argv: <compiler> {}", case.plan().to_argv().join(" "))?;
        }
    }
    Ok(())
}

// ============================================================================
// INSPECT
// ============================================================================

#[derive(Debug, Serialize)]
pub struct Inspection {
    pub path: PathBuf,
    #[serde(flatten)]
    pub summary: ArtifactSummary,
    pub native: bool,
}

impl Inspection {
    pub fn new(path: &Path, summary: ArtifactSummary, host: &Platform) -> Self {
        let native = !summary.is_empty && host.native_kind() == Some(summary.kind);
        Self {
            path: path.to_path_buf(),
            summary,
            native,
        }
    }
}

pub fn write_inspection<W: WriteColor>(out: &mut W, inspection: &Inspection) -> io::Result<()> {
    heading(out, &inspection.path.display().to_string())?;
    writeln!(out)?;
    writeln!(out, "  kind:   {}", inspection.summary.kind.as_str())?;
    writeln!(out, "  empty:  {}", inspection.summary.is_empty)?;
    writeln!(out, "  size:   {} bytes", inspection.summary.size)?;
    writeln!(out, "  sha256: {}", inspection.summary.sha256)?;
    writeln!(out, "  native: {}", inspection.native)
}

pub fn write_inspections_json<W: Write>(out: &mut W, inspections: &[Inspection]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, inspections)?;
    writeln!(out)
}

fn heading<W: WriteColor>(out: &mut W, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    write!(out, "{text}")?;
    out.reset()
}

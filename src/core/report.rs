// Scanner111 - core/report.rs
//
// Fragment-tree rendering and report file writing.
//
// Rendering is deterministic: the same fragment tree always produces the
// same bytes, so report files are snapshot-stable. Writing is atomic:
// content lands in a temp file in the destination directory, is fsynced,
// and is renamed over the final path.

use crate::core::fragment::{FragmentKind, ReportFragment};
use crate::util::constants;
use crate::util::error::ReportError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Render a report tree to Markdown.
///
/// Layout: the fixed root title, a blank line, then each child fragment in
/// `(priority, insertion order)` as a heading section. Nesting deepens the
/// heading level, clamped at `######`. Warning sections render as
/// `## ❌ CAUTION : <title>`; lines of success fragments carry a `✔️ `
/// prefix.
pub fn render(root: &ReportFragment) -> String {
    let mut out = String::new();
    out.push_str(constants::REPORT_ROOT_TITLE);
    out.push('\n');
    out.push('\n');

    if !root.lines.is_empty() {
        push_lines(&mut out, root);
    }

    for child in root.sorted_children() {
        render_fragment(&mut out, child, 2);
    }

    out
}

fn render_fragment(out: &mut String, fragment: &ReportFragment, level: usize) {
    let level = level.min(constants::MAX_HEADING_LEVEL);

    if !fragment.title.is_empty() {
        for _ in 0..level {
            out.push('#');
        }
        match fragment.kind {
            FragmentKind::Warning | FragmentKind::Error => {
                out.push_str(" ❌ CAUTION : ");
            }
            _ => out.push(' '),
        }
        out.push_str(&fragment.title);
        out.push('\n');
        out.push('\n');
    }

    if !fragment.lines.is_empty() {
        push_lines(out, fragment);
    }

    for child in fragment.sorted_children() {
        render_fragment(out, child, level + 1);
    }
}

fn push_lines(out: &mut String, fragment: &ReportFragment) {
    let prefix = match fragment.kind {
        FragmentKind::Success => "✔️ ",
        _ => "",
    };
    for line in &fragment.lines {
        if !prefix.is_empty() && !line.is_empty() {
            out.push_str(prefix);
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
}

// =============================================================================
// Report paths and atomic writing
// =============================================================================

/// Derive the report path for a crash log: the `.log`/`.txt` extension is
/// replaced by `-AUTOSCAN.md`, preserving the rest of the name's case.
pub fn autoscan_path(log_path: &Path) -> Result<PathBuf, ReportError> {
    let stem = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ReportError::InvalidDestination {
            path: log_path.to_path_buf(),
        })?;
    Ok(log_path.with_file_name(format!("{stem}{}", constants::REPORT_SUFFIX)))
}

/// Write rendered report text next to the source log, atomically.
///
/// The content is written to a temp file in the same directory, fsynced,
/// and renamed over the destination so readers never observe a torn file.
pub fn write_report(log_path: &Path, rendered: &str) -> Result<PathBuf, ReportError> {
    let dest = autoscan_path(log_path)?;
    let tmp = dest.with_extension("md.tmp");

    let io_err = |source| ReportError::Io {
        path: dest.clone(),
        source,
    };

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(rendered.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, &dest).map_err(io_err)?;

    tracing::debug!(report = %dest.display(), bytes = rendered.len(), "Report written");
    Ok(dest)
}

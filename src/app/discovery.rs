// Scanner111 - app/discovery.rs
//
// Crash-log enumeration. Non-recursive: only the scan directory itself is
// walked, and only files matching the crash-log filename patterns are
// admitted. Per-file I/O problems are collected as warnings, never fatal;
// only an invalid root fails discovery.

use crate::util::constants;
use crate::util::error::ScanError;
use std::path::{Path, PathBuf};

/// Enumerate crash logs under `root`.
///
/// Returns the admitted paths in sorted order (deterministic batch order)
/// plus non-fatal warnings for entries that could not be inspected.
pub fn discover_crash_logs(root: &Path) -> Result<(Vec<PathBuf>, Vec<String>), ScanError> {
    if !root.exists() {
        return Err(ScanError::RootNotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let patterns: Vec<glob::Pattern> = constants::CRASH_LOG_PATTERNS
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut files = Vec::new();
    let mut warnings = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .max_depth(1)
        .follow_links(false)
        .into_iter();

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::debug!(warning = %msg, "Discovery warning");
                warnings.push(msg);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            warnings.push(format!(
                "Skipping '{}': non-UTF-8 filename",
                entry.path().display()
            ));
            continue;
        };

        // Crash generators name their output crash-<timestamp>.log; the
        // match is case-insensitive so hand-renamed .TXT copies also scan.
        let lower = file_name.to_ascii_lowercase();
        if patterns.iter().any(|p| p.matches(&lower)) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();

    tracing::debug!(
        root = %root.display(),
        files = files.len(),
        warnings = warnings.len(),
        "Crash-log discovery complete"
    );

    Ok((files, warnings))
}

// Scanner111 - analysis/integrity.rs
//
// FCX-mode file integrity: hashes the game executable under the configured
// game root and compares it against the known-good digest for the game
// version reported by the crash log.
//
// Skipped silently when FCX mode is off or no game root is configured;
// the fragment stays empty and the orchestrator omits it.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::core::fragment::ReportFragment;
use crate::util::error::ScanError;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

pub struct FileIntegrityAnalyzer;

impl Analyzer for FileIntegrityAnalyzer {
    fn name(&self) -> &'static str {
        "integrity"
    }

    fn priority(&self) -> u32 {
        30
    }

    // Hashing a multi-gigabyte executable is disk-bound; keep it off the
    // same-priority fan-out path.
    fn parallel(&self) -> bool {
        false
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let mut fragment = ReportFragment::info("File Integrity", self.priority());

        if !ctx.options.fcx_mode {
            return Ok(ReportFragment::info("", self.priority()));
        }
        let Some(game_root) = ctx.game_root else {
            return Ok(ReportFragment::info("", self.priority()));
        };

        let exe_path = game_root.join(&ctx.game.executable);
        let game_version = &ctx.parsed.header.game_version;

        let Some(expected) = ctx.game.executable_hashes.get(game_version) else {
            fragment.push_line(format!(
                "No known-good hash for {} v{game_version}; integrity not checked.",
                ctx.game.executable
            ));
            return Ok(fragment);
        };

        let digest = match hash_file(&exe_path) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(
                    exe = %exe_path.display(),
                    error = %e,
                    "Cannot hash game executable"
                );
                let mut warn = ReportFragment::warning("File Integrity", self.priority());
                warn.push_line(format!(
                    "The game executable could not be read: {}.",
                    exe_path.display()
                ));
                return Ok(warn);
            }
        };

        if digest.eq_ignore_ascii_case(expected) {
            let mut ok = ReportFragment::success("File Integrity", self.priority());
            ok.push_line(format!(
                "{} matches the known-good hash for v{game_version}.",
                ctx.game.executable
            ));
            Ok(ok)
        } else {
            let mut warn = ReportFragment::warning("File Integrity", self.priority());
            warn.push_line(format!(
                "{} does not match the known-good hash for v{game_version}. \
                 The executable may be modified or corrupted.",
                ctx.game.executable
            ));
            Ok(warn)
        }
    }
}

/// SHA-256 of a file, streamed, as lower-case hex.
fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{fallout4_config, make_parsed};
    use crate::analysis::Artifacts;
    use crate::app::config::ScanOptions;
    use crate::core::fragment::FragmentKind;

    fn run(
        fcx: bool,
        game_root: Option<&Path>,
        hashes: &[(&str, &str)],
    ) -> ReportFragment {
        let mut game = fallout4_config();
        game.executable_hashes = hashes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let parsed = make_parsed(vec![]);
        let artifacts = Artifacts::derive(&parsed, &game);
        let options = ScanOptions {
            fcx_mode: fcx,
            ..ScanOptions::default()
        };
        let ctx = AnalyzerContext {
            parsed: &parsed,
            game: &game,
            options: &options,
            artifacts: &artifacts,
            formid_db: None,
            game_root,
        };
        FileIntegrityAnalyzer.analyze(&ctx).unwrap()
    }

    #[test]
    fn test_skipped_silently_without_game_root() {
        let fragment = run(true, None, &[]);
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_skipped_silently_outside_fcx_mode() {
        let dir = tempfile::tempdir().unwrap();
        let fragment = run(false, Some(dir.path()), &[]);
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_missing_executable_warns() {
        let dir = tempfile::tempdir().unwrap();
        let fragment = run(
            true,
            Some(dir.path()),
            &[("1.10.163.0", "0000000000000000")],
        );
        assert_eq!(fragment.kind, FragmentKind::Warning);
        assert!(fragment.lines[0].contains("could not be read"));
    }

    #[test]
    fn test_hash_match_and_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("Fallout4.exe");
        std::fs::write(&exe, b"game bytes").unwrap();
        let good = hash_file(&exe).unwrap();

        let fragment = run(true, Some(dir.path()), &[("1.10.163.0", good.as_str())]);
        assert_eq!(fragment.kind, FragmentKind::Success);

        let fragment = run(
            true,
            Some(dir.path()),
            &[("1.10.163.0", "deadbeefdeadbeef")],
        );
        assert_eq!(fragment.kind, FragmentKind::Warning);
        assert!(fragment.lines[0].contains("does not match"));
    }

    #[test]
    fn test_unknown_version_reports_unchecked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Fallout4.exe"), b"x").unwrap();
        let fragment = run(true, Some(dir.path()), &[]);
        assert_eq!(fragment.kind, FragmentKind::Info);
        assert!(fragment.lines[0].contains("No known-good hash"));
    }
}

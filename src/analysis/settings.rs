// Scanner111 - analysis/settings.rs
//
// Crash-generator settings validation: compares each recognised key from
// the SETTINGS segment against the game's expected value and suggests the
// fix in the generator's own configuration file.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::core::fragment::ReportFragment;
use crate::util::error::ScanError;

pub struct SettingsScanner;

impl Analyzer for SettingsScanner {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let observed = &ctx.artifacts.crashgen.raw;
        let config_file = &ctx.game.crashgen_config_file;

        let mut ok_lines: Vec<String> = Vec::new();
        let mut mismatch_lines: Vec<String> = Vec::new();

        // expected_settings is a BTreeMap, so the report order is the
        // stable alphabetical key order.
        for (key, expected) in &ctx.game.expected_settings {
            let Some(value) = observed.get(&key.to_ascii_lowercase()) else {
                continue;
            };
            if value.eq_ignore_ascii_case(expected) {
                ok_lines.push(format!("{key} is correctly set to {expected}."));
            } else {
                mismatch_lines.push(format!(
                    "{key} is set to {value}, expected {expected}. \
                     FIX: change {key} to {expected} in {config_file}."
                ));
            }
        }

        let mut fragment = if mismatch_lines.is_empty() {
            ReportFragment::success("Crash Generator Settings", self.priority())
        } else {
            ReportFragment::warning("Crash Generator Settings", self.priority())
        };

        if ok_lines.is_empty() && mismatch_lines.is_empty() {
            fragment.push_line("No recognised settings found in this log.");
            return Ok(fragment);
        }

        for line in mismatch_lines {
            fragment.push_line(line);
        }
        let inline_tick = fragment.kind == crate::core::fragment::FragmentKind::Warning;
        for line in ok_lines {
            if inline_tick {
                fragment.push_line(format!("✔️ {line}"));
            } else {
                fragment.push_line(line);
            }
        }

        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{fallout4_config, make_parsed};
    use crate::analysis::Artifacts;
    use crate::app::config::ScanOptions;
    use crate::core::fragment::FragmentKind;
    use crate::core::model::SegmentKind;

    fn run(parsed: &crate::core::model::ParsedLog) -> ReportFragment {
        let game = fallout4_config();
        let artifacts = Artifacts::derive(parsed, &game);
        let options = ScanOptions::default();
        let ctx = AnalyzerContext {
            parsed,
            game: &game,
            options: &options,
            artifacts: &artifacts,
            formid_db: None,
            game_root: None,
        };
        SettingsScanner.analyze(&ctx).unwrap()
    }

    #[test]
    fn test_mismatch_reports_fix_with_config_file() {
        let parsed = make_parsed(vec![(
            SegmentKind::Settings,
            vec!["\tArchiveLimit: true"],
        )]);
        let fragment = run(&parsed);
        assert_eq!(fragment.kind, FragmentKind::Warning);
        let line = fragment
            .lines
            .iter()
            .find(|l| l.contains("ArchiveLimit"))
            .expect("mismatch line present");
        assert!(line.contains("expected false"), "line: {line}");
        assert!(
            line.contains("FIX: change ArchiveLimit to false in Buffout4.toml"),
            "line: {line}"
        );
    }

    #[test]
    fn test_matching_settings_are_success() {
        let parsed = make_parsed(vec![(
            SegmentKind::Settings,
            vec!["\tArchiveLimit: false", "\tAchievements: true"],
        )]);
        let fragment = run(&parsed);
        assert_eq!(fragment.kind, FragmentKind::Success);
        assert!(fragment
            .lines
            .iter()
            .any(|l| l.contains("ArchiveLimit is correctly set")));
    }

    #[test]
    fn test_unrecognised_keys_ignored() {
        let parsed = make_parsed(vec![(
            SegmentKind::Settings,
            vec!["\tSomethingElse: 42"],
        )]);
        let fragment = run(&parsed);
        assert!(fragment
            .lines
            .iter()
            .any(|l| l.contains("No recognised settings")));
    }

    #[test]
    fn test_value_comparison_is_case_insensitive() {
        let parsed = make_parsed(vec![(
            SegmentKind::Settings,
            vec!["\tArchiveLimit: FALSE"],
        )]);
        let fragment = run(&parsed);
        assert_eq!(fragment.kind, FragmentKind::Success);
    }
}

// Scanner111 - analysis/version.rs
//
// Crash-generator version check against the latest-known version from
// configuration. VR variants compare against the VR release line.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::core::fragment::ReportFragment;
use crate::util::error::ScanError;
use std::cmp::Ordering;

pub struct CrashGenVersionAnalyzer;

impl Analyzer for CrashGenVersionAnalyzer {
    fn name(&self) -> &'static str {
        "crashgen-version"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let header = &ctx.parsed.header;
        let latest = ctx.game.latest_crashgen_for(header.game.is_vr());

        let mut fragment;
        if header.crashgen_version.is_empty() {
            fragment = ReportFragment::info("Crash Generator Version", self.priority());
            fragment.push_line("The crash generator version could not be determined.");
        } else if compare_versions(&header.crashgen_version, latest) == Ordering::Less {
            fragment = ReportFragment::warning("Crash Generator Version", self.priority());
            fragment.push_line(format!(
                "You are using {} v{}, the latest version is v{latest}. Update: {}",
                ctx.game.crashgen_name, header.crashgen_version, ctx.game.update_url
            ));
        } else {
            fragment = ReportFragment::success("Crash Generator Version", self.priority());
            fragment.push_line(format!(
                "You have the latest version of {}.",
                ctx.game.crashgen_name
            ));
        }

        Ok(fragment)
    }
}

/// Compare two dotted version strings numerically, component by component.
/// Missing components count as zero; a non-numeric component tail is
/// ignored ("2-beta" compares as 2).
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.trim_start_matches('v')
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    };
    let a = parse(a);
    let b = parse(b);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

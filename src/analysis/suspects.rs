// Scanner111 - analysis/suspects.rs
//
// Known-signature matching: literal error patterns against the header's
// main exception, and ordered stack patterns against the callstack.
//
// Stack matching is order-preserving: each element of a pattern's sequence
// must be found at or after the position where the previous element was
// found. A permuted callstack therefore does not match.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::app::config::StackPattern;
use crate::core::fragment::ReportFragment;
use crate::core::model::SegmentKind;
use crate::util::error::ScanError;

pub struct SuspectScanner;

impl Analyzer for SuspectScanner {
    fn name(&self) -> &'static str {
        "suspects"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let main_error = &ctx.parsed.header.main_error;

        let callstack_text = ctx
            .parsed
            .segment(SegmentKind::Callstack)
            .map(|s| s.lines.join("\n"))
            .unwrap_or_default();

        // Patterns are pre-sorted (descending severity, then label) at
        // configuration load, so collecting in iteration order gives the
        // required report ordering.
        let mut matched: Vec<(String, u8, String)> = Vec::new();

        if !main_error.is_empty() {
            for pattern in &ctx.game.error_patterns {
                if main_error.contains(&pattern.substring) {
                    matched.push((
                        pattern.label.clone(),
                        pattern.severity,
                        format!("main error contains \"{}\"", pattern.substring),
                    ));
                }
            }
        }

        if !callstack_text.is_empty() {
            for pattern in &ctx.game.stack_patterns {
                if stack_pattern_matches(pattern, &callstack_text) {
                    matched.push((
                        pattern.label.clone(),
                        pattern.severity,
                        format!("call stack sequence: {}", pattern.sequence.join(" -> ")),
                    ));
                }
            }
        }

        matched.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut fragment = if matched.is_empty() {
            let mut f = ReportFragment::info("Crash Suspects", self.priority());
            f.push_line("No known crash signature matched this log.");
            f
        } else {
            let labels: Vec<&str> = matched.iter().map(|(label, _, _)| label.as_str()).collect();
            let mut f = ReportFragment::warning(
                format!("Crash Suspects ({})", labels.join(", ")),
                self.priority(),
            );
            for (label, severity, detail) in &matched {
                f.push_line(format!("- {label} (severity {severity}): {detail}"));
            }
            f
        };

        if matched.is_empty() && main_error.is_empty() && callstack_text.is_empty() {
            fragment.push_line("The log carries no main error and no call stack to scan.");
        }

        Ok(fragment)
    }
}

/// Order-preserving multi-substring match: every element of the sequence is
/// searched from the position where the previous element was found, so the
/// match positions are non-decreasing.
fn stack_pattern_matches(pattern: &StackPattern, callstack: &str) -> bool {
    let mut from = 0usize;
    for needle in &pattern.sequence {
        match callstack[from..].find(needle.as_str()) {
            Some(offset) => from += offset,
            None => return false,
        }
    }
    true
}

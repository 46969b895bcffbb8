// Scanner111 - analysis/formids.rs
//
// FormID extraction from the callstack and optional resolution against the
// reference databases. Prefix FF is runtime-synthesised and never analysed.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::core::fragment::ReportFragment;
use crate::core::model::{FormIdRef, SegmentKind};
use crate::util::error::ScanError;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn formid_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*Form ID:\s*0x(?P<id>[0-9A-F]{8})")
            .expect("formid line pattern: invalid regex")
    })
}

pub struct FormIdAnalyzer;

impl Analyzer for FormIdAnalyzer {
    fn name(&self) -> &'static str {
        "formids"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let pattern = formid_line_pattern();

        // BTreeMap keys give the ascending-hex output ordering for free.
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        if let Some(callstack) = ctx.parsed.segment(SegmentKind::Callstack) {
            for line in &callstack.lines {
                if let Some(caps) = pattern.captures(line) {
                    *counts
                        .entry(caps["id"].to_ascii_uppercase())
                        .or_insert(0) += 1;
                }
            }
        }
        let refs: Vec<FormIdRef> = counts
            .into_iter()
            .map(|(id, count)| FormIdRef { id, count })
            .filter(|r| !r.is_synthetic())
            .collect();

        let mut fragment = ReportFragment::info("Form IDs", self.priority());

        if refs.is_empty() {
            fragment.push_line("No Form IDs found in the call stack.");
            return Ok(fragment);
        }

        let resolve = ctx.options.show_form_id_values
            && ctx.formid_db.map(|db| db.exists()).unwrap_or(false);

        for formid in &refs {
            let plugin = ctx
                .artifacts
                .plugin_by_prefix
                .get(formid.prefix())
                .map(String::as_str)
                .unwrap_or("Unknown");

            // Terse reports drop per-ID lines that only concern ignored
            // base-game plugins; counts of the remaining ids are unaffected.
            if ctx.options.simplify_logs && ctx.game.is_ignored_plugin(plugin) {
                continue;
            }

            let entry = if resolve && plugin != "Unknown" {
                ctx.formid_db
                    .and_then(|db| db.lookup(plugin, formid.suffix()))
            } else {
                None
            };

            match entry {
                Some(value) => fragment.push_line(format!(
                    "- Form ID: {} | [{plugin}] | {value} | {}",
                    formid.id, formid.count
                )),
                None => fragment.push_line(format!(
                    "- Form ID: {} | [{plugin}] | {}",
                    formid.id, formid.count
                )),
            }
        }

        if !ctx.options.simplify_logs {
            fragment.push_line(String::new());
            fragment.push_line(format!(
                "These Form IDs were caught by {} and may identify the records \
                 involved in the crash.",
                ctx.game.crashgen_name
            ));
        }

        Ok(fragment)
    }
}

// Scanner111 - analysis/plugins.rs
//
// Plugin analysis: cross-references the load-order list against the
// callstack. A plugin whose filename base appears in any callstack line is
// marked suspected; base-game plugins on the ignore list never are.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::core::fragment::ReportFragment;
use crate::core::model::SegmentKind;
use crate::util::error::ScanError;

pub struct PluginAnalyzer;

impl Analyzer for PluginAnalyzer {
    fn name(&self) -> &'static str {
        "plugins"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let plugins = &ctx.parsed.plugins;

        let callstack_lower: Vec<String> = ctx
            .parsed
            .segment(SegmentKind::Callstack)
            .map(|s| s.lines.iter().map(|l| l.to_ascii_lowercase()).collect())
            .unwrap_or_default();

        let mut suspected: Vec<(&str, &str)> = Vec::new();
        for plugin in plugins {
            if ctx.game.is_ignored_plugin(&plugin.name) {
                continue;
            }
            let base = plugin
                .name
                .rsplit_once('.')
                .map(|(stem, _ext)| stem)
                .unwrap_or(plugin.name.as_str());
            if base.is_empty() {
                continue;
            }
            let base_lower = base.to_ascii_lowercase();
            if callstack_lower
                .iter()
                .any(|line| line.contains(base_lower.as_str()))
            {
                suspected.push((plugin.index.as_str(), plugin.name.as_str()));
            }
        }

        let mut fragment = if suspected.is_empty() {
            ReportFragment::info("Plugins", self.priority())
        } else {
            ReportFragment::warning("Plugins", self.priority())
        };

        fragment.push_line(format!("Plugins loaded: {}", plugins.len()));
        if suspected.is_empty() {
            fragment.push_line("No loaded plugin appears in the call stack.");
        } else {
            fragment.push_line(format!(
                "Plugins referenced by the call stack: {}",
                suspected.len()
            ));
            for (index, name) in &suspected {
                fragment.push_line(format!("- [{index}] {name}"));
            }
        }

        Ok(fragment)
    }
}

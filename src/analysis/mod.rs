// Scanner111 - analysis/mod.rs
//
// The analyzer capability set and the shared per-log context.
//
// Each analyzer is an independent worker consuming the parsed log plus the
// read-only Artifacts record, producing one report fragment. Analyzers are
// deterministic: the same input yields a byte-identical fragment, which is
// what makes report snapshots stable and concurrency-level irrelevant to
// output.
//
// Cross-analyzer data is a typed, priority-stratified handoff: the
// orchestrator derives Artifacts once after parsing, and every analyzer
// reads it immutably. Nothing is written between analyzers at run time, so
// same-priority fan-out needs no locks.

pub mod formids;
pub mod integrity;
pub mod memory;
pub mod plugins;
pub mod settings;
pub mod suspects;
pub mod version;

use crate::app::config::{GameConfig, ScanOptions};
use crate::core::fragment::ReportFragment;
use crate::core::model::{ParsedLog, SegmentKind};
use crate::db::formid::FormIdDatabase;
use crate::util::error::ScanError;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Analyzer contract
// =============================================================================

/// One independent analysis worker.
pub trait Analyzer: Send + Sync {
    /// Stable identifier used in diagnostics and error fragments.
    fn name(&self) -> &'static str;

    /// Smaller runs earlier. Analyzers sharing a priority may run
    /// concurrently when both declare `parallel()`.
    fn priority(&self) -> u32;

    /// Whether this analyzer may run concurrently with others of the same
    /// priority level.
    fn parallel(&self) -> bool {
        true
    }

    /// Produce this analyzer's report fragment.
    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError>;
}

/// Outcome of one analyzer invocation, captured by the orchestrator.
#[derive(Debug, Clone)]
pub struct AnalyzerResult {
    pub analyzer: &'static str,
    pub success: bool,
    pub fragment: ReportFragment,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Read-only context shared by every analyzer of one log.
pub struct AnalyzerContext<'a> {
    pub parsed: &'a ParsedLog,
    pub game: &'a GameConfig,
    pub options: &'a ScanOptions,
    pub artifacts: &'a Artifacts,
    pub formid_db: Option<&'a FormIdDatabase>,
    pub game_root: Option<&'a Path>,
}

/// The default analyzer set, in registration order. New analyzers are
/// added by appending here; there is no runtime registration graph.
pub fn default_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(plugins::PluginAnalyzer),
        Box::new(formids::FormIdAnalyzer),
        Box::new(suspects::SuspectScanner),
        Box::new(version::CrashGenVersionAnalyzer),
        Box::new(integrity::FileIntegrityAnalyzer),
        Box::new(settings::SettingsScanner),
        Box::new(memory::MemoryManagementValidator),
    ]
}

// =============================================================================
// Typed cross-analyzer artifacts
// =============================================================================

/// Crash-generator switches parsed from the SETTINGS segment. `None` means
/// the setting did not appear in the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrashGenSettings {
    pub mem_manager: Option<bool>,
    pub havok_memory_system: Option<bool>,
    pub bs_texture_streamer_local_heap: Option<bool>,
    pub scaleform_allocator: Option<bool>,
    pub small_block_allocator: Option<bool>,

    /// Every key=value pair from the SETTINGS segment, keys lower-cased.
    pub raw: BTreeMap<String, String>,
}

/// Memory-manager replacement mods detected in the XSE MODULES segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModDetectionSettings {
    pub has_xcell: bool,
    pub has_old_xcell: bool,
    pub has_baka_scrap_heap: bool,
}

/// The per-log handoff record. Derived once by the orchestrator after
/// parsing; analyzers hold a shared reference.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    /// Load-order prefix (two upper-case hex chars) -> plugin filename.
    pub plugin_by_prefix: BTreeMap<String, String>,

    pub crashgen: CrashGenSettings,
    pub mods: ModDetectionSettings,
}

impl Artifacts {
    /// Derive the handoff record from a parsed log and the game's data set.
    pub fn derive(parsed: &ParsedLog, game: &GameConfig) -> Artifacts {
        let plugin_by_prefix = parsed
            .plugins
            .iter()
            .map(|p| (p.index.clone(), p.name.clone()))
            .collect();

        let raw = parsed
            .segment(SegmentKind::Settings)
            .map(parse_settings_lines)
            .unwrap_or_default();

        let flag = |key: &str| -> Option<bool> { raw.get(key).map(|v| is_truthy(v)) };
        let mem_manager = flag("memorymanager");
        let havok_memory_system = flag("havokmemorysystem");
        let bs_texture_streamer_local_heap = flag("bstexturestreamerlocalheap");
        let scaleform_allocator = flag("scaleformallocator");
        let small_block_allocator = flag("smallblockallocator");
        let crashgen = CrashGenSettings {
            mem_manager,
            havok_memory_system,
            bs_texture_streamer_local_heap,
            scaleform_allocator,
            small_block_allocator,
            raw,
        };

        let xse_lines: Vec<String> = parsed
            .segment(SegmentKind::XseModules)
            .map(|s| s.lines.iter().map(|l| l.to_ascii_lowercase()).collect())
            .unwrap_or_default();
        let module_present = |names: &[String]| -> bool {
            names
                .iter()
                .any(|name| xse_lines.iter().any(|line| line.contains(name.as_str())))
        };
        let mods = ModDetectionSettings {
            has_xcell: module_present(&game.xcell_modules),
            has_old_xcell: module_present(&game.old_xcell_modules),
            has_baka_scrap_heap: module_present(&game.baka_modules),
        };

        Artifacts {
            plugin_by_prefix,
            crashgen,
            mods,
        }
    }
}

/// Parse `key = value` / `key: value` lines out of a SETTINGS segment.
/// Section headers like `[Patches]` and non-pair lines are skipped.
/// Keys are lower-cased; values keep their spelling, trimmed.
pub fn parse_settings_lines(
    segment: &crate::core::model::LogSegment,
) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    for line in &segment.lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('[') || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=').or_else(|| trimmed.split_once(':'))
        else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        // First occurrence wins, matching segment duplicate handling.
        settings
            .entry(key)
            .or_insert_with(|| value.trim().to_string());
    }
    settings
}

/// Crash generators emit booleans in several spellings.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::model::{
        CrashHeader, Game, LogSegment, ParsedLog, PluginRecord, SegmentKind,
    };
    use std::collections::BTreeMap as Map;

    pub(crate) fn fallout4_config() -> GameConfig {
        crate::app::config::ConfigurationCache::load(None)
            .unwrap()
            .require_game(Game::Fallout4)
            .unwrap()
            .clone()
    }

    pub(crate) fn make_parsed(segments: Vec<(SegmentKind, Vec<&str>)>) -> ParsedLog {
        let mut map = Map::new();
        for (kind, lines) in segments {
            map.insert(
                kind,
                LogSegment {
                    lines: lines.into_iter().map(String::from).collect(),
                },
            );
        }
        let plugins = map
            .get(&SegmentKind::Plugins)
            .map(crate::core::segments::extract_plugins)
            .unwrap_or_default();
        ParsedLog {
            path: std::path::PathBuf::from("crash-test.log"),
            header: CrashHeader {
                game: Game::Fallout4,
                game_version: "1.10.163.0".to_string(),
                crashgen_name: "Buffout 4".to_string(),
                crashgen_version: "1.26.2".to_string(),
                main_error: "EXCEPTION_ACCESS_VIOLATION".to_string(),
                timestamp: None,
            },
            segments: map,
            plugins,
        }
    }

    #[test]
    fn test_parse_settings_lines_both_separators() {
        let segment = LogSegment {
            lines: vec![
                "[Patches]".to_string(),
                "\tMemoryManager: true".to_string(),
                "\tArchiveLimit = false".to_string(),
                "not a pair".to_string(),
            ],
        };
        let settings = parse_settings_lines(&segment);
        assert_eq!(settings.get("memorymanager").map(String::as_str), Some("true"));
        assert_eq!(settings.get("archivelimit").map(String::as_str), Some("false"));
        assert_eq!(settings.len(), 2);
    }

    #[test]
    fn test_artifacts_derive_crashgen_flags() {
        let parsed = make_parsed(vec![(
            SegmentKind::Settings,
            vec!["\tMemoryManager: true", "\tScaleformAllocator: false"],
        )]);
        let artifacts = Artifacts::derive(&parsed, &fallout4_config());
        assert_eq!(artifacts.crashgen.mem_manager, Some(true));
        assert_eq!(artifacts.crashgen.scaleform_allocator, Some(false));
        assert_eq!(artifacts.crashgen.havok_memory_system, None);
    }

    #[test]
    fn test_artifacts_derive_mod_detection() {
        let parsed = make_parsed(vec![(
            SegmentKind::XseModules,
            vec!["\tx-cell-fo4.dll v1.0", "\tBakaScrapHeap.dll v2.0"],
        )]);
        let artifacts = Artifacts::derive(&parsed, &fallout4_config());
        assert!(artifacts.mods.has_xcell);
        assert!(artifacts.mods.has_old_xcell);
        assert!(artifacts.mods.has_baka_scrap_heap);
    }

    #[test]
    fn test_artifacts_plugin_map_from_parser_records() {
        let parsed = {
            let mut p = make_parsed(vec![]);
            p.plugins = vec![
                PluginRecord {
                    name: "Fallout4.esm".to_string(),
                    index: "00".to_string(),
                },
                PluginRecord {
                    name: "Mod.esp".to_string(),
                    index: "0A".to_string(),
                },
            ];
            p
        };
        let artifacts = Artifacts::derive(&parsed, &fallout4_config());
        assert_eq!(
            artifacts.plugin_by_prefix.get("0A").map(String::as_str),
            Some("Mod.esp")
        );
    }

    #[test]
    fn test_is_truthy_spellings() {
        assert!(is_truthy("true"));
        assert!(is_truthy(" TRUE "));
        assert!(is_truthy("1"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }
}

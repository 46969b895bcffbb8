// Scanner111 - analysis/memory.rs
//
// Memory-manager configuration validation. Buffout's built-in memory
// manager, X-Cell, and Baka ScrapHeap are mutually exclusive; this
// analyzer applies the fixed decision table over the crash-generator
// switches and the detected replacement mods.
//
// Output ordering is stable: the general verdict first, then (when X-Cell
// is present) the four allocator lines in a fixed order, then the outdated
// X-Cell warning.

use crate::analysis::{Analyzer, AnalyzerContext};
use crate::core::fragment::ReportFragment;
use crate::util::error::ScanError;

pub struct MemoryManagementValidator;

impl Analyzer for MemoryManagementValidator {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> Result<ReportFragment, ScanError> {
        let crashgen = &ctx.artifacts.crashgen;
        let mods = &ctx.artifacts.mods;
        let config_file = &ctx.game.crashgen_config_file;

        let mem = crashgen.mem_manager.unwrap_or(false);
        let xcell = mods.has_xcell;
        let baka = mods.has_baka_scrap_heap;

        let mut conflicts = 0usize;
        let mut lines: Vec<String> = Vec::new();

        // General verdict.
        match (mem, xcell, baka) {
            (true, true, _) => {
                conflicts += 1;
                lines.push(format!(
                    "X-Cell is installed and conflicts with Buffout's Memory Manager. \
                     FIX: change MemoryManager to FALSE in {config_file}."
                ));
            }
            (true, false, true) => {
                conflicts += 1;
                lines.push(
                    "Baka ScrapHeap is installed and conflicts with Buffout's Memory \
                     Manager. FIX: remove Baka ScrapHeap, the Memory Manager replaces it."
                        .to_string(),
                );
            }
            (true, false, false) => {
                lines.push(
                    "Memory Manager is enabled and no conflicting memory mods are present."
                        .to_string(),
                );
            }
            (false, true, true) => {
                conflicts += 1;
                lines.push(
                    "Baka ScrapHeap is installed and conflicts with X-Cell. \
                     FIX: remove Baka ScrapHeap."
                        .to_string(),
                );
            }
            (false, true, false) => {
                lines.push("Memory management is correctly delegated to X-Cell.".to_string());
            }
            (false, false, true) => {
                conflicts += 1;
                lines.push(format!(
                    "Baka ScrapHeap is obsolete. FIX: remove Baka ScrapHeap and change \
                     MemoryManager to TRUE in {config_file}."
                ));
            }
            (false, false, false) => {
                lines.push(
                    "Memory Manager is disabled and no replacement mods are detected."
                        .to_string(),
                );
            }
        }

        // Per-allocator switches must all be off when X-Cell is present,
        // in this fixed order.
        if xcell {
            let allocators: [(&str, Option<bool>); 4] = [
                ("HavokMemorySystem", crashgen.havok_memory_system),
                (
                    "BSTextureStreamerLocalHeap",
                    crashgen.bs_texture_streamer_local_heap,
                ),
                ("ScaleformAllocator", crashgen.scaleform_allocator),
                ("SmallBlockAllocator", crashgen.small_block_allocator),
            ];
            for (name, value) in allocators {
                if value.unwrap_or(false) {
                    conflicts += 1;
                    lines.push(format!(
                        "{name} conflicts with X-Cell. FIX: change {name} to FALSE \
                         in {config_file}."
                    ));
                } else {
                    lines.push(format!("{name} is correctly disabled for X-Cell."));
                }
            }
        }

        if mods.has_old_xcell {
            conflicts += 1;
            lines.push(format!(
                "An outdated version of X-Cell is installed. Update it: {}",
                ctx.game.xcell_update_url
            ));
        }

        let kind = if conflicts > 0 {
            crate::core::fragment::FragmentKind::Warning
        } else {
            crate::core::fragment::FragmentKind::Success
        };
        let mut fragment = ReportFragment::new("Memory Management", kind, self.priority());
        fragment.lines = lines;
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{fallout4_config, make_parsed};
    use crate::analysis::{Artifacts, CrashGenSettings, ModDetectionSettings};
    use crate::app::config::ScanOptions;
    use crate::core::fragment::FragmentKind;

    fn run(crashgen: CrashGenSettings, mods: ModDetectionSettings) -> ReportFragment {
        let game = fallout4_config();
        let parsed = make_parsed(vec![]);
        let artifacts = Artifacts {
            plugin_by_prefix: Default::default(),
            crashgen,
            mods,
        };
        let options = ScanOptions::default();
        let ctx = AnalyzerContext {
            parsed: &parsed,
            game: &game,
            options: &options,
            artifacts: &artifacts,
            formid_db: None,
            game_root: None,
        };
        MemoryManagementValidator.analyze(&ctx).unwrap()
    }

    fn crashgen(mem: bool) -> CrashGenSettings {
        CrashGenSettings {
            mem_manager: Some(mem),
            ..CrashGenSettings::default()
        }
    }

    fn mods(xcell: bool, old: bool, baka: bool) -> ModDetectionSettings {
        ModDetectionSettings {
            has_xcell: xcell,
            has_old_xcell: old,
            has_baka_scrap_heap: baka,
        }
    }

    #[test]
    fn test_memmgr_with_xcell_is_conflict() {
        let fragment = run(crashgen(true), mods(true, false, false));
        assert_eq!(fragment.kind, FragmentKind::Warning);
        assert!(
            fragment.lines[0].contains("change MemoryManager to FALSE"),
            "verdict must carry the fix: {:?}",
            fragment.lines[0]
        );
    }

    #[test]
    fn test_memmgr_with_baka_is_conflict() {
        let fragment = run(crashgen(true), mods(false, false, true));
        assert_eq!(fragment.kind, FragmentKind::Warning);
        assert!(fragment.lines[0].contains("remove Baka ScrapHeap"));
    }

    #[test]
    fn test_memmgr_alone_is_ok() {
        let fragment = run(crashgen(true), mods(false, false, false));
        assert_eq!(fragment.kind, FragmentKind::Success);
    }

    #[test]
    fn test_xcell_with_baka_is_conflict() {
        let fragment = run(crashgen(false), mods(true, false, true));
        assert_eq!(fragment.kind, FragmentKind::Warning);
        assert!(fragment.lines[0].contains("conflicts with X-Cell"));
    }

    #[test]
    fn test_xcell_alone_is_ok() {
        let fragment = run(crashgen(false), mods(true, false, false));
        assert_eq!(fragment.kind, FragmentKind::Success);
        assert!(fragment.lines[0].contains("X-Cell"));
    }

    #[test]
    fn test_baka_alone_warns_to_enable_memmgr() {
        let fragment = run(crashgen(false), mods(false, false, true));
        assert_eq!(fragment.kind, FragmentKind::Warning);
        assert!(fragment.lines[0].contains("change MemoryManager to TRUE"));
    }

    #[test]
    fn test_allocator_lines_in_fixed_order_when_xcell() {
        let cg = CrashGenSettings {
            mem_manager: Some(false),
            havok_memory_system: Some(true),
            bs_texture_streamer_local_heap: Some(false),
            scaleform_allocator: Some(true),
            small_block_allocator: None,
            raw: Default::default(),
        };
        let fragment = run(cg, mods(true, false, false));
        let allocator_lines: Vec<&String> = fragment.lines[1..].iter().collect();
        assert!(allocator_lines[0].starts_with("HavokMemorySystem conflicts"));
        assert!(allocator_lines[1].starts_with("BSTextureStreamerLocalHeap is correctly"));
        assert!(allocator_lines[2].starts_with("ScaleformAllocator conflicts"));
        assert!(allocator_lines[3].starts_with("SmallBlockAllocator is correctly"));
        assert_eq!(fragment.kind, FragmentKind::Warning);
    }

    #[test]
    fn test_old_xcell_always_warns_with_update_link() {
        let fragment = run(crashgen(false), mods(true, true, false));
        assert_eq!(fragment.kind, FragmentKind::Warning);
        let last = fragment.lines.last().unwrap();
        assert!(last.contains("outdated version of X-Cell"));
        assert!(last.contains("nexusmods.com"));
    }
}

// Scanner111 - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no CLI,
// no platform dependencies.
//
// These types are the shared vocabulary across parsing, analysis,
// reporting, and batch execution.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Game identity
// =============================================================================

/// The Bethesda games whose crash logs are recognised.
///
/// Skyrim variants are parsed so their logs can be classified, but they are
/// only analysable when the `skyrim` cargo feature is enabled; their
/// supported-combination entries are disabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Game {
    Fallout4,
    Fallout4Vr,
    SkyrimSe,
    SkyrimVr,
}

impl Game {
    /// Resolve the game from the name captured on the log's first line.
    pub fn from_header_name(name: &str) -> Option<Game> {
        match name.to_ascii_lowercase().as_str() {
            "fallout 4" => Some(Game::Fallout4),
            "fallout4vr" => Some(Game::Fallout4Vr),
            "skyrim se" | "skyrim special edition" => Some(Game::SkyrimSe),
            "skyrimvr" => Some(Game::SkyrimVr),
            _ => None,
        }
    }

    /// Resolve the game from its stable configuration key.
    pub fn from_key(key: &str) -> Option<Game> {
        match key {
            "Fallout4" => Some(Game::Fallout4),
            "Fallout4VR" => Some(Game::Fallout4Vr),
            "SkyrimSE" => Some(Game::SkyrimSe),
            "SkyrimVR" => Some(Game::SkyrimVr),
            _ => None,
        }
    }

    /// Stable key used for configuration lookup and file naming.
    pub fn key(&self) -> &'static str {
        match self {
            Game::Fallout4 => "Fallout4",
            Game::Fallout4Vr => "Fallout4VR",
            Game::SkyrimSe => "SkyrimSE",
            Game::SkyrimVr => "SkyrimVR",
        }
    }

    /// Human-readable name for display.
    pub fn label(&self) -> &'static str {
        match self {
            Game::Fallout4 => "Fallout 4",
            Game::Fallout4Vr => "Fallout 4 VR",
            Game::SkyrimSe => "Skyrim Special Edition",
            Game::SkyrimVr => "Skyrim VR",
        }
    }

    /// Whether this is a VR variant (selects the VR crash-gen version line).
    pub fn is_vr(&self) -> bool {
        matches!(self, Game::Fallout4Vr | Game::SkyrimVr)
    }

    /// Whether this game is enabled in the supported-combination table.
    pub fn is_supported(&self) -> bool {
        match self {
            Game::Fallout4 | Game::Fallout4Vr => true,
            Game::SkyrimSe | Game::SkyrimVr => cfg!(feature = "skyrim"),
        }
    }

    /// Whether `crashgen_name` is a crash generator this game's logs can
    /// come from. An empty name (header without a generator line) is
    /// admitted; partial headers are analysed best-effort.
    pub fn accepts_crashgen(&self, crashgen_name: &str) -> bool {
        if crashgen_name.is_empty() {
            return true;
        }
        match self {
            Game::Fallout4 | Game::Fallout4Vr => crashgen_name == "Buffout 4",
            Game::SkyrimSe | Game::SkyrimVr => crashgen_name.starts_with("Crash Logger"),
        }
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Crash header
// =============================================================================

/// Fields extracted from the first ~2 KB of a crash log.
///
/// Produced once per log and immutable afterwards. `crashgen_version` and
/// `main_error` are empty strings when their lines are absent; the header
/// as a whole is absent only when no game-version line matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashHeader {
    /// The game that produced the log.
    pub game: Game,

    /// Game version, e.g. "1.10.163.0".
    pub game_version: String,

    /// Crash generator name, e.g. "Buffout 4". Empty if not found.
    pub crashgen_name: String,

    /// Crash generator version, e.g. "1.26.2". Empty if not found.
    pub crashgen_version: String,

    /// The quoted exception token from the "Unhandled exception" line,
    /// e.g. "EXCEPTION_ACCESS_VIOLATION". Empty if not found.
    pub main_error: String,

    /// Local time the log was generated. None when the line is absent or
    /// its fields are out of range.
    pub timestamp: Option<NaiveDateTime>,
}

// =============================================================================
// Segments
// =============================================================================

/// The named regions a crash log body is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentKind {
    SystemSpecs,
    Settings,
    Modules,
    XseModules,
    Plugins,
    Callstack,
    Registers,
    Stack,
}

impl SegmentKind {
    /// All known kinds, in marker order.
    pub fn all() -> &'static [SegmentKind] {
        &[
            SegmentKind::SystemSpecs,
            SegmentKind::Settings,
            SegmentKind::Modules,
            SegmentKind::XseModules,
            SegmentKind::Plugins,
            SegmentKind::Callstack,
            SegmentKind::Registers,
            SegmentKind::Stack,
        ]
    }

    /// The literal marker token that opens this segment in the log.
    pub fn marker(&self) -> &'static str {
        match self {
            SegmentKind::SystemSpecs => "SYSTEM SPECS:",
            SegmentKind::Settings => "SETTINGS:",
            SegmentKind::Modules => "MODULES:",
            SegmentKind::XseModules => "XSE MODULES:",
            SegmentKind::Plugins => "PLUGINS:",
            SegmentKind::Callstack => "CALLSTACK:",
            SegmentKind::Registers => "REGISTERS:",
            SegmentKind::Stack => "STACK:",
        }
    }

    /// Match a trimmed line against the known markers.
    ///
    /// `MODULES:` is tested after `XSE MODULES:` so the longer marker wins;
    /// the match requires the whole trimmed line to be the marker token.
    pub fn from_marker_line(line: &str) -> Option<SegmentKind> {
        let trimmed = line.trim();
        // XSE MODULES: would also end-match MODULES:, so exact equality on
        // the trimmed line keeps the two distinct.
        Self::all()
            .iter()
            .copied()
            .find(|kind| trimmed == kind.marker())
    }

    /// Human-readable name for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            SegmentKind::SystemSpecs => "System Specs",
            SegmentKind::Settings => "Settings",
            SegmentKind::Modules => "Modules",
            SegmentKind::XseModules => "XSE Modules",
            SegmentKind::Plugins => "Plugins",
            SegmentKind::Callstack => "Call Stack",
            SegmentKind::Registers => "Registers",
            SegmentKind::Stack => "Stack",
        }
    }
}

/// A contiguous named region of a crash log. Leading whitespace on each
/// line is preserved; the marker line itself is not included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSegment {
    pub lines: Vec<String>,
}

// =============================================================================
// Plugins
// =============================================================================

/// One entry of the PLUGINS segment: a plugin filename and its two-hex-char
/// load-order prefix. Populated by the parser, read by analyzers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRecord {
    /// Plugin filename, e.g. "SomeMod.esp".
    pub name: String,

    /// Load-order index: exactly two upper-case hex characters.
    pub index: String,
}

// =============================================================================
// Parsed log
// =============================================================================

/// A fully parsed crash log: header, segment map, and plugin records.
/// Shared read-only with all analyzers of one log.
#[derive(Debug, Clone)]
pub struct ParsedLog {
    /// Source file path.
    pub path: PathBuf,

    /// The parsed header.
    pub header: CrashHeader,

    /// Named segments in deterministic (marker-order) iteration order.
    /// Duplicated markers keep their first occurrence.
    pub segments: BTreeMap<SegmentKind, LogSegment>,

    /// Plugin records extracted from the PLUGINS segment.
    pub plugins: Vec<PluginRecord>,
}

impl ParsedLog {
    pub fn segment(&self, kind: SegmentKind) -> Option<&LogSegment> {
        self.segments.get(&kind)
    }
}

// =============================================================================
// FormID references
// =============================================================================

/// An 8-hex-digit FormID extracted from the callstack, with its occurrence
/// count. The first two hex characters select the plugin by load-order
/// prefix; prefix FF is runtime-synthesised and excluded from analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormIdRef {
    /// Normalised upper-case 8-hex-digit id.
    pub id: String,

    /// Number of times the id appeared in the callstack.
    pub count: usize,
}

impl FormIdRef {
    /// The two-hex-char plugin prefix.
    pub fn prefix(&self) -> &str {
        &self.id[..2]
    }

    /// The six-hex-char record suffix.
    pub fn suffix(&self) -> &str {
        &self.id[2..]
    }

    /// Runtime-synthesised ids carry prefix FF and never resolve to a plugin.
    pub fn is_synthetic(&self) -> bool {
        self.prefix() == "FF"
    }
}

// =============================================================================
// Per-log result
// =============================================================================

/// Outcome of analysing a single crash log.
#[derive(Debug, Clone)]
pub struct LogAnalysisResult {
    /// Source log path.
    pub path: PathBuf,

    /// False when the log was empty, had no recognisable header, or named
    /// an unsupported game/crash-generator combination.
    pub parsed: bool,

    /// Non-fatal observations accumulated while analysing.
    pub warnings: Vec<String>,

    /// The composed report tree, ready for rendering.
    pub report: crate::core::fragment::ReportFragment,
}

// =============================================================================
// Batch statistics
// =============================================================================

/// Counters accumulated by the executor over one batch.
///
/// Invariant: `scanned = completed + incomplete`; `failed` logs are counted
/// separately and never appear in `scanned`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    /// Logs that were read and produced a report (complete or not).
    pub scanned: usize,

    /// Subset of `scanned` whose report is invalid-or-incomplete.
    pub incomplete: usize,

    /// Logs whose orchestration raised (read failure, timeout).
    pub failed: usize,
}

impl ScanStatistics {
    /// Logs that parsed fully: `scanned - incomplete`.
    pub fn completed(&self) -> usize {
        self.scanned - self.incomplete
    }
}

/// Sealed result of one batch scan.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub statistics: ScanStatistics,

    /// Paths whose orchestration raised, with the failure reason.
    pub failed_logs: Vec<(PathBuf, String)>,

    /// Every path admitted to the batch, in discovery order.
    pub processed: Vec<PathBuf>,

    /// Wall-clock duration of the whole batch.
    pub duration: Duration,

    /// True when the batch terminated due to external cancellation.
    pub cancelled: bool,
}

// =============================================================================
// Progress reporting
// =============================================================================

/// Progress events delivered to the caller-supplied callback.
/// At most one `LogCompleted` is emitted per admitted log.
#[derive(Debug, Clone)]
pub enum ScanProgress {
    /// Discovery finished; the batch is about to start.
    Started { total_logs: usize },

    /// One log finished (report written, or failed).
    LogCompleted {
        path: PathBuf,
        parsed: bool,
        completed: usize,
        total: usize,
    },

    /// Cancellation was observed; no further logs will be admitted.
    Cancelled,
}

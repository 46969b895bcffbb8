// Scanner111 - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "Scanner111";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "Scanner111";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parsing limits
// =============================================================================

/// Number of leading bytes consulted by the crash-header parser.
///
/// Crash generators write the game line, the generator line, the main
/// exception, and the timestamp within the first few hundred bytes. A
/// `Buffout 4 v...` line beyond this window is deliberately not recognised;
/// scanning arbitrarily deep would make header detection O(file size).
pub const HEADER_SCAN_BYTES: usize = 2000;

/// File size in bytes below which a crash log is read fully into memory.
/// Larger files are streamed through the segment splitter line by line.
pub const FULL_BUFFER_LIMIT: u64 = 10 * 1024 * 1024; // 10 MB

/// Maximum length in bytes of a single line retained in a segment. Longer
/// lines are truncated so a malformed log cannot grow a segment without bound.
pub const MAX_SEGMENT_LINE_LEN: usize = 64 * 1024; // 64 KB

// =============================================================================
// Batch execution limits
// =============================================================================

/// Default number of logs analysed concurrently.
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

/// Minimum configurable concurrency.
pub const MIN_MAX_CONCURRENT: usize = 1;

/// Maximum configurable concurrency.
pub const MAX_MAX_CONCURRENT: usize = 100;

/// Default per-log wall-clock deadline in seconds. A log that exceeds its
/// deadline is recorded as failed with reason "timeout" and gets no report.
pub const DEFAULT_LOG_TIMEOUT_SECS: u64 = 300;

/// Upper bound on the FormID database connection pool. The effective pool
/// size is min(max_concurrent, this).
pub const DB_POOL_CAP: usize = 8;

// =============================================================================
// File discovery patterns
// =============================================================================

/// Filename globs a file must match to be admitted to a batch scan.
/// Matching is non-recursive: only the scan directory itself is enumerated.
pub const CRASH_LOG_PATTERNS: &[&str] = &["crash-*.log", "crash-*.txt"];

/// Sibling directory that unsolved (invalid-or-incomplete) logs are moved
/// into when the move-unsolved option is set.
pub const UNSOLVED_DIR_NAME: &str = "Unsolved";

// =============================================================================
// Reporting
// =============================================================================

/// Suffix replacing the crash log's extension to form the report path.
pub const REPORT_SUFFIX: &str = "-AUTOSCAN.md";

/// Title line of every report.
pub const REPORT_ROOT_TITLE: &str = "# Crash Log Analysis";

/// Literal text emitted for logs that are empty or have no recognisable
/// crash header. Downstream tooling matches on this string.
pub const INVALID_LOG_TEXT: &str = "Invalid or incomplete";

/// Maximum fragment nesting depth. Children attached deeper than this are
/// flattened into the parent's lines during construction.
pub const MAX_FRAGMENT_DEPTH: usize = 6;

/// Deepest Markdown heading level; nesting beyond this collapses to it.
pub const MAX_HEADING_LEVEL: usize = 6;

// =============================================================================
// Configuration
// =============================================================================

/// Options file name inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Key under `custom_paths` that points at the game installation root.
/// The file-integrity analyzer is skipped when the key is absent.
pub const GAME_ROOT_PATH_KEY: &str = "game_root";

// =============================================================================
// Logging
// =============================================================================

/// Default log level when neither RUST_LOG nor --debug is given.
pub const DEFAULT_LOG_LEVEL: &str = "info";

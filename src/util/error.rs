// Scanner111 - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Errors are handled at the smallest scope that can still produce a
// sensible user-facing artifact: a bad log becomes an invalid-or-incomplete
// report, a failed analyzer becomes an error fragment, and only fatal
// configuration problems cross the executor boundary.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all Scanner111 operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum ScannerError {
    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// FormID database access failed.
    Database(DatabaseError),

    /// Report rendering or writing failed.
    Report(ReportError),

    /// Batch or per-log scan execution failed.
    Scan(ScanError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Database(e) => write!(f, "FormID database error: {e}"),
            Self::Report(e) => write!(f, "Report error: {e}"),
            Self::Scan(e) => write!(f, "Scan error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ScannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Database(e) => Some(e),
            Self::Report(e) => Some(e),
            Self::Scan(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// An embedded built-in configuration document is malformed.
    BuiltinParse {
        name: &'static str,
        source: toml::de::Error,
    },

    /// No configuration set exists for the detected or selected game.
    GameNotConfigured { game: String },

    /// Two suspect patterns in the same set share a label.
    DuplicateLabel { game: String, label: String },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading a config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::BuiltinParse { name, source } => {
                write!(f, "Built-in configuration '{name}' is malformed: {source}")
            }
            Self::GameNotConfigured { game } => {
                write!(f, "No configuration set found for game '{game}'")
            }
            Self::DuplicateLabel { game, label } => {
                write!(f, "Game '{game}': duplicate suspect pattern label '{label}'")
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::BuiltinParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ScannerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// FormID database errors
// ---------------------------------------------------------------------------

/// Errors related to FormID database access.
///
/// Lookup failures never surface to callers as `Err`: the lookup degrades to
/// a miss and logs a warning. These variants exist for pool construction and
/// for diagnostics inside the db module.
#[derive(Debug)]
pub enum DatabaseError {
    /// Opening a database file failed.
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// A query failed.
    Query {
        table: String,
        source: rusqlite::Error,
    },
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open '{}': {source}", path.display())
            }
            Self::Query { table, source } => {
                write!(f, "Query against table '{table}' failed: {source}")
            }
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Query { source, .. } => Some(source),
        }
    }
}

impl From<DatabaseError> for ScannerError {
    fn from(e: DatabaseError) -> Self {
        Self::Database(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Errors related to report rendering and writing.
#[derive(Debug)]
pub enum ReportError {
    /// I/O error writing the report file.
    Io { path: PathBuf, source: io::Error },

    /// The destination path has no filename to derive a report name from.
    InvalidDestination { path: PathBuf },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Report I/O error '{}': {source}", path.display())
            }
            Self::InvalidDestination { path } => {
                write!(
                    f,
                    "Cannot derive report path from '{}': no filename",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ReportError> for ScannerError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

// ---------------------------------------------------------------------------
// Scan errors
// ---------------------------------------------------------------------------

/// Errors related to batch and per-log scan execution.
#[derive(Debug)]
pub enum ScanError {
    /// The scan path does not exist or is not accessible.
    RootNotFound { path: PathBuf },

    /// The scan path is not a directory.
    NotADirectory { path: PathBuf },

    /// A crash log could not be read.
    LogRead { path: PathBuf, source: io::Error },

    /// A single analyzer failed. Converted to an error fragment by the
    /// orchestrator; never crosses the executor boundary.
    Analyzer {
        analyzer: &'static str,
        reason: String,
    },

    /// The per-log wall-clock deadline was exceeded.
    Timeout { path: PathBuf },

    /// Cancellation was observed before the log completed.
    Cancelled,

    /// The worker pool could not be constructed.
    ThreadPool { reason: String },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Scan path '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Scan path '{}' is not a directory", path.display())
            }
            Self::LogRead { path, source } => {
                write!(f, "Cannot read '{}': {source}", path.display())
            }
            Self::Analyzer { analyzer, reason } => {
                write!(f, "Analyzer '{analyzer}' failed: {reason}")
            }
            Self::Timeout { path } => {
                write!(f, "Analysis of '{}' timed out", path.display())
            }
            Self::Cancelled => write!(f, "Scan cancelled"),
            Self::ThreadPool { reason } => {
                write!(f, "Cannot build the scan worker pool: {reason}")
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::LogRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ScanError> for ScannerError {
    fn from(e: ScanError) -> Self {
        Self::Scan(e)
    }
}

/// Convenience type alias for Scanner111 results.
pub type Result<T> = std::result::Result<T, ScannerError>;

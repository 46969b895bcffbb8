// Scanner111 - app/orchestrator.rs
//
// Per-log pipeline: read the file, parse header and segments, derive the
// typed artifact record, fan out the analyzers in priority order, and
// compose their fragments into one report tree.
//
// Analyzers sharing a priority level run concurrently when they declare
// parallel eligibility; levels themselves are strictly sequential. Output
// composition follows (priority, registration order) regardless of
// physical completion order, so the report bytes never depend on timing.
//
// Cancellation and the per-log deadline are polled at the suspension
// points: before the file read and between priority levels.

use crate::analysis::{Analyzer, AnalyzerContext, AnalyzerResult, Artifacts};
use crate::app::config::ConfigurationCache;
use crate::core::fragment::ReportFragment;
use crate::core::header::parse_header;
use crate::core::model::{LogAnalysisResult, ParsedLog, SegmentKind};
use crate::core::segments::{extract_plugins, split_segments};
use crate::db::formid::FormIdDatabase;
use crate::util::constants;
use crate::util::error::{Result, ScanError, ScannerError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Runs the full analysis pipeline for single crash logs.
pub struct LogOrchestrator<'a> {
    config: &'a ConfigurationCache,
    analyzers: &'a [Box<dyn Analyzer>],
    formid_db: Option<&'a FormIdDatabase>,
    cancel: &'a AtomicBool,
    timeout: Duration,
}

impl<'a> LogOrchestrator<'a> {
    pub fn new(
        config: &'a ConfigurationCache,
        analyzers: &'a [Box<dyn Analyzer>],
        formid_db: Option<&'a FormIdDatabase>,
        cancel: &'a AtomicBool,
    ) -> Self {
        let timeout = Duration::from_secs(config.options().log_timeout_secs);
        Self {
            config,
            analyzers,
            formid_db,
            cancel,
            timeout,
        }
    }

    /// Analyse one crash log. Unreadable content and unrecognisable headers
    /// yield an invalid-or-incomplete result (`parsed = false`), not an
    /// error; `Err` is reserved for read failures, timeout, cancellation,
    /// and missing game configuration.
    pub fn analyze(&self, log_path: &Path) -> Result<LogAnalysisResult> {
        let deadline = Instant::now() + self.timeout;
        self.check_interrupted(log_path, deadline)?;

        let metadata = fs::metadata(log_path).map_err(|e| ScanError::LogRead {
            path: log_path.to_path_buf(),
            source: e,
        })?;

        if metadata.len() == 0 {
            tracing::info!(log = %log_path.display(), "Empty crash log");
            return Ok(invalid_result(log_path, "the file is empty"));
        }

        let (header, segments) = self.read_and_split(log_path, metadata.len())?;
        self.check_interrupted(log_path, deadline)?;

        let Some(header) = header else {
            tracing::info!(log = %log_path.display(), "No recognisable crash header");
            return Ok(invalid_result(
                log_path,
                "no recognisable crash-log header was found",
            ));
        };

        if !header.game.is_supported() || !header.game.accepts_crashgen(&header.crashgen_name)
        {
            tracing::info!(
                log = %log_path.display(),
                game = header.game.key(),
                crashgen = %header.crashgen_name,
                "Unsupported game/crash-generator combination"
            );
            return Ok(invalid_result(
                log_path,
                &format!(
                    "the {} / {} combination is not supported",
                    header.game,
                    if header.crashgen_name.is_empty() {
                        "unknown generator"
                    } else {
                        header.crashgen_name.as_str()
                    }
                ),
            ));
        }

        // A supported game without a data document is a batch-level
        // configuration failure, not a per-log condition.
        let game_config = self.config.require_game(header.game)?;

        let plugins = segments
            .get(&SegmentKind::Plugins)
            .map(extract_plugins)
            .unwrap_or_default();

        let parsed = ParsedLog {
            path: log_path.to_path_buf(),
            header,
            segments,
            plugins,
        };
        let artifacts = Artifacts::derive(&parsed, game_config);
        let game_root = self.config.options().game_root();

        let ctx = AnalyzerContext {
            parsed: &parsed,
            game: game_config,
            options: self.config.options(),
            artifacts: &artifacts,
            formid_db: self.formid_db,
            game_root: game_root.as_deref(),
        };

        let mut root = ReportFragment::section("", 0);
        root.add_child(overview_fragment(&parsed));

        let mut warnings = Vec::new();
        for result in self.run_analyzers(&ctx, log_path, deadline)? {
            if let Some(error) = &result.error {
                warnings.push(format!("{}: {error}", result.analyzer));
            }
            if !result.fragment.is_empty() {
                root.add_child(result.fragment);
            }
        }

        Ok(LogAnalysisResult {
            path: log_path.to_path_buf(),
            parsed: true,
            warnings,
            report: root,
        })
    }

    /// Read the log and split its segments. Small files are buffered whole;
    /// large ones stream through the splitter so memory stays bounded.
    fn read_and_split(
        &self,
        log_path: &Path,
        len: u64,
    ) -> Result<(
        Option<crate::core::model::CrashHeader>,
        BTreeMap<SegmentKind, crate::core::model::LogSegment>,
    )> {
        let read_err = |source| {
            ScannerError::from(ScanError::LogRead {
                path: log_path.to_path_buf(),
                source,
            })
        };

        if len < constants::FULL_BUFFER_LIMIT {
            let bytes = fs::read(log_path).map_err(read_err)?;
            let window_end = bytes.len().min(constants::HEADER_SCAN_BYTES);
            let header = parse_header(&String::from_utf8_lossy(&bytes[..window_end]));
            let segments = split_segments(bytes.as_slice()).map_err(read_err)?;
            Ok((header, segments))
        } else {
            tracing::debug!(
                log = %log_path.display(),
                size_mb = len / (1024 * 1024),
                "Streaming large crash log"
            );
            let mut file = fs::File::open(log_path).map_err(read_err)?;
            let mut window = vec![0u8; constants::HEADER_SCAN_BYTES];
            let mut filled = 0;
            while filled < window.len() {
                let n = file.read(&mut window[filled..]).map_err(read_err)?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            window.truncate(filled);
            let header = parse_header(&String::from_utf8_lossy(&window));

            let file = fs::File::open(log_path).map_err(read_err)?;
            let segments = split_segments(BufReader::new(file)).map_err(read_err)?;
            Ok((header, segments))
        }
    }

    /// Run the analyzer set in ascending priority order. Within one level,
    /// parallel-eligible analyzers fan out; results are stitched back in
    /// registration order. A failing or panicking analyzer becomes an
    /// error fragment and the remaining analyzers still run.
    fn run_analyzers(
        &self,
        ctx: &AnalyzerContext<'_>,
        log_path: &Path,
        deadline: Instant,
    ) -> Result<Vec<AnalyzerResult>> {
        let mut by_priority: BTreeMap<u32, Vec<&dyn Analyzer>> = BTreeMap::new();
        for analyzer in self.analyzers {
            by_priority
                .entry(analyzer.priority())
                .or_default()
                .push(analyzer.as_ref());
        }

        let mut results = Vec::with_capacity(self.analyzers.len());
        for (priority, group) in by_priority {
            self.check_interrupted(log_path, deadline)?;

            let eligible: Vec<bool> = group.iter().map(|a| a.parallel()).collect();
            let parallel_count = eligible.iter().filter(|&&p| p).count();

            if parallel_count > 1 {
                // Fan out the eligible subset; par_iter preserves input
                // order in the collected output.
                let fanned: Vec<AnalyzerResult> = group
                    .par_iter()
                    .zip(eligible.par_iter())
                    .filter(|&(_, parallel)| *parallel)
                    .map(|(analyzer, _)| run_one(*analyzer, ctx))
                    .collect();
                let mut fanned = fanned.into_iter();
                for (analyzer, parallel) in group.iter().zip(eligible.iter()) {
                    if *parallel {
                        results.push(fanned.next().expect("one result per eligible analyzer"));
                    } else {
                        results.push(run_one(*analyzer, ctx));
                    }
                }
            } else {
                for analyzer in group {
                    results.push(run_one(analyzer, ctx));
                }
            }

            tracing::trace!(priority, "Analyzer priority level complete");
        }
        Ok(results)
    }

    fn check_interrupted(&self, log_path: &Path, deadline: Instant) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(ScanError::Cancelled.into());
        }
        if Instant::now() >= deadline {
            return Err(ScanError::Timeout {
                path: log_path.to_path_buf(),
            }
            .into());
        }
        Ok(())
    }
}

/// Invoke one analyzer, converting an `Err` or a panic into an error
/// fragment so the rest of the log's analysis continues.
fn run_one(analyzer: &dyn Analyzer, ctx: &AnalyzerContext<'_>) -> AnalyzerResult {
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| analyzer.analyze(ctx)));
    let duration = started.elapsed();

    let (fragment, error) = match outcome {
        Ok(Ok(fragment)) => (fragment, None),
        Ok(Err(e)) => (error_fragment(analyzer, &e.to_string()), Some(e.to_string())),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "analyzer panicked".to_string());
            (error_fragment(analyzer, &reason), Some(reason))
        }
    };

    if let Some(reason) = &error {
        tracing::warn!(analyzer = analyzer.name(), reason, "Analyzer failed");
    }

    AnalyzerResult {
        analyzer: analyzer.name(),
        success: error.is_none(),
        fragment,
        duration,
        error,
    }
}

fn error_fragment(analyzer: &dyn Analyzer, reason: &str) -> ReportFragment {
    let mut fragment = ReportFragment::error(
        format!("{} (analysis failed)", analyzer.name()),
        analyzer.priority(),
    );
    fragment.push_line(format!("This analyzer did not complete: {reason}"));
    fragment
}

/// The leading report section describing the crash: generator, game,
/// main error, and timestamp.
fn overview_fragment(parsed: &ParsedLog) -> ReportFragment {
    let header = &parsed.header;
    let mut fragment = ReportFragment::info("Crash Generator", 0);

    if header.crashgen_name.is_empty() {
        fragment.push_line("Crash generator: unknown");
    } else if header.crashgen_version.is_empty() {
        fragment.push_line(format!("{} (version unknown)", header.crashgen_name));
    } else {
        fragment.push_line(format!(
            "{} v{}",
            header.crashgen_name, header.crashgen_version
        ));
    }
    fragment.push_line(format!("Game: {} v{}", header.game, header.game_version));
    if !header.main_error.is_empty() {
        fragment.push_line(format!("Main error: {}", header.main_error));
    }
    if let Some(ts) = header.timestamp {
        fragment.push_line(format!("Crash time: {}", ts.format("%Y-%m-%d %H:%M:%S")));
    }
    fragment
}

/// The report produced for empty, headerless, or unsupported logs.
fn invalid_result(log_path: &Path, reason: &str) -> LogAnalysisResult {
    let mut notice = ReportFragment::warning("Invalid Log", 0);
    notice.push_line(format!(
        "{} crash log: {reason}.",
        constants::INVALID_LOG_TEXT
    ));
    notice.push_line("No analysis was performed on this file.".to_string());

    let mut root = ReportFragment::section("", 0);
    root.add_child(notice);

    LogAnalysisResult {
        path: log_path.to_path_buf(),
        parsed: false,
        warnings: vec![format!("invalid or incomplete: {reason}")],
        report: root,
    }
}

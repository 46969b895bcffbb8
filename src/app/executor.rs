// Scanner111 - app/executor.rs
//
// Batch scan execution. Fans one orchestrator invocation per crash log out
// over a dedicated worker pool bounded at max_concurrent, writes each
// report next to its log, accumulates statistics atomically, and seals a
// BatchResult.
//
// Cancellation is cooperative: once the shared flag is set, no new log is
// admitted and in-flight orchestrators abort at their next poll point.
// Reports already written are retained.

use crate::analysis::{default_analyzers, Analyzer};
use crate::app::config::ConfigurationCache;
use crate::app::discovery::discover_crash_logs;
use crate::app::orchestrator::LogOrchestrator;
use crate::core::model::{BatchResult, Game, ScanProgress, ScanStatistics};
use crate::core::report;
use crate::db::formid::FormIdDatabase;
use crate::util::constants;
use crate::util::error::{Result, ScanError, ScannerError};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Executes batch scans. One executor is built per batch configuration;
/// `execute` may be called repeatedly (the FormID cache is cleared between
/// batches).
pub struct ScanExecutor {
    config: ConfigurationCache,
    analyzers: Vec<Box<dyn Analyzer>>,
    formid_db: Option<FormIdDatabase>,
    cancel: Arc<AtomicBool>,
}

impl ScanExecutor {
    pub fn new(config: ConfigurationCache) -> Self {
        let options = config.options();

        // The reference databases are shared by every orchestrator; the
        // selected game decides which files are opened (both Fallout 4
        // variants share one table).
        let formid_db = Game::from_key(&options.selected_game).map(|game| {
            let paths = config.formid_database_paths(game);
            let table = config
                .game(game)
                .map(|g| g.formid_table.clone())
                .unwrap_or_default();
            FormIdDatabase::open(&paths, &table, options.max_concurrent)
        });

        Self {
            config,
            analyzers: default_analyzers(),
            formid_db,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The shared cancellation flag. Setting it stops admission of new
    /// logs; in-flight logs abort at their next poll point.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn options(&self) -> &crate::app::config::ScanOptions {
        self.config.options()
    }

    /// Run one batch over every crash log under `scan_path`.
    ///
    /// `progress` is invoked at most once per completed log plus once at
    /// start and on observed cancellation; it must be cheap.
    pub fn execute<F>(&self, scan_path: &Path, progress: F) -> Result<BatchResult>
    where
        F: Fn(ScanProgress) + Sync,
    {
        let started = Instant::now();
        let (files, warnings) = discover_crash_logs(scan_path)?;
        for warning in &warnings {
            tracing::warn!(warning, "Discovery warning");
        }

        let total = files.len();
        tracing::info!(
            scan_path = %scan_path.display(),
            logs = total,
            max_concurrent = self.config.options().max_concurrent,
            "Batch scan starting"
        );
        progress(ScanProgress::Started { total_logs: total });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.options().max_concurrent)
            .thread_name(|i| format!("scan-worker-{i}"))
            .build()
            .map_err(|e| ScanError::ThreadPool {
                reason: e.to_string(),
            })?;

        let scanned = AtomicUsize::new(0);
        let incomplete = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let failed_logs: Mutex<Vec<(PathBuf, String)>> = Mutex::new(Vec::new());
        let fatal: Mutex<Option<ScannerError>> = Mutex::new(None);

        pool.install(|| {
            files.par_iter().for_each(|path| {
                // Stop admitting once cancellation is observed.
                if self.cancel.load(Ordering::Relaxed) {
                    return;
                }

                let orchestrator = LogOrchestrator::new(
                    &self.config,
                    &self.analyzers,
                    self.formid_db.as_ref(),
                    &self.cancel,
                );

                match orchestrator.analyze(path) {
                    Ok(result) => {
                        match report::write_report(path, &report::render(&result.report)) {
                            Ok(_) => {
                                scanned.fetch_add(1, Ordering::Relaxed);
                                if !result.parsed {
                                    incomplete.fetch_add(1, Ordering::Relaxed);
                                    if self.config.options().move_unsolved_logs {
                                        move_to_unsolved(path);
                                    }
                                }
                                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                                progress(ScanProgress::LogCompleted {
                                    path: path.clone(),
                                    parsed: result.parsed,
                                    completed: done,
                                    total,
                                });
                            }
                            Err(e) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                push_failed(&failed_logs, path, e.to_string());
                                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                                progress(ScanProgress::LogCompleted {
                                    path: path.clone(),
                                    parsed: false,
                                    completed: done,
                                    total,
                                });
                            }
                        }
                    }
                    Err(ScannerError::Scan(ScanError::Cancelled)) => {
                        // The log neither completed nor failed; the batch
                        // surfaces the cancelled terminal state instead.
                    }
                    Err(e @ ScannerError::Config(_)) => {
                        // Missing game configuration is batch-fatal: record
                        // it once and drain the remaining work.
                        let mut guard = fatal.lock().unwrap_or_else(|p| p.into_inner());
                        if guard.is_none() {
                            *guard = Some(e);
                        }
                        self.cancel.store(true, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(log = %path.display(), error = %e, "Log failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                        push_failed(&failed_logs, path, e.to_string());
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        progress(ScanProgress::LogCompleted {
                            path: path.clone(),
                            parsed: false,
                            completed: done,
                            total,
                        });
                    }
                }
            });
        });

        if let Some(error) = fatal.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(error);
        }

        // Lookup results must not leak into the next batch.
        if let Some(db) = &self.formid_db {
            db.clear_cache();
        }

        let cancelled = self.cancel.load(Ordering::Relaxed);
        if cancelled {
            progress(ScanProgress::Cancelled);
        }

        let statistics = ScanStatistics {
            scanned: scanned.load(Ordering::Relaxed),
            incomplete: incomplete.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        };

        // Completion order is timing-dependent; the sealed result is not.
        let mut failed_logs = failed_logs.into_inner().unwrap_or_else(|p| p.into_inner());
        failed_logs.sort();

        let result = BatchResult {
            statistics,
            failed_logs,
            processed: files,
            duration: started.elapsed(),
            cancelled,
        };

        tracing::info!(
            scanned = result.statistics.scanned,
            incomplete = result.statistics.incomplete,
            failed = result.statistics.failed,
            cancelled = result.cancelled,
            duration_ms = result.duration.as_millis() as u64,
            "Batch scan complete"
        );

        Ok(result)
    }
}

fn push_failed(failed_logs: &Mutex<Vec<(PathBuf, String)>>, path: &Path, reason: String) {
    failed_logs
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .push((path.to_path_buf(), reason));
}

/// Relocate an unsolved log into the sibling Unsolved/ directory. A failed
/// move degrades to a warning; the report stays where it was written.
fn move_to_unsolved(log_path: &Path) {
    let Some(parent) = log_path.parent() else {
        return;
    };
    let Some(name) = log_path.file_name() else {
        return;
    };
    let unsolved_dir = parent.join(constants::UNSOLVED_DIR_NAME);
    if let Err(e) = std::fs::create_dir_all(&unsolved_dir) {
        tracing::warn!(dir = %unsolved_dir.display(), error = %e, "Cannot create Unsolved/");
        return;
    }
    let dest = unsolved_dir.join(name);
    if let Err(e) = std::fs::rename(log_path, &dest) {
        tracing::warn!(
            from = %log_path.display(),
            to = %dest.display(),
            error = %e,
            "Cannot move unsolved log"
        );
    }
}

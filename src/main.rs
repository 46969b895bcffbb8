// Scanner111 - main.rs
//
// CLI entry point. Handles:
// 1. Argument parsing
// 2. Logging initialisation (debug mode support)
// 3. Configuration loading (built-in + user overrides)
// 4. Batch execution with Ctrl-C cancellation
//
// Exit codes: 0 success, 1 scan path not found, 2 invalid argument,
// 3 cancelled, 4 unexpected or configuration error.

use clap::Parser;
use scanner111::app::config::ConfigurationCache;
use scanner111::app::executor::ScanExecutor;
use scanner111::core::model::ScanProgress;
use scanner111::util::constants;
use scanner111::util::error::{ScanError, ScannerError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

/// Scanner111 - Bethesda crash-log analyser.
///
/// Point Scanner111 at a directory of Buffout 4 / Crash Logger crash logs
/// to produce a per-log AUTOSCAN report and batch statistics.
#[derive(Parser, Debug)]
#[command(name = "scanner111", version, about)]
struct Cli {
    /// Directory containing crash-*.log / crash-*.txt files.
    path: Option<PathBuf>,

    /// Directory containing crash logs (alternative to the positional).
    #[arg(long = "scan-path", value_name = "DIR")]
    scan_path: Option<PathBuf>,

    /// Validate game-file hashes against the known-good list.
    #[arg(long = "fcx-mode")]
    fcx_mode: bool,

    /// Resolve Form ID values against the reference databases.
    #[arg(long = "show-fid-values")]
    show_fid_values: bool,

    /// Move invalid-or-incomplete logs into a sibling Unsolved/ directory.
    #[arg(long = "move-unsolved")]
    move_unsolved: bool,

    /// Keep reports terse by omitting ignored-plugin detail lines.
    #[arg(long = "simplify-logs")]
    simplify_logs: bool,

    /// Number of logs analysed concurrently (1-100).
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Suppress per-log progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    debug: bool,

    /// Directory with settings.toml and per-game configuration overrides.
    #[arg(long = "config-dir", value_name = "DIR")]
    config_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    scanner111::util::logging::init(cli.debug, cli.quiet);

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "Scanner111 starting"
    );

    let Some(scan_path) = cli.path.clone().or_else(|| cli.scan_path.clone()) else {
        eprintln!("Error: no scan path given. Pass a directory or --scan-path DIR.");
        return ExitCode::from(2);
    };

    // CLI --config-dir wins; otherwise the platform config directory is
    // used when it exists.
    let config_dir = cli.config_dir.clone().or_else(|| {
        directories::ProjectDirs::from("", "", constants::APP_ID)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .filter(|dir| dir.is_dir())
    });

    let mut config = match ConfigurationCache::load(config_dir.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration loading failed");
            eprintln!("Error: {e}");
            return ExitCode::from(4);
        }
    };

    // Fold CLI flags over the loaded options.
    let mut options = config.options().clone();
    options.fcx_mode |= cli.fcx_mode;
    options.show_form_id_values |= cli.show_fid_values;
    options.move_unsolved_logs |= cli.move_unsolved;
    options.simplify_logs |= cli.simplify_logs;
    if let Some(concurrency) = cli.concurrency {
        options.max_concurrent = concurrency;
    }
    if let Err(e) = options.validate() {
        eprintln!("Error: {e}");
        return ExitCode::from(2);
    }
    config.set_options(options);

    let executor = ScanExecutor::new(config);

    let cancel = executor.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Cancellation requested; letting in-flight logs settle...");
        cancel.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "Cannot install Ctrl-C handler");
    }

    let quiet = cli.quiet;
    let outcome = executor.execute(&scan_path, |progress| {
        if quiet {
            return;
        }
        match progress {
            ScanProgress::Started { total_logs } => {
                println!("Scanning {total_logs} crash log(s)...");
            }
            ScanProgress::LogCompleted {
                path,
                parsed,
                completed,
                total,
            } => {
                let marker = if parsed { "ok" } else { "incomplete" };
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                println!("[{completed}/{total}] {name}: {marker}");
            }
            ScanProgress::Cancelled => {
                println!("Scan cancelled.");
            }
        }
    });

    match outcome {
        Ok(result) => {
            if !quiet {
                println!(
                    "Scanned {} log(s): {} complete, {} incomplete, {} failed ({:.1}s)",
                    result.statistics.scanned,
                    result.statistics.completed(),
                    result.statistics.incomplete,
                    result.statistics.failed,
                    result.duration.as_secs_f64()
                );
                for (path, reason) in &result.failed_logs {
                    println!("  failed: {}: {reason}", path.display());
                }
            }
            if result.cancelled {
                ExitCode::from(3)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(ScannerError::Scan(
            ScanError::RootNotFound { path } | ScanError::NotADirectory { path },
        )) => {
            eprintln!("Error: scan path '{}' not found or not a directory.", path.display());
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!(error = %e, "Batch scan failed");
            eprintln!("Error: {e}");
            ExitCode::from(4)
        }
    }
}

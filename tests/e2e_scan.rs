// Scanner111 - tests/e2e_scan.rs
//
// End-to-end tests for the batch scan pipeline.
//
// These tests exercise the real filesystem, real configuration loading,
// real header/segment parsing, real analyzer fan-out, and real report
// writing — no mocks, no stubs. Each scenario writes crash logs into a
// temp directory, runs the executor, and inspects the AUTOSCAN files and
// batch statistics it produced.

use scanner111::app::config::{ConfigurationCache, ScanOptions};
use scanner111::app::executor::ScanExecutor;
use scanner111::core::model::ScanProgress;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

// =============================================================================
// Helpers
// =============================================================================

fn executor_with(options: ScanOptions) -> ScanExecutor {
    let mut config = ConfigurationCache::load(None).unwrap();
    config.set_options(options);
    ScanExecutor::new(config)
}

fn read_report(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("report '{}' should exist: {e}", path.display()))
}

const HAPPY_LOG: &str = "Fallout 4 v1.10.163.0\n\
    Buffout 4 v1.26.2\n\
    \n\
    Unhandled exception \"EXCEPTION_ACCESS_VIOLATION\" at 0x7FF6A1B2C3D4\n\
    Crash log generated at 2024-03-01 18:22:05\n\
    \n\
    SETTINGS:\n\
    \tMemoryManager: true\n\
    \tArchiveLimit: false\n\
    XSE MODULES:\n\
    \tf4se_1_10_163.dll v0.6.23\n\
    PLUGINS:\n\
    \t[00] Fallout4.esm\n\
    \t[01] DLCRobot.esm\n\
    \t[0A] WeaponMod.esp\n\
    CALLSTACK:\n\
    \t[0] 0x7FF6A1B2C3D4 Fallout4.exe+2479AA4\n\
    \t[1] 0x7FF6A1B2C000 WeaponMod.esp+0010\n\
    \tForm ID: 0x00012345\n\
    \tForm ID: 0xFF001234\n";

// =============================================================================
// Scenario 1: happy path
// =============================================================================

#[test]
fn e2e_happy_path_produces_full_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("crash-fo4.log"), HAPPY_LOG).unwrap();

    let executor = executor_with(ScanOptions::default());
    let result = executor.execute(dir.path(), |_| {}).unwrap();

    assert_eq!(result.statistics.scanned, 1);
    assert_eq!(result.statistics.incomplete, 0);
    assert_eq!(result.statistics.failed, 0);

    let report = read_report(dir.path(), "crash-fo4-AUTOSCAN.md");
    assert!(report.starts_with("# Crash Log Analysis\n"));
    assert!(report.contains("## Crash Generator"));
    assert!(report.contains("Buffout 4 v1.26.2"));
    // One section per analyzer that had something to say.
    assert!(report.contains("Plugins"));
    assert!(report.contains("Form ID"));
    assert!(report.contains("Crash Suspects"));
    assert!(report.contains("Crash Generator Settings"));
    assert!(report.contains("Memory Management"));
}

// =============================================================================
// Scenario 2: empty log
// =============================================================================

#[test]
fn e2e_empty_log_yields_invalid_report_and_incomplete_count() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("crash-empty.log"), "").unwrap();

    let executor = executor_with(ScanOptions::default());
    let result = executor.execute(dir.path(), |_| {}).unwrap();

    let report = read_report(dir.path(), "crash-empty-AUTOSCAN.md");
    assert!(report.contains("Invalid or incomplete"));

    assert_eq!(result.statistics.scanned, 1);
    assert_eq!(result.statistics.incomplete, 1);
    assert_eq!(result.statistics.failed, 0);
}

// =============================================================================
// Scenario 3: FF form-id filtering
// =============================================================================

#[test]
fn e2e_synthetic_formids_filtered_real_ones_resolved() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("crash-fid.log"), HAPPY_LOG).unwrap();

    let executor = executor_with(ScanOptions::default());
    executor.execute(dir.path(), |_| {}).unwrap();

    let report = read_report(dir.path(), "crash-fid-AUTOSCAN.md");
    assert!(
        !report.contains("FF001234"),
        "runtime-synthesised id must be filtered"
    );
    // Prefix 00 maps to Fallout4.esm via the plugin list.
    assert!(report.contains("- Form ID: 00012345 | [Fallout4.esm] | 1"));
    assert_eq!(
        report.matches("00012345").count(),
        1,
        "the id appears exactly once"
    );
}

// =============================================================================
// Scenario 4: memory-manager conflict
// =============================================================================

#[test]
fn e2e_memory_manager_conflict_with_xcell() {
    let log = "Fallout 4 v1.10.163.0\n\
        Buffout 4 v1.28.6\n\
        \n\
        SETTINGS:\n\
        \tMemoryManager: true\n\
        XSE MODULES:\n\
        \tx-cell-fo4.dll v1.0.0\n";

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("crash-mem.log"), log).unwrap();

    let executor = executor_with(ScanOptions::default());
    executor.execute(dir.path(), |_| {}).unwrap();

    let report = read_report(dir.path(), "crash-mem-AUTOSCAN.md");
    assert!(report.contains("❌ CAUTION : Memory Management"));
    assert!(report.contains("change MemoryManager to FALSE"));
}

// =============================================================================
// Scenario 5: suspect match ordering
// =============================================================================

#[test]
fn e2e_stack_suspects_require_order_and_title_lists_labels() {
    let ordered = "Fallout 4 v1.10.163.0\n\
        Buffout 4 v1.28.6\n\
        \n\
        CALLSTACK:\n\
        \t[0] AllocateMemory\n\
        \t[1] BSTextureStreamer::Load\n";
    let permuted = "Fallout 4 v1.10.163.0\n\
        Buffout 4 v1.28.6\n\
        \n\
        CALLSTACK:\n\
        \t[0] BSTextureStreamer::Load\n\
        \t[1] AllocateMemory\n";

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("crash-ordered.log"), ordered).unwrap();
    fs::write(dir.path().join("crash-permuted.log"), permuted).unwrap();

    let executor = executor_with(ScanOptions::default());
    executor.execute(dir.path(), |_| {}).unwrap();

    let ordered_report = read_report(dir.path(), "crash-ordered-AUTOSCAN.md");
    assert!(ordered_report.contains("Crash Suspects (Texture Streaming Crash)"));

    let permuted_report = read_report(dir.path(), "crash-permuted-AUTOSCAN.md");
    assert!(
        !permuted_report.contains("Texture Streaming Crash"),
        "permuted callstack must not match the ordered pattern"
    );
}

// =============================================================================
// Scenario 6: concurrency equivalence
// =============================================================================

#[test]
fn e2e_concurrency_levels_produce_identical_outputs() {
    let write_corpus = |dir: &Path| {
        for i in 0..50 {
            let content = match i % 4 {
                0 => HAPPY_LOG.to_string(),
                1 => String::new(),
                2 => "random bytes that are not a crash log\n".to_string(),
                _ => format!(
                    "Fallout 4 v1.10.163.0\n\
                     Buffout 4 v1.26.2\n\
                     \n\
                     Unhandled exception \"EXCEPTION_STACK_OVERFLOW\" at 0x7FF6\n\
                     \n\
                     PLUGINS:\n\
                     \t[{:02X}] Mod{}.esp\n\
                     CALLSTACK:\n\
                     \tMod{}.esp+0x{:04X}\n",
                    i, i, i, i * 16
                ),
            };
            fs::write(dir.join(format!("crash-{i:02}.log")), content).unwrap();
        }
    };

    let run = |concurrency: usize| {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let executor = executor_with(ScanOptions {
            max_concurrent: concurrency,
            ..ScanOptions::default()
        });
        let stats = executor.execute(dir.path(), |_| {}).unwrap().statistics;

        let mut reports: Vec<(String, String)> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("md"))
            .map(|p| {
                (
                    p.file_name().unwrap().to_str().unwrap().to_string(),
                    fs::read_to_string(&p).unwrap(),
                )
            })
            .collect();
        reports.sort();
        (stats, reports)
    };

    let (stats_1, reports_1) = run(1);
    let (stats_32, reports_32) = run(32);

    assert_eq!(stats_1, stats_32, "statistics must not depend on concurrency");
    assert_eq!(reports_1.len(), 50, "one report per admitted log");
    assert_eq!(
        reports_1, reports_32,
        "report bytes must not depend on concurrency"
    );
}

// =============================================================================
// Unsolved relocation and progress cadence
// =============================================================================

#[test]
fn e2e_move_unsolved_after_report_written() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("crash-good.log"), HAPPY_LOG).unwrap();
    fs::write(dir.path().join("crash-junk.txt"), "garbage\n").unwrap();

    let executor = executor_with(ScanOptions {
        move_unsolved_logs: true,
        ..ScanOptions::default()
    });
    let result = executor.execute(dir.path(), |_| {}).unwrap();

    assert_eq!(result.statistics.incomplete, 1);
    assert!(dir.path().join("Unsolved").join("crash-junk.txt").is_file());
    assert!(
        dir.path().join("crash-good.log").is_file(),
        "parsed logs stay in place"
    );
    // Both reports exist next to the original location.
    assert!(dir.path().join("crash-good-AUTOSCAN.md").is_file());
    assert!(dir.path().join("crash-junk-AUTOSCAN.md").is_file());
}

#[test]
fn e2e_progress_callback_once_per_log() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        fs::write(dir.path().join(format!("crash-{i}.log")), HAPPY_LOG).unwrap();
    }

    let events: Mutex<Vec<ScanProgress>> = Mutex::new(Vec::new());
    let executor = executor_with(ScanOptions {
        max_concurrent: 3,
        ..ScanOptions::default()
    });
    executor
        .execute(dir.path(), |p| events.lock().unwrap().push(p))
        .unwrap();

    let events = events.into_inner().unwrap();
    let completions = events
        .iter()
        .filter(|e| matches!(e, ScanProgress::LogCompleted { .. }))
        .count();
    assert_eq!(completions, 6);
}

// =============================================================================
// FormID value resolution against a real database
// =============================================================================

#[test]
fn e2e_formid_values_resolved_from_sqlite() {
    let config_dir = tempfile::tempdir().unwrap();
    {
        let conn =
            rusqlite::Connection::open(config_dir.path().join("Fallout4 FormIDs.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE Fallout4 (formid TEXT, plugin TEXT, entry TEXT, \
             PRIMARY KEY(formid, plugin));
             INSERT INTO Fallout4 VALUES ('012345', 'Fallout4.esm', 'Vault111 (CELL)');",
        )
        .unwrap();
    }

    let scan_dir = tempfile::tempdir().unwrap();
    fs::write(scan_dir.path().join("crash-db.log"), HAPPY_LOG).unwrap();

    let mut config = ConfigurationCache::load(Some(config_dir.path())).unwrap();
    config.set_options(ScanOptions {
        show_form_id_values: true,
        ..ScanOptions::default()
    });
    let executor = ScanExecutor::new(config);
    executor.execute(scan_dir.path(), |_| {}).unwrap();

    let report = read_report(scan_dir.path(), "crash-db-AUTOSCAN.md");
    assert!(
        report.contains("- Form ID: 00012345 | [Fallout4.esm] | Vault111 (CELL) | 1"),
        "report: {report}"
    );
}

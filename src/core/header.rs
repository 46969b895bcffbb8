// Scanner111 - core/header.rs
//
// Crash-header extraction. Consults only the first HEADER_SCAN_BYTES of a
// log; crash generators put all four header fields within the first few
// hundred bytes, and scanning deeper would make classification O(file size).
//
// Partial success is valid: a missing generator line or exception line
// yields empty strings, and an out-of-range timestamp yields None, without
// invalidating the header. The header as a whole is absent only when no
// game-version line matches.

use crate::core::model::{CrashHeader, Game};
use crate::util::constants;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

struct HeaderPatterns {
    game: Regex,
    crashgen: Regex,
    main_error: Regex,
    timestamp: Regex,
}

fn patterns() -> &'static HeaderPatterns {
    static PATTERNS: OnceLock<HeaderPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("header pattern: invalid regex")
        }
        HeaderPatterns {
            // Longer alternatives first so "Fallout4VR" is not split into
            // a partial "Fallout 4" match.
            game: re(
                r"(?i)^(?P<name>Fallout4VR|Fallout 4|Skyrim Special Edition|Skyrim SE|SkyrimVR)\s+v(?P<ver>\d+(?:\.\d+)+)",
            ),
            crashgen: re(r"(?P<name>Buffout 4|Crash Logger(?: SSE| VR)?)\s+v(?P<ver>\S+)"),
            main_error: re(r#"^Unhandled exception\s+"(?P<exc>[^"]+)""#),
            timestamp: re(
                r"Crash log (?:generated )?at (?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})",
            ),
        }
    })
}

/// Parse the crash header from the start of `text`.
///
/// Returns `None` when the first non-blank line of the scan window is not a
/// recognised game-version line.
pub fn parse_header(text: &str) -> Option<CrashHeader> {
    let window = header_window(text);
    let pats = patterns();

    let mut lines = window.lines().map(|l| l.trim_end_matches('\r'));

    // The game-version line must be the first non-blank line.
    let first = lines.find(|l| !l.trim().is_empty())?;
    let game_caps = pats.game.captures(first.trim_start())?;
    let game = Game::from_header_name(&game_caps["name"])?;
    let game_version = game_caps["ver"].to_string();

    let mut crashgen_name = String::new();
    let mut crashgen_version = String::new();
    let mut main_error = String::new();
    let mut timestamp: Option<NaiveDateTime> = None;

    for line in lines {
        let trimmed = line.trim_start();
        if crashgen_name.is_empty() {
            if let Some(caps) = pats.crashgen.captures(trimmed) {
                crashgen_name = caps["name"].to_string();
                crashgen_version = caps["ver"].to_string();
                continue;
            }
        }
        if main_error.is_empty() {
            if let Some(caps) = pats.main_error.captures(trimmed) {
                main_error = caps["exc"].to_string();
                continue;
            }
        }
        if timestamp.is_none() {
            if let Some(caps) = pats.timestamp.captures(trimmed) {
                // Out-of-range fields (month 13 etc.) leave the timestamp
                // absent; the remaining header fields stay valid.
                timestamp =
                    NaiveDateTime::parse_from_str(&caps["ts"], "%Y-%m-%d %H:%M:%S").ok();
            }
        }
    }

    tracing::debug!(
        game = game.key(),
        game_version = %game_version,
        crashgen = %crashgen_name,
        "Crash header parsed"
    );

    Some(CrashHeader {
        game,
        game_version,
        crashgen_name,
        crashgen_version,
        main_error,
        timestamp,
    })
}

/// The leading slice of `text` the header parser is allowed to see,
/// clamped back to a UTF-8 char boundary.
fn header_window(text: &str) -> &str {
    if text.len() <= constants::HEADER_SCAN_BYTES {
        return text;
    }
    let mut end = constants::HEADER_SCAN_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

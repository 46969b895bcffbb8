// Scanner111 - core/segments.rs
//
// Segment-delimited crash-log body splitting.
//
// Stream-oriented: accepts any BufRead and walks the log line by line, so
// very large logs never need to be fully buffered. Invalid UTF-8 is
// replaced, never fatal. The header region (everything before the first
// recognised marker) is skipped; the header parser owns those bytes.

use crate::core::model::{LogSegment, PluginRecord, SegmentKind};
use crate::util::constants;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::sync::OnceLock;

/// Where lines are currently being routed.
enum Sink {
    /// Before the first marker, or after an unknown region ends.
    Header,
    /// Appending to the named segment.
    Active(SegmentKind),
    /// A duplicate marker was seen; its lines are dropped so the first
    /// occurrence of the segment stays intact.
    Discard,
}

/// Split a crash-log body into its named segments.
///
/// Lines between one recognised marker and the next (or EOF) belong to that
/// marker's segment with leading whitespace preserved. Marker-looking lines
/// that are not in the known set are ordinary content. Duplicate markers
/// keep the first occurrence. An empty body yields an empty map.
pub fn split_segments<R: BufRead>(mut reader: R) -> io::Result<BTreeMap<SegmentKind, LogSegment>> {
    let mut segments: BTreeMap<SegmentKind, LogSegment> = BTreeMap::new();
    let mut sink = Sink::Header;
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }

        let mut line = String::from_utf8_lossy(&buf).into_owned();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        if line.len() > constants::MAX_SEGMENT_LINE_LEN {
            line.truncate(constants::MAX_SEGMENT_LINE_LEN);
        }

        if let Some(kind) = SegmentKind::from_marker_line(&line) {
            sink = if segments.contains_key(&kind) {
                tracing::debug!(segment = kind.label(), "Duplicate segment marker ignored");
                Sink::Discard
            } else {
                segments.insert(kind, LogSegment::default());
                Sink::Active(kind)
            };
            continue;
        }

        if let Sink::Active(kind) = sink {
            if let Some(segment) = segments.get_mut(&kind) {
                segment.lines.push(line);
            }
        }
    }

    Ok(segments)
}

// =============================================================================
// Plugin extraction
// =============================================================================

fn plugin_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\[(?P<idx>[0-9A-Fa-f]{2})\]\s+(?P<name>\S.*?)\s*$")
            .expect("plugin line pattern: invalid regex")
    })
}

/// Extract plugin records from the PLUGINS segment.
///
/// Recognised lines have the shape `  [XX] name.ext` where XX is the
/// two-hex-char load-order prefix. Indexes are normalised to upper case;
/// a repeated index keeps its first record so the unique-index invariant
/// holds for lookups. Non-matching lines are skipped.
pub fn extract_plugins(segment: &LogSegment) -> Vec<PluginRecord> {
    let pattern = plugin_line_pattern();
    let mut plugins: Vec<PluginRecord> = Vec::new();

    for line in &segment.lines {
        if let Some(caps) = pattern.captures(line) {
            let index = caps["idx"].to_ascii_uppercase();
            if plugins.iter().any(|p| p.index == index) {
                tracing::debug!(index = %index, "Duplicate plugin index skipped");
                continue;
            }
            plugins.push(PluginRecord {
                name: caps["name"].to_string(),
                index,
            });
        }
    }

    plugins
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "Fallout 4 v1.10.163.0\n\
        Buffout 4 v1.26.2\n\
        \n\
        SYSTEM SPECS:\n\
        \tOS: Windows 10\n\
        \tCPU: GenuineIntel\n\
        SETTINGS:\n\
        \tMemoryManager: true\n\
        PLUGINS:\n\
        \t[00] Fallout4.esm\n\
        \t[01] DLCRobot.esm\n\
        CALLSTACK:\n\
        \t[0] 0x7FF6A1B2C3D4 Fallout4.exe+1234\n";

    #[test]
    fn test_split_named_segments() {
        let segments = split_segments(BODY.as_bytes()).unwrap();
        assert_eq!(segments.len(), 4);
        assert!(segments.contains_key(&SegmentKind::SystemSpecs));
        assert!(segments.contains_key(&SegmentKind::Settings));
        assert!(segments.contains_key(&SegmentKind::Plugins));
        assert!(segments.contains_key(&SegmentKind::Callstack));
    }

    #[test]
    fn test_leading_whitespace_preserved() {
        let segments = split_segments(BODY.as_bytes()).unwrap();
        let specs = &segments[&SegmentKind::SystemSpecs];
        assert_eq!(specs.lines[0], "\tOS: Windows 10");
    }

    #[test]
    fn test_header_region_excluded() {
        let segments = split_segments(BODY.as_bytes()).unwrap();
        for segment in segments.values() {
            assert!(
                !segment.lines.iter().any(|l| l.contains("Buffout 4 v")),
                "header lines must not leak into segments"
            );
        }
    }

    #[test]
    fn test_duplicate_marker_keeps_first_occurrence() {
        let body = "PLUGINS:\n\t[00] First.esm\nPLUGINS:\n\t[01] Second.esm\n";
        let segments = split_segments(body.as_bytes()).unwrap();
        let plugins = &segments[&SegmentKind::Plugins];
        assert_eq!(plugins.lines, vec!["\t[00] First.esm"]);
    }

    #[test]
    fn test_unknown_marker_is_content() {
        let body = "SETTINGS:\n\tA: 1\nEXTRA STUFF:\n\tB: 2\n";
        let segments = split_segments(body.as_bytes()).unwrap();
        let settings = &segments[&SegmentKind::Settings];
        assert_eq!(settings.lines, vec!["\tA: 1", "EXTRA STUFF:", "\tB: 2"]);
    }

    #[test]
    fn test_empty_body_yields_empty_map() {
        let segments = split_segments("".as_bytes()).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_crlf_line_endings_stripped() {
        let body = "SETTINGS:\r\n\tMemoryManager: true\r\n";
        let segments = split_segments(body.as_bytes()).unwrap();
        assert_eq!(segments[&SegmentKind::Settings].lines, vec!["\tMemoryManager: true"]);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut body = b"SETTINGS:\n\tkey = ".to_vec();
        body.extend_from_slice(&[0xFF, 0xFE]);
        body.push(b'\n');
        let segments = split_segments(body.as_slice()).unwrap();
        let line = &segments[&SegmentKind::Settings].lines[0];
        assert!(line.starts_with("\tkey = "), "got: {line:?}");
        assert!(line.contains('\u{FFFD}'));
    }

    // -------------------------------------------------------------------------
    // Plugin extraction
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_plugins_basic() {
        let segments = split_segments(BODY.as_bytes()).unwrap();
        let plugins = extract_plugins(&segments[&SegmentKind::Plugins]);
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].name, "Fallout4.esm");
        assert_eq!(plugins[0].index, "00");
        assert_eq!(plugins[1].index, "01");
    }

    #[test]
    fn test_extract_plugins_normalises_hex_case() {
        let segment = LogSegment {
            lines: vec!["\t[ab] LowerHex.esp".to_string()],
        };
        let plugins = extract_plugins(&segment);
        assert_eq!(plugins[0].index, "AB");
    }

    #[test]
    fn test_extract_plugins_duplicate_index_keeps_first() {
        let segment = LogSegment {
            lines: vec![
                "\t[05] First.esp".to_string(),
                "\t[05] Second.esp".to_string(),
            ],
        };
        let plugins = extract_plugins(&segment);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "First.esp");
    }

    #[test]
    fn test_extract_plugins_skips_non_matching_lines() {
        let segment = LogSegment {
            lines: vec![
                "light plugins are listed elsewhere".to_string(),
                "\t[FE] NotTwoHexDigitsAfterAll".to_string(),
                "\t[0] TooShort.esp".to_string(),
            ],
        };
        // [FE] is two hex chars, so it parses; [0] does not.
        let plugins = extract_plugins(&segment);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].index, "FE");
    }
}

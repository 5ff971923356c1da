//! Parsing of ripgrep's `--json` event stream into [`FileMatches`].
//!
//! Events are consumed by a two-state machine: outside any file section, or
//! inside the section opened by a `begin` event. `match` events add records
//! to the open section and `end` closes it.

use serde::Deserialize;
use serde_json::Value;

use super::model::{FileMatches, MatchRecord, SearchFailure, SearchOutcome};

/// Turn a finished tool run into a search outcome.
///
/// A non-zero exit whose output is a summary with all-zero statistics is how
/// ripgrep reports "searched, found nothing"; it yields an empty match list.
pub fn parse_output(code: i32, output: &str, command: &[String]) -> SearchOutcome {
    if code == 0 {
        return SearchOutcome::Matches(parse_events(output));
    }

    if is_empty_summary(output) {
        return SearchOutcome::Matches(Vec::new());
    }

    SearchOutcome::Failed(SearchFailure {
        code,
        command: command.to_vec(),
        message: output.to_string(),
    })
}

/// Parse a stream of JSON events into per-file match lists.
pub fn parse_events(output: &str) -> Vec<FileMatches> {
    let mut parser = EventParser::default();
    for line in output.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Codepoint position of `byte_offset` within `line`.
///
/// Offsets past the end clamp to the line length. An offset inside a
/// multi-byte codepoint counts only the codepoints that end before it.
pub fn char_offset(line: &str, byte_offset: usize) -> usize {
    if byte_offset >= line.len() {
        return line.chars().count();
    }
    line.char_indices()
        .take_while(|(idx, _)| *idx < byte_offset)
        .count()
        - usize::from(!line.is_char_boundary(byte_offset))
}

#[derive(Debug, Default)]
enum ParseState {
    #[default]
    Outside,
    InFile {
        path: String,
        matches: Vec<MatchRecord>,
    },
}

/// Incremental consumer of ripgrep JSON lines.
#[derive(Debug, Default)]
pub struct EventParser {
    state: ParseState,
    files: Vec<FileMatches>,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line of tool output.
    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let raw: RawEvent = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed search event");
                return;
            }
        };

        match raw.kind.as_str() {
            "begin" => self.on_begin(raw.data),
            "match" => self.on_match(raw.data),
            "end" => self.on_end(),
            _ => {}
        }
    }

    /// Flush any section left open and return the collected files.
    pub fn finish(mut self) -> Vec<FileMatches> {
        self.close_section();
        self.files
    }

    fn on_begin(&mut self, data: Value) {
        // A begin without a matching end closes the previous section
        self.close_section();

        let begin: BeginData = match serde_json::from_value(data) {
            Ok(begin) => begin,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed begin event");
                return;
            }
        };
        let Some(path) = begin.path.text else {
            tracing::warn!("skipping file with non UTF-8 path");
            return;
        };

        self.state = ParseState::InFile {
            path,
            matches: Vec::new(),
        };
    }

    fn on_match(&mut self, data: Value) {
        let ParseState::InFile { path, matches } = &mut self.state else {
            tracing::warn!("match event outside of a file section");
            return;
        };

        let event: MatchData = match serde_json::from_value(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping malformed match event");
                return;
            }
        };
        let Some(line) = event.lines.text else {
            tracing::warn!(path = %path, line = event.line_number, "skipping non UTF-8 line");
            return;
        };

        for sub in event.submatches {
            let start = sub.start.min(line.len());
            let end = sub.end.clamp(start, line.len());
            matches.push(MatchRecord {
                matched: sub.matched.text.unwrap_or_default(),
                start,
                end,
                start_char: char_offset(&line, start),
                end_char: char_offset(&line, end),
                line_number: event.line_number,
                absolute_offset: event.absolute_offset,
                line: line.clone(),
                replacement: None,
            });
        }
    }

    fn on_end(&mut self) {
        if matches!(self.state, ParseState::Outside) {
            tracing::warn!("end event outside of a file section");
        }
        self.close_section();
    }

    fn close_section(&mut self) {
        if let ParseState::InFile { path, matches } = std::mem::take(&mut self.state) {
            self.files.push(FileMatches { path, matches });
        }
    }
}

fn is_empty_summary(output: &str) -> bool {
    let Ok(raw) = serde_json::from_str::<RawEvent>(output.trim()) else {
        return false;
    };
    if raw.kind != "summary" {
        return false;
    }
    match serde_json::from_value::<SummaryData>(raw.data) {
        Ok(summary) => summary.stats.is_empty(),
        Err(_) => false,
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// ripgrep's "arbitrary data": UTF-8 text, or base64 `bytes` otherwise.
#[derive(Debug, Default, Deserialize)]
struct ArbitraryData {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BeginData {
    path: ArbitraryData,
}

#[derive(Debug, Deserialize)]
struct MatchData {
    lines: ArbitraryData,
    #[serde(default)]
    line_number: usize,
    #[serde(default)]
    absolute_offset: u64,
    #[serde(default)]
    submatches: Vec<SubMatch>,
}

#[derive(Debug, Deserialize)]
struct SubMatch {
    #[serde(rename = "match")]
    matched: ArbitraryData,
    start: usize,
    end: usize,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    stats: Stats,
}

#[derive(Debug, Deserialize)]
struct Stats {
    searches: u64,
    searches_with_match: u64,
    matches: u64,
    matched_lines: u64,
}

impl Stats {
    fn is_empty(&self) -> bool {
        self.searches == 0
            && self.searches_with_match == 0
            && self.matches == 0
            && self.matched_lines == 0
    }
}


#[cfg(test)]
mod proptests {
    use super::char_offset;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn char_offset_counts_prefix_codepoints(line in "\\PC{0,40}", pick in any::<prop::sample::Index>()) {
            let boundaries: Vec<usize> = line
                .char_indices()
                .map(|(idx, _)| idx)
                .chain(std::iter::once(line.len()))
                .collect();
            let byte = boundaries[pick.index(boundaries.len())];
            prop_assert_eq!(char_offset(&line, byte), line[..byte].chars().count());
        }

        #[test]
        fn char_offset_is_monotonic(line in "\\PC{0,40}") {
            let mut previous = 0;
            for byte in 0..=line.len() + 2 {
                let current = char_offset(&line, byte);
                prop_assert!(current >= previous);
                prop_assert!(current <= byte);
                previous = current;
            }
        }
    }
}

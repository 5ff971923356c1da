use serde::{Deserialize, Serialize};

/// One matched span on one line, as reported by a `match` event.
///
/// `start`/`end` are byte offsets into `line`; `start_utf8`/`end_utf8` are the
/// same positions counted in codepoints. `replacement` stays `None` until a
/// caller fills it in for a replace pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Full line text, trailing newline included when present
    #[serde(default)]
    pub line: String,
    /// The matched substring
    #[serde(rename = "match", default)]
    pub matched: String,
    /// Byte offset of the match start within the line (inclusive)
    pub start: usize,
    /// Byte offset of the match end within the line (exclusive)
    pub end: usize,
    /// Codepoint offset of the match start within the line
    #[serde(rename = "start_utf8", default)]
    pub start_char: usize,
    /// Codepoint offset of the match end within the line
    #[serde(rename = "end_utf8", default)]
    pub end_char: usize,
    /// 1-based line number
    pub line_number: usize,
    /// Byte offset of the line start within the file
    #[serde(default)]
    pub absolute_offset: u64,
    #[serde(alias = "replace", default)]
    pub replacement: Option<String>,
}

impl MatchRecord {
    /// Attach a replacement string, consuming the record.
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }
}

/// All matches found in a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatches {
    /// Path relative to the directory the search ran in
    pub path: String,
    pub matches: Vec<MatchRecord>,
}

impl FileMatches {
    pub fn new(path: impl Into<String>, matches: Vec<MatchRecord>) -> Self {
        Self {
            path: path.into(),
            matches,
        }
    }

    /// Set the same replacement on every match of the file.
    pub fn replace_all(&mut self, replacement: &str) {
        for m in &mut self.matches {
            m.replacement = Some(replacement.to_string());
        }
    }
}

/// Failure reported by the search tool itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFailure {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    pub message: String,
}

/// Parsed result of one search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Matches grouped per file, in the order the tool discovered the files.
    /// An empty list means the search ran and found nothing.
    Matches(Vec<FileMatches>),
    Failed(SearchFailure),
}

impl SearchOutcome {
    pub fn matches(&self) -> Option<&[FileMatches]> {
        match self {
            SearchOutcome::Matches(files) => Some(files),
            SearchOutcome::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SearchOutcome::Failed(_))
    }
}

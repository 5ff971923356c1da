//! Translation of search options into a ripgrep command line.
//!
//! The JSON output format is described by the `grep-printer` crate's `JSON`
//! printer: one event per line, tagged `begin`, `match`, `context`, `end` or
//! `summary`.

use serde::Deserialize;

use super::errors::SearchError;

/// Default number of matching lines reported per file.
pub const DEFAULT_MAX_COUNT: i64 = 100;

/// A search request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchOptions {
    pub query: String,
    /// Folder to search in, relative to the service root
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    /// Globs a file must match (at least one) to be searched
    #[serde(default)]
    pub include: Vec<String>,
    /// Globs that exclude a file from the search
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub use_regex: bool,
    /// Maximum number of matching lines per file
    #[serde(default = "default_max_count")]
    pub max_count: i64,
}

fn default_max_count() -> i64 {
    DEFAULT_MAX_COUNT
}

impl SearchOptions {
    /// Literal, case-insensitive search over the whole root.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            path: String::new(),
            case_sensitive: false,
            whole_word: false,
            include: Vec::new(),
            exclude: Vec::new(),
            use_regex: false,
            max_count: DEFAULT_MAX_COUNT,
        }
    }

    pub fn in_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    pub fn whole_word(mut self, yes: bool) -> Self {
        self.whole_word = yes;
        self
    }

    pub fn regex(mut self, yes: bool) -> Self {
        self.use_regex = yes;
        self
    }

    pub fn include(mut self, glob: impl Into<String>) -> Self {
        self.include.push(glob.into());
        self
    }

    pub fn exclude(mut self, glob: impl Into<String>) -> Self {
        self.exclude.push(glob.into());
        self
    }

    pub fn max_count(mut self, max_count: i64) -> Self {
        self.max_count = max_count;
        self
    }
}

/// Build the argument vector for `program` (normally `rg`).
///
/// Include and exclude globs may be combined: ripgrep then searches files
/// matching at least one include glob and none of the exclude globs.
pub fn build_command(program: &str, options: &SearchOptions) -> Result<Vec<String>, SearchError> {
    if options.max_count < 0 {
        return Err(SearchError::invalid_options(format!(
            "max_count must not be negative, got {}",
            options.max_count
        )));
    }

    let mut command = vec![
        program.to_string(),
        "--json".to_string(),
        "--max-count".to_string(),
        options.max_count.to_string(),
    ];

    if !options.use_regex {
        command.push("--fixed-strings".to_string());
    }
    if !options.case_sensitive {
        command.push("--ignore-case".to_string());
    }
    if options.whole_word {
        command.push("--word-regexp".to_string());
    }

    for glob in &options.include {
        command.push("-g".to_string());
        command.push(glob.clone());
    }
    for glob in &options.exclude {
        command.push("-g".to_string());
        command.push(format!("!{glob}"));
    }

    // Queries starting with '-' must not be read as flags
    command.push("--".to_string());
    command.push(options.query.clone());

    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(options: &SearchOptions) -> Vec<String> {
        build_command("rg", options).unwrap()
    }

    #[test]
    fn test_default_command() {
        let command = build(&SearchOptions::new("strange"));
        assert_eq!(
            command,
            vec![
                "rg",
                "--json",
                "--max-count",
                "100",
                "--fixed-strings",
                "--ignore-case",
                "--",
                "strange"
            ]
        );
    }

    #[test]
    fn test_regex_case_sensitive_whole_word() {
        let options = SearchOptions::new("str.*")
            .regex(true)
            .case_sensitive(true)
            .whole_word(true);
        let command = build(&options);
        assert!(!command.contains(&"--fixed-strings".to_string()));
        assert!(!command.contains(&"--ignore-case".to_string()));
        assert!(command.contains(&"--word-regexp".to_string()));
    }

    #[test]
    fn test_include_and_exclude_together() {
        let options = SearchOptions::new("x")
            .include("*_sub.txt")
            .include("*.md")
            .exclude("*_1.txt");
        let command = build(&options);
        let globs: Vec<&str> = command
            .windows(2)
            .filter(|w| w[0] == "-g")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(globs, vec!["*_sub.txt", "*.md", "!*_1.txt"]);
    }

    #[test]
    fn test_dash_query_follows_separator() {
        let command = build(&SearchOptions::new("-foo"));
        let n = command.len();
        assert_eq!(command[n - 2], "--");
        assert_eq!(command[n - 1], "-foo");
    }

    #[test]
    fn test_negative_max_count_rejected() {
        let result = build_command("rg", &SearchOptions::new("x").max_count(-1));
        assert!(matches!(result, Err(SearchError::InvalidOptions { .. })));
    }

    #[test]
    fn test_custom_program_and_max_count() {
        let command = build_command("/opt/bin/rg", &SearchOptions::new("x").max_count(7)).unwrap();
        assert_eq!(command[0], "/opt/bin/rg");
        assert_eq!(&command[2..4], &["--max-count".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: SearchOptions = serde_json::from_str(r#"{"query": "hi"}"#).unwrap();
        assert_eq!(options, SearchOptions::new("hi"));
    }
}

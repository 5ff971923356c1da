//! The search/replace service: the surface callers talk to.
//!
//! Every failure is turned into a payload here. [`SearchReplace::search`]
//! never returns an error; tool failures, bad input and cancellation all
//! come back as a [`SearchResponse::Failure`] with a numeric code.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::replace::{
    apply_replacements, Checkpoint, FileCheckpoints, ReplaceError, ReplaceResult,
};
use crate::safety::{expand_home, join_request_path, SafetyError, WorkspaceGuard};
use crate::search::{
    build_command, FileMatches, ProcessRunner, SearchError, SearchFailure, SearchOptions,
    SearchOutcome, SearchSupervisor,
};

/// Failure code of a search superseded by a later one.
///
/// A failure from the tool itself carries the tool's exit code instead, and
/// ripgrep exits with 1 or 2 on errors. Those payloads share a code with this
/// one and with [`CODE_TOOL_NOT_FOUND`]; only the message tells them apart.
pub const CODE_CANCELLED: i32 = 1;
/// Failure code when the search binary cannot be found. See [`CODE_CANCELLED`]
/// for the overlap with ripgrep's own exit codes.
pub const CODE_TOOL_NOT_FOUND: i32 = 2;
pub const CODE_INVALID_OPTIONS: i32 = 3;
pub const CODE_INVALID_PATH: i32 = 4;
/// Failure code for I/O errors while running the tool.
pub const CODE_IO: i32 = 5;

/// Response of a search, as serialised to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Matches { matches: Vec<FileMatches> },
    Failure(SearchFailure),
}

impl SearchResponse {
    pub fn is_failure(&self) -> bool {
        matches!(self, SearchResponse::Failure(_))
    }

    pub fn matches(&self) -> Option<&[FileMatches]> {
        match self {
            SearchResponse::Matches { matches } => Some(matches),
            SearchResponse::Failure(_) => None,
        }
    }

    /// Payload for an error raised before or while running the tool.
    pub fn from_error(error: &SearchError, command: Vec<String>) -> Self {
        let (code, message) = match error {
            SearchError::Cancelled => (CODE_CANCELLED, "Task was cancelled.".to_string()),
            SearchError::ToolNotFound { .. } => {
                (CODE_TOOL_NOT_FOUND, "ripgrep command not found.".to_string())
            }
            SearchError::InvalidOptions { .. } => (CODE_INVALID_OPTIONS, error.to_string()),
            SearchError::InvalidPath(_) => (CODE_INVALID_PATH, error.to_string()),
            SearchError::Spawn { .. } | SearchError::Io(_) => (CODE_IO, error.to_string()),
        };
        SearchResponse::Failure(SearchFailure {
            code,
            command,
            message,
        })
    }
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Matches(matches) => SearchResponse::Matches { matches },
            SearchOutcome::Failed(failure) => SearchResponse::Failure(failure),
        }
    }
}

/// A replace pass: matches from a search, with replacements filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRequest {
    pub matches: Vec<FileMatches>,
    /// Folder the match paths are relative to (the search's `path`)
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Replaced {
        lines_changed: usize,
        replacements: usize,
    },
    Unchanged,
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Per-file outcome of a replace pass, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceReport {
    pub files: Vec<FileReport>,
}

impl ReplaceReport {
    pub fn from_results(results: Vec<(String, Result<ReplaceResult, ReplaceError>)>) -> Self {
        let files = results
            .into_iter()
            .map(|(path, result)| {
                let status = match result {
                    Ok(ReplaceResult::Applied {
                        lines_changed,
                        replacements,
                        ..
                    }) => FileStatus::Replaced {
                        lines_changed,
                        replacements,
                    },
                    Ok(ReplaceResult::Unchanged { .. }) => FileStatus::Unchanged,
                    Err(e) => FileStatus::Failed {
                        message: e.to_string(),
                    },
                };
                FileReport { path, status }
            })
            .collect();
        Self { files }
    }

    pub fn has_failures(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.status, FileStatus::Failed { .. }))
    }

    /// Total replacements written across all files.
    pub fn replacements(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.status {
                FileStatus::Replaced { replacements, .. } => replacements,
                _ => 0,
            })
            .sum()
    }
}

/// Search and replace confined to one root directory.
pub struct SearchReplace {
    guard: WorkspaceGuard,
    supervisor: SearchSupervisor,
    program: String,
    checkpoints: Option<FileCheckpoints>,
}

impl SearchReplace {
    /// Service over `root` with default settings.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        Self::from_config(&Config::default(), Some(root.as_ref()))
    }

    /// Service built from `config`. `root` overrides `config.root`; with
    /// neither, the current directory is used.
    pub fn from_config(config: &Config, root: Option<&Path>) -> Result<Self, SafetyError> {
        let root = match (root, &config.root) {
            (Some(root), _) => root.to_path_buf(),
            (None, Some(root)) => expand_home(root),
            (None, None) => std::env::current_dir().map_err(|source| SafetyError::Resolve {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let checkpoint_dir = config.replace.checkpoint_dir.clone();
        let guard = WorkspaceGuard::new(root)?.forbid_dir_name(checkpoint_dir.as_str());
        let checkpoints = config
            .replace
            .checkpoint
            .then(|| FileCheckpoints::new(checkpoint_dir));

        tracing::debug!(
            root = %guard.workspace_root().display(),
            program = %config.search.program,
            checkpoints = checkpoints.is_some(),
            "search service ready"
        );

        Ok(Self {
            guard,
            supervisor: SearchSupervisor::new(ProcessRunner::new(config.search.log_preview_chars)),
            program: config.search.program.clone(),
            checkpoints,
        })
    }

    /// Use `program` instead of the configured search binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the checkpoint store; `None` disables checkpoints.
    pub fn with_checkpoints(mut self, checkpoints: Option<FileCheckpoints>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn root(&self) -> &Path {
        self.guard.workspace_root()
    }

    pub fn guard(&self) -> &WorkspaceGuard {
        &self.guard
    }

    pub fn checkpoints(&self) -> Option<&FileCheckpoints> {
        self.checkpoints.as_ref()
    }

    /// Run a search. A call made while another search runs supersedes it;
    /// the earlier call then returns a cancelled failure.
    pub async fn search(&self, options: &SearchOptions) -> SearchResponse {
        let cwd = match self.search_dir(&options.path) {
            Ok(cwd) => cwd,
            Err(e) => return SearchResponse::from_error(&e, Vec::new()),
        };
        let command = match build_command(&self.program, options) {
            Ok(command) => command,
            Err(e) => return SearchResponse::from_error(&e, Vec::new()),
        };
        // ripgrep has no "zero matches" mode: `--max-count 0` exits 1 with
        // no summary, which would read as a failure
        if options.max_count == 0 {
            tracing::debug!(query = %options.query, "max_count is 0, nothing to search");
            return SearchResponse::Matches {
                matches: Vec::new(),
            };
        }

        match self.supervisor.run_search(&command, &cwd).await {
            Ok(outcome) => {
                if let SearchOutcome::Failed(failure) = &outcome {
                    tracing::warn!(code = failure.code, query = %options.query, "search failed");
                }
                outcome.into()
            }
            Err(e) => {
                if e.is_cancelled() {
                    tracing::debug!(query = %options.query, "search cancelled");
                } else {
                    tracing::error!(error = %e, "search could not run");
                }
                SearchResponse::from_error(&e, command)
            }
        }
    }

    /// Cancel the running search, if any.
    pub async fn cancel(&self) {
        self.supervisor.cancel_current().await;
    }

    /// Apply the replacements in `request`, file by file.
    pub async fn replace(&self, request: ReplaceRequest) -> Result<ReplaceReport, ReplaceError> {
        let guard = self.guard.clone();
        let checkpoints = self.checkpoints.clone();

        let results = tokio::task::spawn_blocking(move || {
            apply_replacements(
                &request.matches,
                &request.path,
                &guard,
                checkpoints.as_ref().map(|c| c as &dyn Checkpoint),
            )
        })
        .await
        .map_err(|e| ReplaceError::Io(std::io::Error::other(e)))?;

        let report = ReplaceReport::from_results(results);
        tracing::info!(
            files = report.files.len(),
            replacements = report.replacements(),
            "replace finished"
        );
        Ok(report)
    }

    fn search_dir(&self, path: &str) -> Result<PathBuf, SearchError> {
        let relative = join_request_path("", path);
        let resolved = self
            .guard
            .validate_path(&relative)
            .map_err(|_| SearchError::InvalidPath(relative.clone()))?;
        if !resolved.is_dir() {
            return Err(SearchError::InvalidPath(relative));
        }
        Ok(resolved)
    }
}

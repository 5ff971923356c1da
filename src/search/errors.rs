use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid search options: {message}")]
    InvalidOptions { message: String },

    #[error("search path is not a directory: {0}")]
    InvalidPath(PathBuf),

    #[error("search tool not found: {program}")]
    ToolNotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("search was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    pub fn invalid_options(message: impl Into<String>) -> Self {
        SearchError::InvalidOptions {
            message: message.into(),
        }
    }

    /// Whether the search was superseded or dropped rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

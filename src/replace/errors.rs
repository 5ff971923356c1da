use std::path::PathBuf;
use thiserror::Error;

use crate::safety::SafetyError;

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Line {line_number} is out of range (file has {line_count} lines)")]
    LineOutOfRange {
        line_number: usize,
        line_count: usize,
    },

    #[error("Invalid byte range on line {line_number}: [{start}, {end}) in line of length {line_len}")]
    InvalidByteRange {
        line_number: usize,
        start: usize,
        end: usize,
        line_len: usize,
    },

    #[error("Overlapping replacements on line {line_number}: [{start}, ..) begins before {previous_end}")]
    Overlap {
        line_number: usize,
        start: usize,
        previous_end: usize,
    },

    #[error("Replacement on line {line_number} would create malformed UTF-8")]
    InvalidUtf8Edit { line_number: usize },

    #[error("Invalid replace pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Safety(SafetyError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SafetyError> for ReplaceError {
    fn from(error: SafetyError) -> Self {
        match error {
            SafetyError::Resolve { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ReplaceError::NotFound(path)
            }
            other => ReplaceError::Safety(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("No checkpoint exists for {0}")]
    Missing(PathBuf),

    #[error("Cannot checkpoint {0}: not a regular file")]
    NotAFile(PathBuf),

    #[error("Checkpoint I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

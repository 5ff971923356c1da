//! Pre-edit checkpoints.
//!
//! The replace engine calls a [`Checkpoint`] before rewriting a file so the
//! previous content stays recoverable. [`FileCheckpoints`] keeps one copy per
//! file next to it: `dir/<checkpoint_dir>/<stem>-checkpoint<.ext>`.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::engine::atomic_write;
use super::errors::CheckpointError;

/// Default name of the per-directory checkpoint folder.
pub const DEFAULT_CHECKPOINT_DIR: &str = ".checkpoints";

const CHECKPOINT_SUFFIX: &str = "-checkpoint";

/// Capability to snapshot a file before it is modified.
pub trait Checkpoint: Send + Sync {
    /// Save the current content of `path` (absolute).
    fn create_checkpoint(&self, path: &Path) -> Result<(), CheckpointError>;
}

/// Checkpoints stored as plain copies in a hidden sibling directory.
#[derive(Debug, Clone)]
pub struct FileCheckpoints {
    dir_name: String,
}

impl Default for FileCheckpoints {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_DIR)
    }
}

impl FileCheckpoints {
    pub fn new(dir_name: impl Into<String>) -> Self {
        Self {
            dir_name: dir_name.into(),
        }
    }

    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }

    /// Where the checkpoint of `file` lives.
    pub fn checkpoint_path(&self, file: &Path) -> PathBuf {
        let parent = file.parent().unwrap_or_else(|| Path::new(""));
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match file.extension() {
            Some(ext) => format!("{stem}{CHECKPOINT_SUFFIX}.{}", ext.to_string_lossy()),
            None => format!("{stem}{CHECKPOINT_SUFFIX}"),
        };
        parent.join(&self.dir_name).join(name)
    }

    /// Map a checkpoint file back to the file it was taken from.
    pub fn original_path(&self, checkpoint: &Path) -> Option<PathBuf> {
        let dir = checkpoint.parent()?;
        if dir.file_name()?.to_str()? != self.dir_name {
            return None;
        }
        let stem = checkpoint.file_stem()?.to_str()?;
        let original_stem = stem.strip_suffix(CHECKPOINT_SUFFIX)?;
        let name = match checkpoint.extension() {
            Some(ext) => format!("{original_stem}.{}", ext.to_string_lossy()),
            None => original_stem.to_string(),
        };
        Some(dir.parent()?.join(name))
    }

    /// Overwrite `file` with its checkpoint.
    pub fn restore_checkpoint(&self, file: &Path) -> Result<(), CheckpointError> {
        let checkpoint = self.checkpoint_path(file);
        let content = fs::read(&checkpoint).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CheckpointError::Missing(file.to_path_buf())
            } else {
                CheckpointError::Io {
                    path: checkpoint.clone(),
                    source,
                }
            }
        })?;

        atomic_write(file, &content).map_err(|source| CheckpointError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        tracing::info!(file = %file.display(), "restored checkpoint");
        Ok(())
    }

    /// All checkpoint files below `root`, sorted.
    pub fn list_checkpoints(&self, root: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.original_path(path).is_some())
            .collect();
        found.sort();
        found
    }
}

impl Checkpoint for FileCheckpoints {
    fn create_checkpoint(&self, path: &Path) -> Result<(), CheckpointError> {
        if !path.is_file() {
            return Err(CheckpointError::NotAFile(path.to_path_buf()));
        }

        let checkpoint = self.checkpoint_path(path);
        let io_err = |source| CheckpointError::Io {
            path: checkpoint.clone(),
            source,
        };
        if let Some(dir) = checkpoint.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        fs::copy(path, &checkpoint).map_err(io_err)?;

        tracing::debug!(file = %path.display(), checkpoint = %checkpoint.display(), "created checkpoint");
        Ok(())
    }
}

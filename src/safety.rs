use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Confines request paths to the directory the service was started on.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical path of the root
    workspace_root: PathBuf,
    /// Directory names that must never be searched into or rewritten
    forbidden_names: Vec<OsString>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside the root: {path} (root: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is inside a protected directory: {path} ({name})")]
    ForbiddenPath { path: PathBuf, name: String },

    #[error("Failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SafetyError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SafetyError::Resolve { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl WorkspaceGuard {
    /// Create a guard for `workspace_root`.
    ///
    /// A leading `~` is expanded to the home directory, then the root is
    /// canonicalized so symlinked roots compare correctly.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let expanded = expand_home(workspace_root.as_ref());
        let workspace_root = expanded
            .canonicalize()
            .map_err(|source| SafetyError::Resolve {
                path: expanded.clone(),
                source,
            })?;

        Ok(Self {
            workspace_root,
            forbidden_names: Vec::new(),
        })
    }

    /// Refuse any path that has a component named `name`.
    pub fn forbid_dir_name(mut self, name: impl Into<OsString>) -> Self {
        self.forbidden_names.push(name.into());
        self
    }

    /// Resolve a root-relative path and check it stays under the root.
    ///
    /// Returns the canonical absolute path. The target must exist.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        // Canonicalize to resolve symlinks and .. components
        let canonical = absolute
            .canonicalize()
            .map_err(|source| SafetyError::Resolve {
                path: absolute.clone(),
                source,
            })?;

        self.check_canonical(&canonical)?;

        Ok(canonical)
    }

    /// Resolve a request path made of a base folder and a file path relative
    /// to it, both using `/` separators.
    pub fn resolve(&self, base: &str, relative: &str) -> Result<PathBuf, SafetyError> {
        self.validate_path(join_request_path(base, relative))
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        let inside = canonical
            .strip_prefix(&self.workspace_root)
            .unwrap_or(canonical);
        for component in inside.components() {
            if let Component::Normal(name) = component {
                if self.forbidden_names.iter().any(|f| f == name) {
                    return Err(SafetyError::ForbiddenPath {
                        path: canonical.to_path_buf(),
                        name: name.to_string_lossy().into_owned(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get the canonical root.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

/// Join a `/`-separated request folder and file path into a relative path.
pub fn join_request_path(base: &str, relative: &str) -> PathBuf {
    base.split('/')
        .chain(relative.split('/'))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

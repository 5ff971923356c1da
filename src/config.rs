//! TOML configuration.
//!
//! ```toml
//! root = "~/notes"
//!
//! [search]
//! program = "rg"
//! max_count = 100
//! log_preview_chars = 6000
//!
//! [replace]
//! checkpoint = true
//! checkpoint_dir = ".checkpoints"
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::replace::DEFAULT_CHECKPOINT_DIR;
use crate::search::{DEFAULT_MAX_COUNT, MAX_LOG_OUTPUT};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "RG_REPLACE_CONFIG";

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory searches and replacements are confined to
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub replace: ReplaceSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Search binary, looked up on PATH
    pub program: String,
    /// Default per-file match limit
    pub max_count: i64,
    /// How much of a failing search's output is logged
    pub log_preview_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            program: "rg".to_string(),
            max_count: DEFAULT_MAX_COUNT,
            log_preview_chars: MAX_LOG_OUTPUT,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ReplaceSettings {
    /// Take a checkpoint before each file is rewritten
    pub checkpoint: bool,
    pub checkpoint_dir: String,
}

impl Default for ReplaceSettings {
    fn default() -> Self {
        Self {
            checkpoint: true,
            checkpoint_dir: DEFAULT_CHECKPOINT_DIR.to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.search.program.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "search.program",
            });
        }
        if self.search.max_count < 0 {
            issues.push(ValidationIssue::InvalidValue {
                field: "search.max_count",
                message: format!("must not be negative (got {})", self.search.max_count),
            });
        }

        let dir = self.replace.checkpoint_dir.trim();
        if dir.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "replace.checkpoint_dir",
            });
        } else if dir == "." || dir == ".." || dir.contains(['/', '\\']) {
            issues.push(ValidationIssue::InvalidValue {
                field: "replace.checkpoint_dir",
                message: format!("must be a plain directory name (got {dir:?})"),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => write!(f, "{field} must not be empty"),
            ValidationIssue::InvalidValue { field, message } => write!(f, "{field} {message}"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse config TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<Config, ConfigError> {
    let config: Config = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load the config named by `explicit`, else by `RG_REPLACE_CONFIG`, else
/// the defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => load_from_path(PathBuf::from(path)),
        _ => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_from_str("").unwrap();
        assert!(config.root.is_none());
        assert_eq!(config.search.program, "rg");
        assert_eq!(config.search.max_count, 100);
        assert_eq!(config.search.log_preview_chars, 6000);
        assert!(config.replace.checkpoint);
        assert_eq!(config.replace.checkpoint_dir, ".checkpoints");
    }

    #[test]
    fn test_partial_sections() {
        let config = load_from_str(
            r#"
root = "/srv/notes"

[search]
max_count = 5

[replace]
checkpoint = false
"#,
        )
        .unwrap();
        assert_eq!(config.root, Some(PathBuf::from("/srv/notes")));
        assert_eq!(config.search.program, "rg");
        assert_eq!(config.search.max_count, 5);
        assert!(!config.replace.checkpoint);
        assert_eq!(config.replace.checkpoint_dir, ".checkpoints");
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let err = load_from_str(
            r#"
[search]
program = " "
max_count = -1

[replace]
checkpoint_dir = "a/b"
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Validation { source, .. } => assert_eq!(source.issues.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_key_is_toml_error() {
        let err = load_from_str("[search]\nprogramme = \"rg\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_load_from_path_attaches_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("rg-replace.toml");
        fs::write(&path, "[search]\nmax_count = -3\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("rg-replace.toml"));
        assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_from_path("/nonexistent/rg-replace.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

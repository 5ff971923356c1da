//! rg-replace: ripgrep-backed search with byte-accurate replace
//!
//! Searching is delegated to `rg --json`; this crate builds the command line,
//! supervises the child process and turns its event stream into per-file
//! match lists carrying both byte and codepoint offsets. Those lists, with a
//! replacement attached to selected matches, drive the replace pass.
//!
//! # Architecture
//!
//! - [`search`]: command construction, process execution, single-flight
//!   supervision and event parsing
//! - [`replace`]: line-based raw-byte rewriting and pre-edit checkpoints
//! - [`service`]: the [`SearchReplace`] facade that maps every failure to a
//!   response payload
//!
//! # Safety
//!
//! - Every edit is validated before a file is written
//! - Atomic file writes (tempfile + fsync + rename)
//! - Request paths are confined to the service root
//! - Lines without edits are copied byte for byte
//!
//! # Example
//!
//! ```no_run
//! use rg_replace::{ReplaceRequest, SearchOptions, SearchReplace};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = SearchReplace::new("/srv/notes")?;
//! let response = service.search(&SearchOptions::new("strange")).await;
//!
//! if let Some(files) = response.matches() {
//!     let mut files = files.to_vec();
//!     for file in &mut files {
//!         file.replace_all("hello");
//!     }
//!     let report = service
//!         .replace(ReplaceRequest { matches: files, path: String::new() })
//!         .await?;
//!     println!("{} replacements", report.replacements());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod replace;
pub mod safety;
pub mod search;
pub mod service;

// Re-exports
pub use config::{load_from_path, load_from_str, Config, ConfigError};
pub use replace::{
    apply_replacements, rewrite_lines, Checkpoint, CheckpointError, FileCheckpoints,
    ReplaceError, ReplaceResult, Substitution,
};
pub use safety::{SafetyError, WorkspaceGuard};
pub use search::{
    build_command, FileMatches, MatchRecord, SearchError, SearchFailure, SearchOptions,
    SearchOutcome, SearchSupervisor,
};
pub use service::{
    FileReport, FileStatus, ReplaceReport, ReplaceRequest, SearchReplace, SearchResponse,
};

//! Search over a directory tree by delegating to ripgrep.
//!
//! The pipeline is: [`build_command`] turns [`SearchOptions`] into an argument
//! vector, [`SearchSupervisor`] runs it (cancelling any search still in
//! flight) through a [`ProcessRunner`], and [`parse_output`] turns the JSON
//! event stream into per-file [`MatchRecord`]s with codepoint offsets.

pub mod command;
pub mod errors;
pub mod model;
pub mod parser;
pub mod process;
pub mod supervisor;

pub use command::{build_command, SearchOptions, DEFAULT_MAX_COUNT};
pub use errors::SearchError;
pub use model::{FileMatches, MatchRecord, SearchFailure, SearchOutcome};
pub use parser::{char_offset, parse_events, parse_output, EventParser};
pub use process::{ProcessOutput, ProcessRunner, MAX_LOG_OUTPUT};
pub use supervisor::SearchSupervisor;

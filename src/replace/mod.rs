//! Byte-accurate replacement of search matches.
//!
//! Input is the per-file match list produced by a search, with a
//! replacement attached to the matches that should change. Offsets are byte
//! offsets within a line, so multi-byte text is rewritten exactly.

pub mod checkpoint;
pub mod engine;
pub mod errors;
pub mod substitute;

pub use checkpoint::{Checkpoint, FileCheckpoints, DEFAULT_CHECKPOINT_DIR};
pub use engine::{
    apply_replacements, plan_replacements, replace_in_file, rewrite_lines, PlannedRewrite,
    ReplaceResult, Rewrite,
};
pub use errors::{CheckpointError, ReplaceError};
pub use substitute::Substitution;

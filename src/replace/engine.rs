use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::safety::WorkspaceGuard;
use crate::search::{FileMatches, MatchRecord};

use super::checkpoint::Checkpoint;
use super::errors::ReplaceError;

/// One byte-span replacement on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span<'a> {
    start: usize,
    end: usize,
    replacement: &'a [u8],
}

/// New file content produced from a set of line edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: Vec<u8>,
    pub lines_changed: usize,
    pub replacements: usize,
}

/// Outcome of replacing in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "ReplaceResult should be checked for applied/unchanged"]
pub enum ReplaceResult {
    /// The file was rewritten
    Applied {
        file: PathBuf,
        lines_changed: usize,
        replacements: usize,
    },
    /// No match carried a replacement; the file was not touched
    Unchanged { file: PathBuf },
}

/// Preview of a replacement that was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRewrite {
    pub file: PathBuf,
    pub before: Vec<u8>,
    pub after: Rewrite,
}

/// Rewrite `content` by applying every match that carries a replacement.
///
/// Lines are handled as raw bytes with their terminators. Only lines holding
/// at least one edit are rebuilt; every other byte is copied unchanged.
/// Edits on a line are applied in ascending `start` order whatever their
/// order in `matches`. All edits are validated before output is produced.
pub fn rewrite_lines(content: &[u8], matches: &[MatchRecord]) -> Result<Rewrite, ReplaceError> {
    let grouped = group_by_line(matches);
    let replacements = grouped.values().map(Vec::len).sum();
    if grouped.is_empty() {
        return Ok(Rewrite {
            content: content.to_vec(),
            lines_changed: 0,
            replacements,
        });
    }

    let lines: Vec<&[u8]> = content.split_inclusive(|b| *b == b'\n').collect();

    let mut rebuilt = BTreeMap::new();
    for (&line_number, spans) in &grouped {
        if line_number == 0 || line_number > lines.len() {
            return Err(ReplaceError::LineOutOfRange {
                line_number,
                line_count: lines.len(),
            });
        }
        let line = rebuild_line(lines[line_number - 1], line_number, spans)?;
        rebuilt.insert(line_number, line);
    }

    let mut output = Vec::with_capacity(content.len());
    for (idx, line) in lines.iter().enumerate() {
        match rebuilt.get(&(idx + 1)) {
            Some(new_line) => output.extend_from_slice(new_line),
            None => output.extend_from_slice(line),
        }
    }

    Ok(Rewrite {
        content: output,
        lines_changed: rebuilt.len(),
        replacements,
    })
}

/// Group the edits of a file by 1-based line, each group sorted by `start`.
fn group_by_line(matches: &[MatchRecord]) -> BTreeMap<usize, Vec<Span<'_>>> {
    let mut grouped: BTreeMap<usize, Vec<Span<'_>>> = BTreeMap::new();
    for m in matches {
        let Some(replacement) = m.replacement.as_deref() else {
            continue;
        };
        grouped.entry(m.line_number).or_default().push(Span {
            start: m.start,
            end: m.end,
            replacement: replacement.as_bytes(),
        });
    }
    for spans in grouped.values_mut() {
        spans.sort_by_key(|span| span.start);
    }
    grouped
}

fn rebuild_line(line: &[u8], line_number: usize, spans: &[Span<'_>]) -> Result<Vec<u8>, ReplaceError> {
    let added: usize = spans.iter().map(|s| s.replacement.len()).sum();
    let mut output = Vec::with_capacity(line.len() + added);
    let mut cursor = 0;

    for span in spans {
        if span.start > span.end || span.end > line.len() {
            return Err(ReplaceError::InvalidByteRange {
                line_number,
                start: span.start,
                end: span.end,
                line_len: line.len(),
            });
        }
        if span.start < cursor {
            return Err(ReplaceError::Overlap {
                line_number,
                start: span.start,
                previous_end: cursor,
            });
        }
        output.extend_from_slice(&line[cursor..span.start]);
        output.extend_from_slice(span.replacement);
        cursor = span.end;
    }
    output.extend_from_slice(&line[cursor..]);

    // Only text lines are checked; binary-ish lines are passed through as bytes
    if std::str::from_utf8(line).is_ok() && std::str::from_utf8(&output).is_err() {
        return Err(ReplaceError::InvalidUtf8Edit { line_number });
    }

    Ok(output)
}

/// Apply the replacements of `matches` to the file at `path` (absolute).
///
/// Nothing is written unless every edit is valid. When `checkpoint` is given
/// it is called before the file is modified.
pub fn replace_in_file(
    path: &Path,
    matches: &[MatchRecord],
    checkpoint: Option<&dyn Checkpoint>,
) -> Result<ReplaceResult, ReplaceError> {
    let original = read_existing(path)?;
    let rewrite = rewrite_lines(&original, matches)?;

    if rewrite.replacements == 0 {
        return Ok(ReplaceResult::Unchanged {
            file: path.to_path_buf(),
        });
    }

    if let Some(checkpoint) = checkpoint {
        tracing::debug!(file = %path.display(), "creating checkpoint");
        checkpoint.create_checkpoint(path)?;
    }

    atomic_write(path, &rewrite.content)?;
    tracing::debug!(
        file = %path.display(),
        lines = rewrite.lines_changed,
        replacements = rewrite.replacements,
        "replaced matches"
    );

    Ok(ReplaceResult::Applied {
        file: path.to_path_buf(),
        lines_changed: rewrite.lines_changed,
        replacements: rewrite.replacements,
    })
}

/// Apply replacements file by file below `base` (a root-relative folder).
///
/// Files are independent: a failure is reported for that file and the
/// remaining files are still processed. Nothing is rolled back.
pub fn apply_replacements(
    edits: &[FileMatches],
    base: &str,
    guard: &WorkspaceGuard,
    checkpoint: Option<&dyn Checkpoint>,
) -> Vec<(String, Result<ReplaceResult, ReplaceError>)> {
    edits
        .iter()
        .map(|file| {
            let result = guard
                .resolve(base, &file.path)
                .map_err(ReplaceError::from)
                .and_then(|path| replace_in_file(&path, &file.matches, checkpoint));
            if let Err(e) = &result {
                tracing::warn!(path = %file.path, error = %e, "replace failed");
            }
            (file.path.clone(), result)
        })
        .collect()
}

/// Compute the rewrites of `edits` without touching the files.
pub fn plan_replacements(
    edits: &[FileMatches],
    base: &str,
    guard: &WorkspaceGuard,
) -> Vec<(String, Result<PlannedRewrite, ReplaceError>)> {
    edits
        .iter()
        .map(|file| {
            let result = guard
                .resolve(base, &file.path)
                .map_err(ReplaceError::from)
                .and_then(|path| {
                    let before = read_existing(&path)?;
                    let after = rewrite_lines(&before, &file.matches)?;
                    Ok(PlannedRewrite {
                        file: path,
                        before,
                        after,
                    })
                });
            (file.path.clone(), result)
        })
        .collect()
}

fn read_existing(path: &Path) -> Result<Vec<u8>, ReplaceError> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReplaceError::NotFound(path.to_path_buf())
        } else {
            ReplaceError::Io(e)
        }
    })
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The tempfile is created next to `path` so the rename stays on one
/// filesystem, and takes over the original file's permissions.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

//! Child process execution with cooperative cancellation.

use std::borrow::Cow;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::errors::SearchError;

/// Default cap on the characters of tool output echoed to the debug log.
pub const MAX_LOG_OUTPUT: usize = 6000;

/// Exit code and the text a finished process produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: i32,
    /// stdout on success; on failure stdout if non-empty, otherwise stderr
    pub output: String,
}

/// Runs an argument vector as a child process on the tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    preview_chars: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(MAX_LOG_OUTPUT)
    }
}

impl ProcessRunner {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// Execute `argv` in `cwd` until it exits or `cancel` fires.
    ///
    /// On cancellation the child is killed and reaped before
    /// [`SearchError::Cancelled`] is returned.
    pub async fn execute(
        &self,
        argv: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, SearchError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SearchError::invalid_options("empty command line"))?;

        tracing::debug!(command = %argv.join(" "), cwd = %cwd.display(), "run search tool");

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| spawn_error(program, source))?;

        // Drain both pipes concurrently so a chatty child never blocks on a full pipe
        let stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let stderr_task = tokio::spawn(read_all(child.stderr.take()));

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = cancel.cancelled() => None,
        };

        let status = match waited {
            Some(status) => status?,
            None => {
                terminate(program, &mut child).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(SearchError::Cancelled);
            }
        };

        let stdout = join_reader(stdout_task).await?;
        let stderr = join_reader(stderr_task).await?;

        let result = self.collect(status, &stdout, &stderr);
        tracing::debug!(
            code = result.code,
            output = %preview(&result.output, self.preview_chars),
            "search tool finished"
        );
        Ok(result)
    }

    fn collect(&self, status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> ProcessOutput {
        let code = status.code().unwrap_or(-1);
        if code == 0 {
            return ProcessOutput {
                code,
                output: String::from_utf8_lossy(stdout).into_owned(),
            };
        }

        tracing::debug!(code, "search tool exited with non-zero status");
        let error = String::from_utf8_lossy(stderr).into_owned();
        if stdout.is_empty() {
            ProcessOutput {
                code,
                output: error,
            }
        } else {
            // ripgrep exits with 1 and a summary on stdout when nothing matched
            tracing::debug!(stderr = %error, "search tool diagnostics");
            ProcessOutput {
                code,
                output: String::from_utf8_lossy(stdout).into_owned(),
            }
        }
    }
}

fn spawn_error(program: &str, source: std::io::Error) -> SearchError {
    if source.kind() == std::io::ErrorKind::NotFound {
        SearchError::ToolNotFound {
            program: program.to_string(),
        }
    } else {
        SearchError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

async fn terminate(program: &str, child: &mut Child) {
    tracing::debug!(program = %program, "terminating cancelled search tool");
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "kill failed, child probably already exited");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "failed to reap cancelled search tool");
    }
}

async fn read_all<R>(reader: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn join_reader(task: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, SearchError> {
    let bytes = task.await.map_err(std::io::Error::other)??;
    Ok(bytes)
}

/// Truncate `text` to `max_chars` characters for logging, marking the cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &text[..idx])),
        None => Cow::Borrowed(text),
    }
}

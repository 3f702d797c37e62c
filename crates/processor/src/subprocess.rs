//! Bounded subprocess execution with output capture.
//!
//! The child is spawned with `kill_on_drop` so a timeout reliably
//! terminates it; stdout and stderr are read concurrently with the wait
//! and capped to keep a pathologically verbose tool from exhausting memory.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::Duration;

use crate::{ProcessorError, ProcessorOutput};

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Spawn `cmd`, capture stdout/stderr, and enforce `timeout`.
///
/// The caller sets the program and arguments; a non-zero exit status is
/// reported as [`ProcessorError::ExecutionFailed`] with the captured
/// diagnostic text.
pub async fn run_command(
    cmd: &mut Command,
    timeout: Duration,
) -> Result<ProcessorOutput, ProcessorError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    // Read streams in spawned tasks so `child.wait()` can proceed.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let wait_result = tokio::time::timeout(timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
            let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

            if !status.success() {
                let exit_code = status.code().unwrap_or(-1);
                return Err(ProcessorError::ExecutionFailed {
                    exit_code,
                    detail: diagnostic_text(&stdout, &stderr),
                });
            }

            Ok(ProcessorOutput {
                stdout,
                stderr,
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ProcessorError::Io(e)),
        Err(_elapsed) => {
            // Timeout expired. Dropping `child` kills the process because
            // of `kill_on_drop(true)`.
            Err(ProcessorError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Combine captured streams into the diagnostic text recorded on a failed
/// job: stderr first, then a stdout tail for context.
pub fn diagnostic_text(stdout: &str, stderr: &str) -> String {
    const STDOUT_TAIL: usize = 2048;

    let mut tail_start = stdout.len().saturating_sub(STDOUT_TAIL);
    while !stdout.is_char_boundary(tail_start) {
        tail_start += 1;
    }
    let stdout_tail = &stdout[tail_start..];

    match (stderr.trim().is_empty(), stdout_tail.trim().is_empty()) {
        (false, false) => format!("{}\n--- stdout ---\n{}", stderr.trim(), stdout_tail.trim()),
        (false, true) => stderr.trim().to_string(),
        (true, false) => stdout_tail.trim().to_string(),
        (true, true) => "no diagnostic output captured".to_string(),
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

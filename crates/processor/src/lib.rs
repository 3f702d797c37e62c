//! External geometry processor boundary.
//!
//! The 3D tool that performs the actual mesh transformation is a black box
//! reachable only through a command-line contract. This crate owns that
//! boundary: building the headless invocation, running it as a bounded
//! subprocess, and verifying the expected outputs. The [`GeometryProcessor`]
//! trait lets the worker loop take a test double instead of a real tool.

pub mod blender;
pub mod subprocess;

use std::path::PathBuf;

use async_trait::async_trait;
use vestra_core::invocation::Invocation;

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Processor timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Processor failed with exit code {exit_code}: {detail}")]
    ExecutionFailed { exit_code: i32, detail: String },

    #[error("Processor reported success but output is missing or empty: {}", .path.display())]
    MissingOutput { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured output of a successful processor run.
#[derive(Debug, Clone)]
pub struct ProcessorOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// One bounded execution of the external geometry tool.
///
/// A successful return guarantees both output files named in the
/// invocation exist and are non-empty.
#[async_trait]
pub trait GeometryProcessor: Send + Sync {
    async fn process(&self, invocation: &Invocation) -> Result<ProcessorOutput, ProcessorError>;
}

//! Headless Blender invocation.
//!
//! Command shape: `{bin} -b -P {script} -- <contract args>`. The add-on
//! side of the contract lives inside the tool; this end only assembles
//! arguments, bounds the run, and checks that both STL outputs landed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use vestra_core::invocation::Invocation;

use crate::subprocess::run_command;
use crate::{GeometryProcessor, ProcessorError, ProcessorOutput};

/// Default wall-clock bound on one processor run.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(600);

/// Geometry processor backed by a headless Blender subprocess.
#[derive(Debug, Clone)]
pub struct BlenderProcessor {
    bin: PathBuf,
    script: PathBuf,
    timeout: Duration,
}

impl BlenderProcessor {
    pub fn new(bin: impl Into<PathBuf>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            script: script.into(),
            timeout,
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-b")
            .arg("-P")
            .arg(&self.script)
            .arg("--")
            .args(invocation.to_args());
        cmd
    }
}

#[async_trait]
impl GeometryProcessor for BlenderProcessor {
    async fn process(&self, invocation: &Invocation) -> Result<ProcessorOutput, ProcessorError> {
        tracing::info!(
            bin = %self.bin.display(),
            axis = invocation.axis.as_str(),
            input = %invocation.input.display(),
            "Invoking geometry processor"
        );

        let mut cmd = self.command(invocation);
        let output = run_command(&mut cmd, self.timeout).await?;

        // Exit 0 alone is not success: both expected artifacts must exist
        // and be non-empty.
        verify_output(&invocation.out_prosthetic)?;
        verify_output(&invocation.out_mold)?;

        tracing::info!(
            duration_ms = output.duration_ms,
            "Geometry processor completed"
        );
        Ok(output)
    }
}

fn verify_output(path: &Path) -> Result<(), ProcessorError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(ProcessorError::MissingOutput {
            path: path.to_path_buf(),
        }),
    }
}

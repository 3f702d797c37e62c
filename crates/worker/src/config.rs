use std::path::PathBuf;
use std::time::Duration;

use vestra_core::invocation::DEFAULT_MOLD_PADDING_MM;
use vestra_processor::blender::DEFAULT_PROCESS_TIMEOUT;

/// Worker configuration loaded from environment variables.
///
/// `DATA_DIR` must point at the same root the API server writes intake
/// archives to and serves artifacts from.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Path to the headless 3D tool binary (default: `blender`).
    pub blender_bin: PathBuf,
    /// Path to the processing script handed to the tool
    /// (default: `headless/process_cli.py`).
    pub process_script: PathBuf,
    /// Wall-clock bound on one processor run (default: `600` seconds).
    pub process_timeout: Duration,
    /// Root directory shared with the API server (default: `./data`).
    pub data_dir: PathBuf,
    /// Mold shell padding handed to every invocation (default: `10.0`).
    pub mold_padding_mm: f64,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                   |
    /// |------------------------|---------------------------|
    /// | `BLENDER_BIN`          | `blender`                 |
    /// | `PROCESS_SCRIPT`       | `headless/process_cli.py` |
    /// | `PROCESS_TIMEOUT_SECS` | `600`                     |
    /// | `DATA_DIR`             | `./data`                  |
    /// | `MOLD_PADDING_MM`      | `10.0`                    |
    pub fn from_env() -> Self {
        let blender_bin =
            PathBuf::from(std::env::var("BLENDER_BIN").unwrap_or_else(|_| "blender".into()));

        let process_script = PathBuf::from(
            std::env::var("PROCESS_SCRIPT").unwrap_or_else(|_| "headless/process_cli.py".into()),
        );

        let process_timeout = std::env::var("PROCESS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROCESS_TIMEOUT);

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()));

        let mold_padding_mm: f64 = std::env::var("MOLD_PADDING_MM")
            .unwrap_or_else(|_| DEFAULT_MOLD_PADDING_MM.to_string())
            .parse()
            .expect("MOLD_PADDING_MM must be a valid f64");

        Self {
            blender_bin,
            process_script,
            process_timeout,
            data_dir,
            mold_padding_mm,
        }
    }

    /// Directory the API server stores uploaded case archives in.
    pub fn intake_dir(&self) -> PathBuf {
        self.data_dir.join("intake")
    }

    /// Directory produced artifacts are published to, served by the API
    /// server under `/artifacts`.
    pub fn artifact_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }
}

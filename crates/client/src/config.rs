use std::path::PathBuf;
use std::time::Duration;

use vestra_core::invocation::DEFAULT_BASE_OFFSET_MM;
use vestra_core::manifest::HealthySide;

/// Client configuration loaded from environment variables.
///
/// The mesh path may instead be given as the first command-line argument,
/// which takes precedence over `VESTRA_MESH`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the intake service.
    pub api_url: String,
    /// Path to the scan mesh to package.
    pub mesh: PathBuf,
    pub healthy_side: HealthySide,
    pub midline_x_mm: f64,
    pub base_fit_enabled: bool,
    pub base_offset_mm: f64,
    /// Directory produced artifacts are downloaded into.
    pub out_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `VESTRA_API_URL`           | `http://localhost:3000` |
    /// | `VESTRA_MESH`              | (required, or arg 1)    |
    /// | `VESTRA_HEALTHY_SIDE`      | `left`                  |
    /// | `VESTRA_MIDLINE_X_MM`      | `0.0`                   |
    /// | `VESTRA_BASE_FIT`          | `true`                  |
    /// | `VESTRA_BASE_OFFSET_MM`    | `2.0`                   |
    /// | `VESTRA_OUT_DIR`           | `.`                     |
    /// | `VESTRA_POLL_INTERVAL_SECS`| `2`                     |
    /// | `VESTRA_POLL_MAX_ATTEMPTS` | `150`                   |
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("VESTRA_API_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let mesh = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("VESTRA_MESH").ok())
            .map(PathBuf::from)
            .unwrap_or_default();

        let healthy_side = match std::env::var("VESTRA_HEALTHY_SIDE").as_deref() {
            Ok("right") => HealthySide::Right,
            _ => HealthySide::Left,
        };

        let midline_x_mm: f64 = std::env::var("VESTRA_MIDLINE_X_MM")
            .unwrap_or_else(|_| "0.0".into())
            .parse()
            .expect("VESTRA_MIDLINE_X_MM must be a valid f64");

        let base_fit_enabled = !matches!(
            std::env::var("VESTRA_BASE_FIT").as_deref(),
            Ok("false") | Ok("0")
        );

        let base_offset_mm: f64 = std::env::var("VESTRA_BASE_OFFSET_MM")
            .unwrap_or_else(|_| DEFAULT_BASE_OFFSET_MM.to_string())
            .parse()
            .expect("VESTRA_BASE_OFFSET_MM must be a valid f64");

        let out_dir =
            PathBuf::from(std::env::var("VESTRA_OUT_DIR").unwrap_or_else(|_| ".".into()));

        let poll_interval = Duration::from_secs(
            std::env::var("VESTRA_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .expect("VESTRA_POLL_INTERVAL_SECS must be a valid u64"),
        );

        let poll_max_attempts: u32 = std::env::var("VESTRA_POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("VESTRA_POLL_MAX_ATTEMPTS must be a valid u32");

        Self {
            api_url,
            mesh,
            healthy_side,
            midline_x_mm,
            base_fit_enabled,
            base_offset_mm,
            out_dir,
            poll_interval,
            poll_max_attempts,
        }
    }
}

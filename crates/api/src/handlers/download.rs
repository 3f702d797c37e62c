//! Case resolution: map a case id to current status and download links.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vestra_core::error::CoreError;
use vestra_core::job::{Job, JobStatus};

use crate::error::AppResult;
use crate::state::AppState;

/// One downloadable output.
#[derive(Debug, Serialize)]
pub struct ArtifactLink {
    pub name: String,
    /// Stable URL keyed by case id and artifact name.
    pub url: String,
}

/// Response body for `GET /download/{case_id}`.
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub status: JobStatus,
    pub artifacts: Vec<ArtifactLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResponse {
    fn from_job(job: Job) -> Self {
        let artifacts = match job.status {
            JobStatus::Succeeded => job
                .artifacts
                .into_iter()
                .map(|a| ArtifactLink {
                    name: a.name,
                    url: format!("/artifacts/{}", a.location),
                })
                .collect(),
            // Artifact links only exist once the job is terminal-successful.
            _ => Vec::new(),
        };

        Self {
            status: job.status,
            artifacts,
            error: job.error,
        }
    }
}

/// GET /download/{case_id}
///
/// Pure read; safe to poll arbitrarily often.
pub async fn download_status(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> AppResult<Json<DownloadResponse>> {
    let job = state
        .store
        .job_for_case(&case_id)
        .await?
        .ok_or(CoreError::NotFound(case_id))?;

    Ok(Json(DownloadResponse::from_job(job)))
}

//! Thin HTTP wrapper over the intake service endpoints.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use vestra_core::job::JobStatus;

use crate::error::ClientError;
use crate::packager::PackagedCase;

/// Multipart field the upload endpoint expects.
const ARCHIVE_FIELD: &str = "archive";

/// Receipt returned by a successful submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionReceipt {
    pub case_id: String,
    pub job_id: Uuid,
}

/// One downloadable output, as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactLink {
    pub name: String,
    pub url: String,
}

/// Current state of a submitted case.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseStatus {
    pub status: JobStatus,
    pub artifacts: Vec<ArtifactLink>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error body shape the server uses for rejections.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// POST the packaged archive to `/upload`.
    pub async fn submit(&self, packaged: &PackagedCase) -> Result<SubmissionReceipt, ClientError> {
        let part = Part::bytes(packaged.archive.clone())
            .file_name(format!("{}.zip", packaged.case_id))
            .mime_str("application/zip")?;
        let form = Form::new().part(ARCHIVE_FIELD, part);

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(response.json().await?)
    }

    /// GET `/download/{case_id}`.
    pub async fn status(&self, case_id: &str) -> Result<CaseStatus, ClientError> {
        let response = self
            .http
            .get(format!("{}/download/{case_id}", self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(case_id.to_string())),
            status if !status.is_success() => Err(rejection(response).await),
            _ => Ok(response.json().await?),
        }
    }

    /// Fetch one artifact by its server-relative URL and write it to
    /// `dest`.
    pub async fn download_artifact(
        &self,
        link: &ArtifactLink,
        dest: &Path,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, link.url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let bytes = response.bytes().await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

/// Turn a non-success response into [`ClientError::Rejected`], preferring
/// the server's structured error detail when the body carries one.
async fn rejection(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "no detail provided".to_string(),
    };
    ClientError::Rejected { status, detail }
}

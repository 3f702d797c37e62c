//! Case submission: archive upload, validation, and atomic create+enqueue.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use vestra_core::archive::CaseArchive;
use vestra_core::error::CoreError;
use vestra_core::job::Job;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field carrying the case archive.
const ARCHIVE_FIELD: &str = "archive";

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub case_id: String,
    pub job_id: Uuid,
}

/// POST /upload
///
/// Accept a multipart upload with one `archive` field, validate it, persist
/// the case with a `queued` job, and place the job reference on the queue.
/// Create+enqueue is one logical transaction: if the enqueue fails the case
/// record is rolled back, so a `queued` job always has a queued reference.
pub async fn upload_case(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let bytes = read_archive_field(&mut multipart).await?;

    // Validation happens before any durable write; a malformed archive
    // leaves no partial state behind.
    let archive = CaseArchive::unpack(&bytes)?;
    let case_id = archive.manifest.case_id.clone();

    let intake_dir = state.config.intake_dir();
    let archive_path = intake_dir.join(format!("{case_id}.zip"));

    // Register the case before touching the intake directory: a rejected
    // duplicate must not overwrite the original case's stored archive.
    let job = Job::new(&case_id, &archive_path.to_string_lossy());
    let job_id = job.id;
    state.store.create_case(job).await?;

    if let Err(e) = store_archive(&intake_dir, &archive_path, &bytes).await {
        tracing::error!(case_id = %case_id, error = %e, "Archive write failed; rolling back case");
        state.store.remove_case(&case_id).await?;
        return Err(AppError::InternalError(format!(
            "failed to store archive: {e}"
        )));
    }

    if let Err(e) = state.queue.enqueue(job_id).await {
        // Roll back so the case is never left dangling in `queued` with
        // nothing to process it. Best-effort file cleanup.
        tracing::error!(case_id = %case_id, job_id = %job_id, error = %e, "Enqueue failed; rolling back case");
        state.store.remove_case(&case_id).await?;
        let _ = tokio::fs::remove_file(&archive_path).await;
        return Err(AppError::Queue(e));
    }

    tracing::info!(case_id = %case_id, job_id = %job_id, "Case submitted and queued");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse { case_id, job_id }),
    ))
}

/// Persist the uploaded archive at its intake location.
async fn store_archive(
    intake_dir: &std::path::Path,
    archive_path: &std::path::Path,
    bytes: &[u8],
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(intake_dir).await?;
    tokio::fs::write(archive_path, bytes).await
}

/// Pull the archive bytes out of the multipart body.
async fn read_archive_field(multipart: &mut Multipart) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some(ARCHIVE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(AppError::Core(CoreError::Validation(format!(
        "multipart body is missing the `{ARCHIVE_FIELD}` field"
    ))))
}

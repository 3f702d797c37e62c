//! Bounded fixed-interval polling of a submitted case.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use vestra_core::job::JobStatus;

use crate::api::{ApiClient, ArtifactLink};
use crate::error::ClientError;

/// How one polling run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The case finished; download links are ready.
    Succeeded(Vec<ArtifactLink>),
    /// The case finished with a recorded failure.
    Failed(String),
    /// The attempt bound was reached while the case was still in flight.
    /// Not a failure; a later run may find it finished.
    Pending,
    /// The cancellation token fired before the case finished.
    Cancelled,
}

/// Poll the case status every `interval`, at most `max_attempts` times.
///
/// Returns on the first terminal status. The bound is on status requests,
/// so `max_attempts == 1` means exactly one look with no sleep.
pub async fn poll_case(
    api: &ApiClient,
    case_id: &str,
    interval: Duration,
    max_attempts: u32,
    cancel: &CancellationToken,
) -> Result<PollOutcome, ClientError> {
    if cancel.is_cancelled() {
        return Ok(PollOutcome::Cancelled);
    }

    for attempt in 1..=max_attempts {
        let status = api.status(case_id).await?;
        tracing::debug!(case_id, attempt, status = status.status.as_str(), "Polled case");

        match status.status {
            JobStatus::Succeeded => return Ok(PollOutcome::Succeeded(status.artifacts)),
            JobStatus::Failed => {
                let detail = status
                    .error
                    .unwrap_or_else(|| "no failure detail recorded".to_string());
                return Ok(PollOutcome::Failed(detail));
            }
            JobStatus::Queued | JobStatus::Running if attempt == max_attempts => {
                return Ok(PollOutcome::Pending);
            }
            JobStatus::Queued | JobStatus::Running => {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
    }

    Ok(PollOutcome::Pending)
}

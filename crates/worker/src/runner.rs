//! The fulfillment loop: dequeue, process, record, ack.
//!
//! Every collaborator arrives through a trait object, so the loop runs
//! unchanged against Postgres plus a real tool in production and against
//! in-memory doubles in tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use vestra_core::archive::{CaseArchive, MESH_ENTRY};
use vestra_core::job::{Artifact, Job, JobStatus, ARTIFACT_MOLD, ARTIFACT_PROSTHETIC};
use vestra_core::store::{CaseStore, JobLease, JobQueue, StoreError};
use vestra_processor::{GeometryProcessor, ProcessorError};

use crate::config::WorkerConfig;

/// Pause after a queue backend error before the next dequeue attempt.
const DEQUEUE_BACKOFF: Duration = Duration::from_secs(1);

/// Failure at any stage of one processing attempt. The rendered text is
/// what gets recorded on the job for the client to read.
#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("{0}")]
    Prepare(String),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

pub struct WorkerLoop {
    store: Arc<dyn CaseStore>,
    queue: Arc<dyn JobQueue>,
    processor: Arc<dyn GeometryProcessor>,
    config: WorkerConfig,
}

impl WorkerLoop {
    pub fn new(
        store: Arc<dyn CaseStore>,
        queue: Arc<dyn JobQueue>,
        processor: Arc<dyn GeometryProcessor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            processor,
            config,
        }
    }

    /// Drain the queue until the cancellation token fires.
    ///
    /// A processing failure is recorded on its job and never takes the
    /// loop down; only cancellation ends it.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Worker loop started");

        loop {
            let lease = match self.queue.dequeue(&cancel).await {
                Ok(Some(lease)) => lease,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Dequeue failed; backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(DEQUEUE_BACKOFF) => continue,
                    }
                }
            };

            if let Err(e) = self.handle_delivery(&lease).await {
                tracing::error!(job_id = %lease.job_id, error = %e, "Failed to record job outcome");
            }

            // Ack regardless of outcome: success and failure are both
            // final states that must not be redelivered.
            if let Err(e) = self.queue.ack(&lease).await {
                tracing::error!(job_id = %lease.job_id, error = %e, "Failed to ack delivery");
            }
        }

        tracing::info!("Worker loop stopped");
    }

    /// Process one delivery end to end. Errors here are store failures;
    /// processing failures are recorded on the job instead.
    async fn handle_delivery(&self, lease: &JobLease) -> Result<(), StoreError> {
        let Some(job) = self.store.job(lease.job_id).await? else {
            tracing::warn!(job_id = %lease.job_id, "Delivery references an unknown job; dropping");
            return Ok(());
        };

        if job.status.is_terminal() {
            // At-least-once delivery: a previous lease holder finished
            // this job after its lease expired. Nothing left to do.
            tracing::info!(
                job_id = %job.id,
                status = job.status.as_str(),
                "Skipping redelivery of a finished job"
            );
            return Ok(());
        }

        if job.status == JobStatus::Running {
            // The attempt that held the previous lease is unaccounted
            // for. Record the failure rather than run alongside it.
            tracing::warn!(job_id = %job.id, "Redelivered while running; recording failure");
            return self
                .store
                .mark_failed(job.id, "processing attempt interrupted and redelivered")
                .await;
        }

        self.store.mark_running(job.id).await?;
        tracing::info!(job_id = %job.id, case_id = %job.case_id, "Processing case");

        match self.execute(&job).await {
            Ok(artifacts) => {
                self.store.mark_succeeded(job.id, artifacts).await?;
                tracing::info!(job_id = %job.id, case_id = %job.case_id, "Case succeeded");
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, case_id = %job.case_id, error = %e, "Case failed");
                self.store.mark_failed(job.id, &e.to_string()).await?;
            }
        }

        Ok(())
    }

    /// One processing attempt: stage inputs in a scratch directory, run
    /// the processor, publish the outputs.
    async fn execute(&self, job: &Job) -> Result<Vec<Artifact>, JobError> {
        let bytes = tokio::fs::read(&job.input_archive)
            .await
            .map_err(|e| JobError::Prepare(format!("input archive unreadable: {e}")))?;
        let archive = CaseArchive::unpack(&bytes)
            .map_err(|e| JobError::Prepare(format!("input archive invalid: {e}")))?;

        let scratch = tempfile::tempdir()
            .map_err(|e| JobError::Prepare(format!("failed to create scratch dir: {e}")))?;
        let input = scratch.path().join(MESH_ENTRY);
        tokio::fs::write(&input, &archive.mesh)
            .await
            .map_err(|e| JobError::Prepare(format!("failed to stage mesh: {e}")))?;

        let out_prosthetic = scratch.path().join(ARTIFACT_PROSTHETIC);
        let out_mold = scratch.path().join(ARTIFACT_MOLD);
        let invocation = vestra_core::invocation::Invocation::from_manifest(
            &archive.manifest,
            &input,
            &out_prosthetic,
            &out_mold,
            self.config.mold_padding_mm,
        );

        self.processor.process(&invocation).await?;

        self.publish(&job.case_id, &out_prosthetic, &out_mold)
            .await
            .map_err(|e| JobError::Prepare(format!("failed to publish artifacts: {e}")))
    }

    /// Move produced files from the scratch dir to their served location
    /// under the shared artifact root.
    async fn publish(
        &self,
        case_id: &str,
        prosthetic: &Path,
        mold: &Path,
    ) -> std::io::Result<Vec<Artifact>> {
        let dest_dir = self.config.artifact_dir().join(case_id);
        tokio::fs::create_dir_all(&dest_dir).await?;

        let mut artifacts = Vec::with_capacity(2);
        for (name, produced) in [(ARTIFACT_PROSTHETIC, prosthetic), (ARTIFACT_MOLD, mold)] {
            // Copy, not rename: the scratch dir may live on a different
            // filesystem than the artifact root.
            tokio::fs::copy(produced, dest_dir.join(name)).await?;
            artifacts.push(Artifact::for_case(case_id, name));
        }
        Ok(artifacts)
    }
}

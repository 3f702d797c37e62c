//! Persistence and queue seams.
//!
//! The worker loop, the API handlers, and the tests all talk to these
//! traits rather than a concrete backend, so a Postgres deployment and an
//! in-process test double are interchangeable (`vestra-db` provides both).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::job::{Artifact, Job, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Duplicate case id: {0}")]
    DuplicateCase(String),

    #[error("Illegal status transition for job {job_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),
}

/// One delivery of a job reference to a consumer.
///
/// The delivery token distinguishes redeliveries of the same job after a
/// lease expiry, so a stale consumer cannot ack a newer delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLease {
    pub job_id: Uuid,
    pub delivery: Uuid,
}

/// Durable record of cases, jobs, and artifacts.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Register a case together with its freshly queued job.
    ///
    /// Fails with [`StoreError::DuplicateCase`] when the case id has been
    /// seen before; case ids are unique per submission.
    async fn create_case(&self, job: Job) -> Result<(), StoreError>;

    /// Remove a case record that never made it onto the queue.
    ///
    /// Submission-time rollback only; never called once a job reference
    /// has been enqueued.
    async fn remove_case(&self, case_id: &str) -> Result<(), StoreError>;

    /// Look up the job tracking a case, if the case exists.
    async fn job_for_case(&self, case_id: &str) -> Result<Option<Job>, StoreError>;

    /// Load a job by id.
    async fn job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    /// `queued → running`. Sets `started_at`.
    async fn mark_running(&self, job_id: Uuid) -> Result<(), StoreError>;

    /// `running → succeeded`. Registers the produced artifacts.
    async fn mark_succeeded(&self, job_id: Uuid, artifacts: Vec<Artifact>)
        -> Result<(), StoreError>;

    /// `running → failed`. Records the diagnostic text.
    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), StoreError>;
}

/// At-least-once delivery channel carrying job references from submission
/// to execution.
///
/// A dequeued reference is leased: it is not redelivered to another
/// consumer until `ack` or until the backend's visibility timeout elapses.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Place a job reference on the queue.
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Wait for the next available job reference.
    ///
    /// Blocks (no busy-spin) until a reference is available or the
    /// cancellation token fires; returns `None` only on cancellation.
    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<JobLease>, QueueError>;

    /// Record completion of a delivery, removing it from the queue.
    async fn ack(&self, lease: &JobLease) -> Result<(), QueueError>;
}

//! PostgreSQL store and queue.
//!
//! The queue claims ready rows with `FOR UPDATE SKIP LOCKED` so multiple
//! worker instances never receive the same delivery concurrently, and
//! requeues expired leases at the top of each poll cycle (at-least-once).
//! Status transitions are guarded by status-qualified `UPDATE`s so a
//! redelivered terminal job can never move backwards.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vestra_core::job::{Artifact, Job, JobStatus};
use vestra_core::store::{CaseStore, JobLease, JobQueue, QueueError, StoreError};

/// Column list for `jobs` queries.
const JOB_COLUMNS: &str =
    "id, case_id, status, input_archive, error_detail, submitted_at, started_at, completed_at";

/// Default lease duration before an unacked delivery becomes visible again.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(900);

/// Default interval between empty claim attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A row from the `jobs` table.
#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    case_id: String,
    status: String,
    input_archive: String,
    error_detail: Option<String>,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// A row from the `artifacts` table.
#[derive(Debug, FromRow)]
struct ArtifactRow {
    name: String,
    location: String,
}

fn parse_status(s: &str) -> Result<JobStatus, StoreError> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "succeeded" => Ok(JobStatus::Succeeded),
        "failed" => Ok(JobStatus::Failed),
        other => Err(StoreError::Backend(format!("unknown job status: {other}"))),
    }
}

fn backend_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl JobRow {
    fn into_job(self, artifacts: Vec<Artifact>) -> Result<Job, StoreError> {
        Ok(Job {
            id: self.id,
            case_id: self.case_id,
            status: parse_status(&self.status)?,
            input_archive: self.input_archive,
            artifacts,
            error: self.error_detail,
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// [`CaseStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_row(&self, job_id: Uuid) -> Result<Option<JobRow>, StoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)
    }

    async fn load_artifacts(&self, job_id: Uuid) -> Result<Vec<Artifact>, StoreError> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            "SELECT name, location FROM artifacts WHERE job_id = $1 ORDER BY seq",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(rows
            .into_iter()
            .map(|r| Artifact {
                name: r.name,
                location: r.location,
            })
            .collect())
    }

    /// Report an illegal or impossible transition based on the job's
    /// current state (the status-qualified UPDATE matched no row).
    async fn transition_error(&self, job_id: Uuid, to: JobStatus) -> StoreError {
        match self.load_row(job_id).await {
            Ok(Some(row)) => match parse_status(&row.status) {
                Ok(from) => StoreError::IllegalTransition { job_id, from, to },
                Err(e) => e,
            },
            Ok(None) => StoreError::JobNotFound(job_id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl CaseStore for PgStore {
    async fn create_case(&self, job: Job) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let case_result = sqlx::query(
            "INSERT INTO cases (case_id, input_archive, submitted_at) VALUES ($1, $2, $3)",
        )
        .bind(&job.case_id)
        .bind(&job.input_archive)
        .bind(job.submitted_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = case_result {
            if is_unique_violation(&e) {
                return Err(StoreError::DuplicateCase(job.case_id));
            }
            return Err(backend_err(e));
        }

        sqlx::query(
            "INSERT INTO jobs (id, case_id, status, input_archive, submitted_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(job.id)
        .bind(&job.case_id)
        .bind(job.status.as_str())
        .bind(&job.input_archive)
        .bind(job.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)
    }

    async fn remove_case(&self, case_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cases WHERE case_id = $1")
            .bind(case_id)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn job_for_case(&self, case_id: &str) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE case_id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(case_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        match row {
            Some(row) => {
                let artifacts = self.load_artifacts(row.id).await?;
                Ok(Some(row.into_job(artifacts)?))
            }
            None => Ok(None),
        }
    }

    async fn job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        match self.load_row(job_id).await? {
            Some(row) => {
                let artifacts = self.load_artifacts(row.id).await?;
                Ok(Some(row.into_job(artifacts)?))
            }
            None => Ok(None),
        }
    }

    async fn mark_running(&self, job_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = NOW() \
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, JobStatus::Running).await);
        }
        Ok(())
    }

    async fn mark_succeeded(
        &self,
        job_id: Uuid,
        artifacts: Vec<Artifact>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let result = sqlx::query(
            "UPDATE jobs SET status = 'succeeded', completed_at = NOW() \
             WHERE id = $1 AND status = 'running'",
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, JobStatus::Succeeded).await);
        }

        for artifact in &artifacts {
            sqlx::query("INSERT INTO artifacts (job_id, name, location) VALUES ($1, $2, $3)")
                .bind(job_id)
                .bind(&artifact.name)
                .bind(&artifact.location)
                .execute(&mut *tx)
                .await
                .map_err(backend_err)?;
        }

        tx.commit().await.map_err(backend_err)
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', error_detail = $2, completed_at = NOW() \
             WHERE id = $1 AND status = 'running'",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, JobStatus::Failed).await);
        }
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

/// [`JobQueue`] backed by the `queue` table.
#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    visibility: Duration,
    poll_interval: Duration,
}

impl PgQueue {
    pub fn new(pool: PgPool, visibility: Duration) -> Self {
        Self {
            pool,
            visibility,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Return expired leases to the ready pool.
    async fn requeue_expired(&self) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE queue SET delivery = NULL, lease_expires_at = NULL \
             WHERE delivery IS NOT NULL AND lease_expires_at < NOW()",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        if result.rows_affected() > 0 {
            tracing::warn!(
                requeued = result.rows_affected(),
                "Requeued expired job leases"
            );
        }
        Ok(())
    }

    /// Attempt to claim the oldest ready job reference.
    async fn try_claim(&self) -> Result<Option<JobLease>, QueueError> {
        let delivery = Uuid::now_v7();
        let claimed: Option<Uuid> = sqlx::query_scalar(
            "UPDATE queue \
             SET delivery = $1, lease_expires_at = NOW() + make_interval(secs => $2) \
             WHERE job_id = ( \
                 SELECT job_id FROM queue \
                 WHERE delivery IS NULL \
                 ORDER BY enqueued_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING job_id",
        )
        .bind(delivery)
        .bind(self.visibility.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(claimed.map(|job_id| JobLease { job_id, delivery }))
    }
}

#[async_trait]
impl JobQueue for PgQueue {
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError> {
        sqlx::query("INSERT INTO queue (job_id) VALUES ($1)")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<JobLease>, QueueError> {
        loop {
            self.requeue_expired().await?;

            if let Some(lease) = self.try_claim().await? {
                return Ok(Some(lease));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn ack(&self, lease: &JobLease) -> Result<(), QueueError> {
        // Matching on the delivery token makes a stale ack (lease expired
        // and the job was redelivered) a no-op.
        sqlx::query("DELETE FROM queue WHERE job_id = $1 AND delivery = $2")
            .bind(lease.job_id)
            .bind(lease.delivery)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}

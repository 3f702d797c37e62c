//! In-process store and queue.
//!
//! Semantics mirror the PostgreSQL backend: monotonic status transitions,
//! FIFO delivery, leases with a visibility timeout, stale acks ignored.
//! Used as the injected test double and for single-node development runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vestra_core::job::{Artifact, Job, JobStatus};
use vestra_core::store::{CaseStore, JobLease, JobQueue, QueueError, StoreError};

use crate::postgres::DEFAULT_VISIBILITY_TIMEOUT;

/// [`CaseStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<Uuid, Job>,
    by_case: HashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a guarded transition, enforcing the queued→running→terminal
    /// chain the same way the status-qualified SQL updates do.
    fn transition(
        &self,
        job_id: Uuid,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::JobNotFound(job_id))?;

        if !job.status.can_transition_to(to) {
            return Err(StoreError::IllegalTransition {
                job_id,
                from: job.status,
                to,
            });
        }
        job.status = to;
        apply(job);
        Ok(())
    }
}

#[async_trait]
impl CaseStore for MemoryStore {
    async fn create_case(&self, job: Job) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.by_case.contains_key(&job.case_id) {
            return Err(StoreError::DuplicateCase(job.case_id));
        }
        inner.by_case.insert(job.case_id.clone(), job.id);
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    async fn remove_case(&self, case_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(job_id) = inner.by_case.remove(case_id) {
            inner.jobs.remove(&job_id);
        }
        Ok(())
    }

    async fn job_for_case(&self, case_id: &str) -> Result<Option<Job>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .by_case
            .get(case_id)
            .and_then(|id| inner.jobs.get(id))
            .cloned())
    }

    async fn job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.jobs.get(&job_id).cloned())
    }

    async fn mark_running(&self, job_id: Uuid) -> Result<(), StoreError> {
        self.transition(job_id, JobStatus::Running, |job| {
            job.started_at = Some(Utc::now());
        })
    }

    async fn mark_succeeded(
        &self,
        job_id: Uuid,
        artifacts: Vec<Artifact>,
    ) -> Result<(), StoreError> {
        self.transition(job_id, JobStatus::Succeeded, |job| {
            job.artifacts = artifacts;
            job.completed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), StoreError> {
        self.transition(job_id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
            job.completed_at = Some(Utc::now());
        })
    }
}

/// [`JobQueue`] held entirely in memory: FIFO ready list plus a lease map.
pub struct MemoryQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    visibility: Duration,
}

#[derive(Default)]
struct QueueInner {
    ready: VecDeque<Uuid>,
    leased: HashMap<Uuid, LeasedJob>,
}

struct LeasedJob {
    job_id: Uuid,
    deadline: Instant,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_TIMEOUT)
    }
}

impl MemoryQueue {
    pub fn new(visibility: Duration) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            visibility,
        }
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            inner.ready.push_back(job_id);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<JobLease>, QueueError> {
        loop {
            // Claim under the lock; compute how long to wait if empty.
            let next_expiry = {
                let mut inner = self.inner.lock().expect("queue mutex poisoned");
                let now = Instant::now();

                let expired: Vec<Uuid> = inner
                    .leased
                    .iter()
                    .filter(|(_, lease)| lease.deadline <= now)
                    .map(|(delivery, _)| *delivery)
                    .collect();
                for delivery in expired {
                    if let Some(lease) = inner.leased.remove(&delivery) {
                        tracing::warn!(job_id = %lease.job_id, "Lease expired, requeueing job");
                        inner.ready.push_back(lease.job_id);
                    }
                }

                if let Some(job_id) = inner.ready.pop_front() {
                    let delivery = Uuid::now_v7();
                    inner.leased.insert(
                        delivery,
                        LeasedJob {
                            job_id,
                            deadline: now + self.visibility,
                        },
                    );
                    return Ok(Some(JobLease { job_id, delivery }));
                }

                inner.leased.values().map(|lease| lease.deadline).min()
            };

            // Queue is empty: wait for an enqueue, the earliest lease
            // expiry, or cancellation.
            match next_expiry {
                Some(deadline) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(None),
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(None),
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
    }

    async fn ack(&self, lease: &JobLease) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        // A missing delivery means the lease already expired and the job
        // was redelivered; the stale ack is a no-op.
        inner.leased.remove(&lease.delivery);
        Ok(())
    }
}

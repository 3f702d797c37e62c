//! End-to-end loop behavior against in-memory backends and a scripted
//! processor double: outcome recording, artifact publication, failure
//! containment, and redelivery handling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vestra_core::archive::CaseArchive;
use vestra_core::invocation::Invocation;
use vestra_core::job::{Job, JobStatus, ARTIFACT_MOLD, ARTIFACT_PROSTHETIC};
use vestra_core::manifest::{BaseFit, HealthySide, Manifest, Midline, MANIFEST_VERSION, UNITS_MM};
use vestra_core::store::{CaseStore, JobQueue};
use vestra_db::memory::{MemoryQueue, MemoryStore};
use vestra_processor::{GeometryProcessor, ProcessorError, ProcessorOutput};
use vestra_worker::config::WorkerConfig;
use vestra_worker::runner::WorkerLoop;

/// Scripted stand-in for the external tool.
enum Behavior {
    /// Write both outputs, each tagged with the staged input bytes.
    Succeed,
    /// Fail with a fixed diagnostic and write nothing.
    Fail,
}

struct FakeProcessor {
    behavior: Behavior,
}

#[async_trait]
impl GeometryProcessor for FakeProcessor {
    async fn process(&self, invocation: &Invocation) -> Result<ProcessorOutput, ProcessorError> {
        match self.behavior {
            Behavior::Succeed => {
                let mesh = tokio::fs::read_to_string(&invocation.input).await?;
                tokio::fs::write(&invocation.out_prosthetic, format!("prosthetic<{mesh}>"))
                    .await?;
                tokio::fs::write(&invocation.out_mold, format!("mold<{mesh}>")).await?;
                Ok(ProcessorOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_ms: 1,
                })
            }
            Behavior::Fail => Err(ProcessorError::ExecutionFailed {
                exit_code: 1,
                detail: "mesh is not manifold".to_string(),
            }),
        }
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    config: WorkerConfig,
    _data_dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let config = WorkerConfig {
            blender_bin: PathBuf::from("blender"),
            process_script: PathBuf::from("headless/process_cli.py"),
            process_timeout: Duration::from_secs(5),
            data_dir: data_dir.path().to_path_buf(),
            mold_padding_mm: 10.0,
        };
        Self {
            store: Arc::new(MemoryStore::new()),
            queue: Arc::new(MemoryQueue::new(Duration::from_secs(60))),
            config,
            _data_dir: data_dir,
        }
    }

    fn spawn_worker(&self, behavior: Behavior, cancel: &CancellationToken) {
        let worker = WorkerLoop::new(
            Arc::clone(&self.store) as Arc<dyn CaseStore>,
            Arc::clone(&self.queue) as Arc<dyn JobQueue>,
            Arc::new(FakeProcessor { behavior }),
            self.config.clone(),
        );
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await });
    }

    /// Stage an intake archive, register its job, and enqueue it.
    async fn submit_case(&self, case_id: &str, mesh: &[u8]) -> Job {
        let archive = CaseArchive::new(mesh.to_vec(), manifest(case_id));
        let intake_dir = self.config.intake_dir();
        tokio::fs::create_dir_all(&intake_dir).await.expect("intake dir");

        let archive_path = intake_dir.join(format!("{case_id}.zip"));
        tokio::fs::write(&archive_path, archive.pack().expect("pack"))
            .await
            .expect("write archive");

        let job = Job::new(case_id, &archive_path.to_string_lossy());
        self.store.create_case(job.clone()).await.expect("create case");
        self.queue.enqueue(job.id).await.expect("enqueue");
        job
    }

    async fn wait_terminal(&self, job_id: Uuid) -> Job {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = self
                    .store
                    .job(job_id)
                    .await
                    .expect("store")
                    .expect("job exists");
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state")
    }
}

fn manifest(case_id: &str) -> Manifest {
    Manifest {
        schema_version: MANIFEST_VERSION.to_string(),
        units: UNITS_MM.to_string(),
        case_id: case_id.to_string(),
        healthy_side: HealthySide::Left,
        midline: Midline {
            point: [0.0, 0.0, 0.0],
            normal: [1.0, 0.0, 0.0],
        },
        base_fit: BaseFit {
            enabled: true,
            offset_mm: 2.0,
        },
    }
}

#[tokio::test]
async fn successful_case_publishes_both_artifacts() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    harness.spawn_worker(Behavior::Succeed, &cancel);

    let job = harness.submit_case("case-ok", b"solid scan-ok").await;
    let done = harness.wait_terminal(job.id).await;
    cancel.cancel();

    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert_eq!(done.error, None);

    let names: Vec<&str> = done.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec![ARTIFACT_PROSTHETIC, ARTIFACT_MOLD]);

    let prosthetic = harness.config.artifact_dir().join("case-ok/prosthetic.stl");
    let mold = harness.config.artifact_dir().join("case-ok/mold.stl");
    assert_eq!(
        tokio::fs::read_to_string(&prosthetic).await.unwrap(),
        "prosthetic<solid scan-ok>"
    );
    assert_eq!(
        tokio::fs::read_to_string(&mold).await.unwrap(),
        "mold<solid scan-ok>"
    );
}

#[tokio::test]
async fn processor_failure_is_recorded_without_artifacts() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    harness.spawn_worker(Behavior::Fail, &cancel);

    let job = harness.submit_case("case-bad", b"solid scan-bad").await;
    let done = harness.wait_terminal(job.id).await;
    cancel.cancel();

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.artifacts.is_empty());
    let detail = done.error.expect("failure detail recorded");
    assert!(detail.contains("mesh is not manifold"), "detail: {detail}");

    assert!(!harness.config.artifact_dir().join("case-bad").exists());
}

#[tokio::test]
async fn unreadable_archive_fails_job_but_not_the_loop() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    harness.spawn_worker(Behavior::Succeed, &cancel);

    // Register a job whose archive file was never written.
    let missing = Job::new("case-missing", "/nonexistent/case-missing.zip");
    harness.store.create_case(missing.clone()).await.unwrap();
    harness.queue.enqueue(missing.id).await.unwrap();

    // A valid case behind it must still get processed.
    let good = harness.submit_case("case-after", b"solid scan-after").await;

    let first = harness.wait_terminal(missing.id).await;
    let second = harness.wait_terminal(good.id).await;
    cancel.cancel();

    assert_eq!(first.status, JobStatus::Failed);
    assert!(first.error.unwrap().contains("input archive unreadable"));
    assert_eq!(second.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn concurrent_workers_do_not_cross_contaminate_cases() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    harness.spawn_worker(Behavior::Succeed, &cancel);
    harness.spawn_worker(Behavior::Succeed, &cancel);

    let left = harness.submit_case("case-left", b"solid scan-left").await;
    let right = harness.submit_case("case-right", b"solid scan-right").await;

    let left_done = harness.wait_terminal(left.id).await;
    let right_done = harness.wait_terminal(right.id).await;
    cancel.cancel();

    assert_eq!(left_done.status, JobStatus::Succeeded);
    assert_eq!(right_done.status, JobStatus::Succeeded);

    let artifact_dir = harness.config.artifact_dir();
    assert_eq!(
        tokio::fs::read_to_string(artifact_dir.join("case-left/prosthetic.stl"))
            .await
            .unwrap(),
        "prosthetic<solid scan-left>"
    );
    assert_eq!(
        tokio::fs::read_to_string(artifact_dir.join("case-right/prosthetic.stl"))
            .await
            .unwrap(),
        "prosthetic<solid scan-right>"
    );
}

#[tokio::test]
async fn redelivery_of_a_finished_job_changes_nothing() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    harness.spawn_worker(Behavior::Succeed, &cancel);

    let job = harness.submit_case("case-redeliver", b"solid scan-redeliver").await;
    let done = harness.wait_terminal(job.id).await;
    assert_eq!(done.status, JobStatus::Succeeded);

    // Simulate a stale redelivery of the same job.
    harness.queue.enqueue(job.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let after = harness.store.job(job.id).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Succeeded);
    assert_eq!(after.completed_at, done.completed_at);
    assert_eq!(after.error, None);
}

#[tokio::test]
async fn delivery_for_an_unknown_job_is_dropped() {
    let harness = Harness::new();
    let cancel = CancellationToken::new();
    harness.spawn_worker(Behavior::Succeed, &cancel);

    harness.queue.enqueue(Uuid::now_v7()).await.unwrap();

    // The loop must survive and keep serving real work.
    let job = harness.submit_case("case-real", b"solid scan-real").await;
    let done = harness.wait_terminal(job.id).await;
    cancel.cancel();

    assert_eq!(done.status, JobStatus::Succeeded);
}

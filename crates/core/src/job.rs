//! Server-side job model: one tracked unit of asynchronous work per case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output artifact names produced by a successful job, in registration order.
pub const ARTIFACT_PROSTHETIC: &str = "prosthetic.stl";
pub const ARTIFACT_MOLD: &str = "mold.stl";

/// Job lifecycle. Transitions are owned exclusively by the worker loop
/// and are monotonic: `queued → running → succeeded | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Whether a job in this state will never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// `queued → running` and `running → succeeded|failed` are the only
    /// legal transitions; nothing skips `running` and nothing reverses.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// A produced output file, available for download once its job succeeds.
///
/// `location` is the stable path fragment keyed by case id
/// (`{case_id}/{name}`) under the artifact root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub location: String,
}

impl Artifact {
    pub fn for_case(case_id: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            location: format!("{case_id}/{name}"),
        }
    }
}

/// One tracked unit of asynchronous work, created atomically with case
/// registration at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub case_id: String,
    pub status: JobStatus,
    /// Path reference to the stored input archive.
    pub input_archive: String,
    /// Populated only on success.
    pub artifacts: Vec<Artifact>,
    /// Populated only on failure.
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a fresh `queued` job for a case.
    pub fn new(case_id: &str, input_archive: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            case_id: case_id.to_string(),
            status: JobStatus::Queued,
            input_archive: input_archive.to_string(),
            artifacts: Vec::new(),
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_form_a_chain() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn no_transition_skips_running_or_reverses() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Succeeded));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn artifact_location_is_keyed_by_case_id() {
        let artifact = Artifact::for_case("case-42", ARTIFACT_PROSTHETIC);
        assert_eq!(artifact.location, "case-42/prosthetic.stl");
    }
}

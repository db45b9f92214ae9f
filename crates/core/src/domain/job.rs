// Analysis Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::{FailureReason, Report};

/// Job ID (UUID v4)
pub type JobId = String;

/// Caller-visible job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle state. The report and the failure reason live inside the
/// terminal variants, so a job can never carry both or carry one early.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running,
    Completed(Report),
    Failed(FailureReason),
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Running => JobStatus::Running,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Repository to analyze: clone location plus optional branch
/// (`None` = the repository's default branch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub clone_url: String,
    pub branch: Option<String>,
}

impl RepositoryRef {
    pub fn new(clone_url: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            clone_url: clone_url.into(),
            branch,
        }
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{}@{}", self.clone_url, branch),
            None => write!(f, "{}", self.clone_url),
        }
    }
}

/// Analysis Job Entity
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisJob {
    pub id: JobId,
    pub repository: RepositoryRef,
    pub submitted_by: String,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    state: JobState,
}

impl AnalysisJob {
    /// Create a new pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `repository` - Repository to analyze
    /// * `submitted_by` - Subject of the submitting session
    /// * `created_at` - Creation timestamp (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        repository: RepositoryRef,
        submitted_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            repository,
            submitted_by: submitted_by.into(),
            created_at,
            started_at: None,
            completed_at: None,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn report(&self) -> Option<&Report> {
        match &self.state {
            JobState::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.state {
            JobState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Transition to Running state with explicit timestamp
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.state != JobState::Pending {
            return Err(self.invalid_transition(JobStatus::Running));
        }
        self.state = JobState::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition to Completed state, attaching the report
    pub fn complete(&mut self, report: Report, now: DateTime<Utc>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.invalid_transition(JobStatus::Completed));
        }
        self.state = JobState::Completed(report);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Transition to Failed state from any non-terminal state
    pub fn fail(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<()> {
        if self.is_terminal() {
            return Err(self.invalid_transition(JobStatus::Failed));
        }
        self.state = JobState::Failed(reason);
        self.completed_at = Some(now);
        Ok(())
    }

    fn invalid_transition(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status().to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureKind, Metrics, Rating};

    fn job() -> AnalysisJob {
        AnalysisJob::new(
            "job-1",
            RepositoryRef::new("https://github.com/acme/widgets.git", None),
            "user-1",
            Utc::now(),
        )
    }

    fn empty_report() -> Report {
        Report {
            issues: vec![],
            metrics: Metrics {
                code_smells: 0,
                bugs: 0,
                vulnerabilities: 0,
                security_hotspots: 0,
                duplication_density: 0.0,
                coverage: None,
                reliability_rating: Rating::A,
                security_rating: Rating::A,
                maintainability_rating: Rating::A,
            },
        }
    }

    #[test]
    fn test_new_job_is_pending_without_outcome() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.report().is_none());
        assert!(job.failure_reason().is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        job.start(Utc::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Running);
        assert!(job.started_at.is_some());

        job.complete(empty_report(), Utc::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.report().is_some());
        assert!(job.failure_reason().is_none());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_cannot_complete_pending_job() {
        let mut job = job();
        let err = job.complete(empty_report(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "pending".to_string(),
                to: "completed".to_string()
            }
        );
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut job = job();
        job.start(Utc::now()).unwrap();
        job.fail(FailureReason::new(FailureKind::Fetch, "boom"), Utc::now())
            .unwrap();

        assert!(job.start(Utc::now()).is_err());
        assert!(job.complete(empty_report(), Utc::now()).is_err());
        assert!(job
            .fail(FailureReason::new(FailureKind::Engine, "again"), Utc::now())
            .is_err());
        assert_eq!(job.failure_reason().unwrap().kind, FailureKind::Fetch);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(JobStatus::Running.to_string(), "running");
    }
}

// Results Gateway - read-only projection of job records

use crate::domain::{AnalysisJob, FailureReason, JobState, JobStatus, Report};
use crate::error::Result;
use crate::port::JobStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Caller-facing view of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub analysis_id: String,
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub outcome: JobOutcomeView,
}

/// Status plus whatever the status carries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcomeView {
    Pending,
    Running,
    Completed {
        #[serde(flatten)]
        report: Report,
    },
    Failed {
        #[serde(rename = "failureReason")]
        failure_reason: FailureReason,
    },
}

impl JobView {
    pub fn status(&self) -> JobStatus {
        match self.outcome {
            JobOutcomeView::Pending => JobStatus::Pending,
            JobOutcomeView::Running => JobStatus::Running,
            JobOutcomeView::Completed { .. } => JobStatus::Completed,
            JobOutcomeView::Failed { .. } => JobStatus::Failed,
        }
    }
}

impl From<AnalysisJob> for JobView {
    fn from(job: AnalysisJob) -> Self {
        let outcome = match job.state() {
            JobState::Pending => JobOutcomeView::Pending,
            JobState::Running => JobOutcomeView::Running,
            JobState::Completed(report) => JobOutcomeView::Completed {
                report: report.clone(),
            },
            JobState::Failed(reason) => JobOutcomeView::Failed {
                failure_reason: reason.clone(),
            },
        };
        Self {
            analysis_id: job.id,
            repository: job.repository.clone_url,
            branch: job.repository.branch,
            created_at: job.created_at,
            completed_at: job.completed_at,
            outcome,
        }
    }
}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct ResultsGateway {
    store: Arc<dyn JobStore>,
}

impl ResultsGateway {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Current view of a job (`AppError::NotFound` for unknown ids)
    pub async fn get_result(&self, job_id: &str) -> Result<JobView> {
        self.store.get(job_id).await.map(JobView::from)
    }

    pub async fn job_counts(&self) -> Result<JobCounts> {
        Ok(JobCounts {
            pending: self.store.count_by_status(JobStatus::Pending).await?,
            running: self.store.count_by_status(JobStatus::Running).await?,
            completed: self.store.count_by_status(JobStatus::Completed).await?,
            failed: self.store.count_by_status(JobStatus::Failed).await?,
        })
    }
}

// Job Store Port (Interface)

use crate::domain::{AnalysisJob, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// State change applied to a single job record.
///
/// The store applies it to a private copy and commits only if it returns
/// `Ok`, so a failed mutation leaves the record untouched.
pub type JobMutation =
    Box<dyn FnOnce(&mut AnalysisJob) -> crate::domain::error::Result<()> + Send>;

/// Keyed job records with atomic per-entry updates
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job (`AppError::Conflict` if the id already exists)
    async fn create(&self, job: AnalysisJob) -> Result<()>;

    /// Snapshot of a job (`AppError::NotFound` for unknown ids)
    async fn get(&self, id: &str) -> Result<AnalysisJob>;

    /// Apply `mutation` atomically and return the committed record
    async fn update(&self, id: &str, mutation: JobMutation) -> Result<AnalysisJob>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<usize>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// HashMap-backed store that also records every committed status,
    /// so tests can assert on transition order.
    #[derive(Default)]
    pub struct MockJobStore {
        jobs: Mutex<HashMap<String, AnalysisJob>>,
        history: Mutex<HashMap<String, Vec<JobStatus>>>,
    }

    impl MockJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Statuses committed for `id`, oldest first
        pub fn history(&self, id: &str) -> Vec<JobStatus> {
            self.history
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn len(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl JobStore for MockJobStore {
        async fn create(&self, job: AnalysisJob) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Conflict(format!("Job {} already exists", job.id)));
            }
            self.history
                .lock()
                .unwrap()
                .insert(job.id.clone(), vec![job.status()]);
            jobs.insert(job.id.clone(), job);
            Ok(())
        }

        async fn get(&self, id: &str) -> Result<AnalysisJob> {
            self.jobs
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
        }

        async fn update(&self, id: &str, mutation: JobMutation) -> Result<AnalysisJob> {
            let mut jobs = self.jobs.lock().unwrap();
            let current = jobs
                .get(id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

            let mut next = current.clone();
            mutation(&mut next)?;

            self.history
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_default()
                .push(next.status());
            jobs.insert(id.to_string(), next.clone());
            Ok(next)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<usize> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|job| job.status() == status)
                .count())
        }
    }
}

// In-memory JobStore Implementation

use async_trait::async_trait;
use codequal_core::domain::{AnalysisJob, JobId, JobStatus};
use codequal_core::error::{AppError, Result};
use codequal_core::port::{JobMutation, JobStore};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Job records held in process memory.
///
/// Updates run under the write lock against a copy of the record, which is
/// swapped in only when the mutation succeeds, so readers never see a
/// partially applied transition.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, AnalysisJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Job {} not found", id))
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: AnalysisJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(AppError::Conflict(format!("Job {} already exists", job.id)));
        }
        debug!(job_id = %job.id, status = %job.status(), "Job record created");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<AnalysisJob> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: &str, mutation: JobMutation) -> Result<AnalysisJob> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get_mut(id).ok_or_else(|| not_found(id))?;

        let mut next = current.clone();
        mutation(&mut next)?;
        *current = next.clone();

        debug!(job_id = %id, status = %next.status(), "Job record updated");
        Ok(next)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<usize> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status() == status)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codequal_core::domain::{FailureReason, RepositoryRef};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn job(id: &str) -> AnalysisJob {
        AnalysisJob::new(
            id,
            RepositoryRef::new("https://github.com/acme/widgets.git", None),
            "user-1",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryJobStore::new();
        assert_ok!(store.create(job("job-1")).await);

        let found = store.get("job-1").await.unwrap();
        assert_eq!(found.id, "job-1");
        assert_eq!(found.status(), JobStatus::Pending);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let store = InMemoryJobStore::new();
        store.create(job("job-1")).await.unwrap();

        let err = store.create(job("job-1")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = InMemoryJobStore::new();
        assert!(matches!(store.get("nope").await, Err(AppError::NotFound(_))));

        let result = store
            .update("nope", Box::new(|job: &mut AnalysisJob| job.start(Utc::now())))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_record_untouched() {
        let store = InMemoryJobStore::new();
        store.create(job("job-1")).await.unwrap();

        // Second fail is rejected after the first one already applied
        let result = store
            .update(
                "job-1",
                Box::new(|job: &mut AnalysisJob| {
                    job.submitted_by = "mallory".to_string();
                    job.fail(FailureReason::engine("x"), Utc::now())?;
                    job.fail(FailureReason::engine("again"), Utc::now())
                }),
            )
            .await;
        assert_err!(result);

        let stored = store.get("job-1").await.unwrap();
        assert_eq!(stored.status(), JobStatus::Pending);
        assert_eq!(stored.submitted_by, "user-1");
    }

    #[tokio::test]
    async fn test_update_returns_committed_record() {
        let store = InMemoryJobStore::new();
        store.create(job("job-1")).await.unwrap();

        let updated = store
            .update("job-1", Box::new(|job: &mut AnalysisJob| job.start(Utc::now())))
            .await
            .unwrap();
        assert_eq!(updated.status(), JobStatus::Running);
        assert_eq!(store.get("job-1").await.unwrap(), updated);
        assert_eq!(store.count_by_status(JobStatus::Running).await.unwrap(), 1);
        assert_eq!(store.count_by_status(JobStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_readers_never_see_partial_records() {
        let store = Arc::new(InMemoryJobStore::new());
        for i in 0..20 {
            store.create(job(&format!("job-{}", i))).await.unwrap();
        }

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..20 {
                    let id = format!("job-{}", i);
                    store
                        .update(&id, Box::new(|job: &mut AnalysisJob| job.start(Utc::now())))
                        .await
                        .unwrap();
                    store
                        .update(
                            &id,
                            Box::new(|job: &mut AnalysisJob| {
                                job.fail(FailureReason::fetch("gone"), Utc::now())
                            }),
                        )
                        .await
                        .unwrap();
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..200 {
                    for i in 0..20 {
                        let job = store.get(&format!("job-{}", i)).await.unwrap();
                        // Outcome present iff terminal
                        assert_eq!(job.failure_reason().is_some(), job.is_terminal());
                        assert_eq!(job.completed_at.is_some(), job.is_terminal());
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.count_by_status(JobStatus::Failed).await.unwrap(), 20);
    }
}

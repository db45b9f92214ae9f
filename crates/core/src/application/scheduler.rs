// Job Scheduler - accepts submissions and dispatches pipelines

use crate::application::runner::AnalysisRunner;
use crate::application::submission::{self, SubmitRequest};
use crate::config::SchedulerConfig;
use crate::domain::{
    AnalysisJob, ExternalCredential, FailureReason, JobId, RepositoryRef, Session,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, TimeProvider};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info};

/// Validates submissions, creates `Pending` jobs and runs each pipeline on
/// its own task.
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    runner: Arc<AnalysisRunner>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: SchedulerConfig,
    /// `None` = unbounded
    admission: Option<Arc<Semaphore>>,
    in_flight: Arc<watch::Sender<usize>>,
}

impl JobScheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        runner: Arc<AnalysisRunner>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: SchedulerConfig,
    ) -> Self {
        let admission = match config.max_concurrent_jobs {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let (in_flight, _) = watch::channel(0usize);
        Self {
            store,
            runner,
            id_provider,
            time_provider,
            config,
            admission,
            in_flight: Arc::new(in_flight),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Submit a repository for analysis.
    ///
    /// Returns as soon as the `Pending` record exists; the pipeline runs in
    /// the background. Validation and credential errors leave the store
    /// untouched.
    pub async fn submit(&self, session: &Session, req: SubmitRequest) -> Result<JobId> {
        let repository = submission::resolve(&req, &self.config)?;

        if self.config.require_external_credential && session.external_credential.is_none() {
            return Err(AppError::MissingCredential);
        }

        let job_id = self.id_provider.generate_id();
        let created_at = self.time_provider.now();
        let job = AnalysisJob::new(
            job_id.clone(),
            repository.clone(),
            session.subject.clone(),
            created_at,
        );
        self.store.create(job).await?;

        info!(
            job_id = %job_id,
            repository = %repository,
            submitted_by = %session.subject,
            "Analysis submitted"
        );

        self.dispatch(
            job_id.clone(),
            repository,
            session.external_credential.clone(),
        );
        Ok(job_id)
    }

    /// Pipelines started and not yet finished
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no pipeline is in flight
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn dispatch(
        &self,
        job_id: JobId,
        repository: RepositoryRef,
        credential: Option<ExternalCredential>,
    ) {
        let guard = InFlightGuard::enter(Arc::clone(&self.in_flight));
        let runner = Arc::clone(&self.runner);
        let admission = self.admission.clone();
        let store = Arc::clone(&self.store);
        let time_provider = Arc::clone(&self.time_provider);

        tokio::spawn(async move {
            let _guard = guard;

            // Waiting for a slot keeps the job Pending
            let _permit = match admission {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Admission semaphore closed");
                        // The pipeline never runs, so nothing else settles the job
                        let reason = FailureReason::engine(format!("analysis not admitted: {}", e));
                        let now = time_provider.now();
                        if let Err(e) = store
                            .update(
                                &job_id,
                                Box::new(move |job: &mut AnalysisJob| job.fail(reason, now)),
                            )
                            .await
                        {
                            error!(job_id = %job_id, error = %e, "Could not fail unadmitted job");
                        }
                        return;
                    }
                },
                None => None,
            };

            if let Err(e) = runner.run(&job_id, repository, credential).await {
                error!(job_id = %job_id, error = %e, "Pipeline could not record its outcome");
            }
        });
    }
}

/// Counts a dispatched pipeline until dropped
struct InFlightGuard {
    counter: Arc<watch::Sender<usize>>,
}

impl InFlightGuard {
    fn enter(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self { counter }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.send_modify(|n| *n = n.saturating_sub(1));
    }
}

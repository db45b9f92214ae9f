// Analysis Runner - drives one job through the pipeline

mod fault;
pub mod normalize;

pub use fault::{classify, panic_message, GuardedOutcome};

use crate::application::constants::{excerpt, project_key};
use crate::domain::{
    AnalysisJob, ExternalCredential, FailureReason, JobStatus, Report, RepositoryRef,
};
use crate::error::Result;
use crate::port::{
    AnalysisEngine, EngineContext, JobStore, RepositoryFetcher, TimeProvider, Workspace,
    WorkspaceManager,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the fetch → configure → analyze → normalize pipeline for a job and
/// records its terminal state.
///
/// Cheap to clone (shared collaborators only).
#[derive(Clone)]
pub struct AnalysisRunner {
    store: Arc<dyn JobStore>,
    workspaces: Arc<dyn WorkspaceManager>,
    fetcher: Arc<dyn RepositoryFetcher>,
    engine: Arc<dyn AnalysisEngine>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AnalysisRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        workspaces: Arc<dyn WorkspaceManager>,
        fetcher: Arc<dyn RepositoryFetcher>,
        engine: Arc<dyn AnalysisEngine>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            workspaces,
            fetcher,
            engine,
            time_provider,
        }
    }

    /// Execute the pipeline for a `Pending` job and write its terminal state.
    ///
    /// Returns the terminal status. Errors only when the store itself
    /// refuses a transition (unknown id, job not pending).
    pub async fn run(
        &self,
        job_id: &str,
        repository: RepositoryRef,
        credential: Option<ExternalCredential>,
    ) -> Result<JobStatus> {
        let now = self.time_provider.now();
        self.store
            .update(job_id, Box::new(move |job: &mut AnalysisJob| job.start(now)))
            .await?;
        info!(job_id = %job_id, repository = %repository, "Analysis started");

        let started = Instant::now();

        // Own task: a panic anywhere in the pipeline stops at this join handle
        let runner = self.clone();
        let owned_id = job_id.to_string();
        let handle = tokio::task::spawn(async move {
            runner
                .execute_pipeline(&owned_id, &repository, credential.as_ref())
                .await
        });

        let outcome = match classify(job_id, handle.await) {
            GuardedOutcome::Finished(outcome) => outcome,
            GuardedOutcome::Panicked(msg) => {
                Err(FailureReason::engine(format!("unexpected fault: {}", msg)))
            }
            GuardedOutcome::Cancelled => {
                Err(FailureReason::engine("unexpected fault: pipeline task cancelled"))
            }
        };

        let now = self.time_provider.now();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let job = match outcome {
            Ok(report) => {
                let issues = report.issues.len();
                let mutation = move |job: &mut AnalysisJob| job.complete(report, now);
                let job = self.store.update(job_id, Box::new(mutation)).await?;
                info!(job_id = %job_id, issues, elapsed_ms, "Analysis completed");
                job
            }
            Err(reason) => {
                warn!(job_id = %job_id, reason = %reason, elapsed_ms, "Analysis failed");
                let mutation = move |job: &mut AnalysisJob| job.fail(reason, now);
                self.store.update(job_id, Box::new(mutation)).await?
            }
        };

        Ok(job.status())
    }

    /// Acquire a workspace, analyze inside it, release it on every path.
    async fn execute_pipeline(
        &self,
        job_id: &str,
        repository: &RepositoryRef,
        credential: Option<&ExternalCredential>,
    ) -> std::result::Result<Report, FailureReason> {
        let workspace = self
            .workspaces
            .acquire(job_id)
            .await
            .map_err(|e| FailureReason::workspace(e.to_string()))?;
        debug!(job_id = %job_id, path = %workspace.root().display(), "Workspace acquired");

        // On unwind the workspace is removed by its Drop
        let outcome = self
            .analyze_in(&workspace, job_id, repository, credential)
            .await;

        self.workspaces.release(workspace).await;
        outcome
    }

    async fn analyze_in(
        &self,
        workspace: &Workspace,
        job_id: &str,
        repository: &RepositoryRef,
        credential: Option<&ExternalCredential>,
    ) -> std::result::Result<Report, FailureReason> {
        let source_root = workspace.source_dir();

        let fetch_started = Instant::now();
        let revision = self
            .fetcher
            .fetch(repository, credential, &source_root)
            .await
            .map_err(|e| FailureReason::fetch(excerpt(&e.to_string())))?;
        info!(
            job_id = %job_id,
            commit = revision.commit.as_deref().unwrap_or("unknown"),
            fetch_ms = fetch_started.elapsed().as_millis() as u64,
            "Repository fetched"
        );

        let ctx = EngineContext {
            job_id: job_id.to_string(),
            project_key: project_key(job_id),
            workspace_root: workspace.root().to_path_buf(),
            source_root,
            revision: revision.commit,
        };

        self.engine
            .configure(&ctx)
            .await
            .map_err(|e| FailureReason::engine(excerpt(&e.to_string())))?;

        let output = self
            .engine
            .analyze(&ctx)
            .await
            .map_err(|e| FailureReason::engine(excerpt(&e.to_string())))?;
        debug!(
            job_id = %job_id,
            engine_ms = output.duration_ms,
            diagnostics = %output.diagnostics,
            "Engine finished"
        );

        normalize::parse_report(&output.report, &ctx.project_key)
            .map_err(|e| FailureReason::engine(excerpt(&e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use crate::port::analysis_engine::mocks::{
        MockEngine, MockEngineBehavior, MOCK_ENGINE_DIAGNOSTICS,
    };
    use crate::port::job_store::mocks::MockJobStore;
    use crate::port::repository_fetcher::mocks::MockFetcher;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::workspace::mocks::MockWorkspaceManager;
    use chrono::Utc;

    struct Harness {
        _root: tempfile::TempDir,
        store: Arc<MockJobStore>,
        workspaces: Arc<MockWorkspaceManager>,
        fetcher: Arc<MockFetcher>,
        engine: Arc<MockEngine>,
        runner: AnalysisRunner,
    }

    fn harness(fetcher: MockFetcher, engine: MockEngine) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(MockJobStore::new());
        let workspaces = Arc::new(MockWorkspaceManager::new(root.path()));
        let fetcher = Arc::new(fetcher);
        let engine = Arc::new(engine);
        let runner = AnalysisRunner::new(
            store.clone(),
            workspaces.clone(),
            fetcher.clone(),
            engine.clone(),
            Arc::new(FixedTimeProvider(Utc::now())),
        );
        Harness {
            _root: root,
            store,
            workspaces,
            fetcher,
            engine,
            runner,
        }
    }

    fn repo() -> RepositoryRef {
        RepositoryRef::new("https://github.com/acme/widgets.git", Some("main".to_string()))
    }

    async fn seed(store: &MockJobStore, id: &str) {
        store
            .create(AnalysisJob::new(id, repo(), "user-1", Utc::now()))
            .await
            .unwrap();
    }

    fn assert_workspaces_gone(h: &Harness) {
        let acquired = h.workspaces.acquired();
        assert!(!acquired.is_empty());
        for path in acquired {
            assert!(!path.exists(), "workspace {} left behind", path.display());
        }
    }

    #[tokio::test]
    async fn test_success_path_completes_with_report() {
        let h = harness(MockFetcher::new_success(), MockEngine::new_success());
        seed(&h.store, "job-1").await;

        let status = h
            .runner
            .run("job-1", repo(), Some(ExternalCredential::new("tok")))
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = h.store.get("job-1").await.unwrap();
        let report = job.report().unwrap();
        assert_eq!(report.issues.len(), 2);
        assert!(job.failure_reason().is_none());
        assert!(job.started_at.is_some() && job.completed_at.is_some());
        assert_eq!(
            h.store.history("job-1"),
            vec![JobStatus::Pending, JobStatus::Running, JobStatus::Completed]
        );

        // Engine saw the fetched source as analysis root
        let ctx = &h.engine.contexts()[0];
        assert_eq!(ctx.project_key, "codequal-job-1");
        assert!(ctx.source_root.starts_with(&ctx.workspace_root));
        assert!(ctx.revision.is_some());
        assert_eq!(h.fetcher.calls(), vec![(repo(), true)]);

        assert_workspaces_gone(&h);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_engine_diagnostics_are_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let h = harness(MockFetcher::new_success(), MockEngine::new_success());
        seed(&h.store, "job-1").await;
        h.runner.run("job-1", repo(), None).await.unwrap();

        let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = logged
            .lines()
            .find(|l| l.contains("Engine finished"))
            .expect("engine log line");
        assert!(line.contains(MOCK_ENGINE_DIAGNOSTICS), "{}", line);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_engine() {
        let h = harness(
            MockFetcher::new_reject("fatal: Remote branch main not found in upstream origin"),
            MockEngine::new_success(),
        );
        seed(&h.store, "job-1").await;

        let status = h.runner.run("job-1", repo(), None).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let job = h.store.get("job-1").await.unwrap();
        let reason = job.failure_reason().unwrap();
        assert_eq!(reason.kind, FailureKind::Fetch);
        assert!(reason.to_string().starts_with("FetchError: "));
        assert!(reason.message.contains("Remote branch main not found"));
        assert!(job.report().is_none());
        assert!(h.engine.contexts().is_empty());

        assert_workspaces_gone(&h);
    }

    #[tokio::test]
    async fn test_engine_failure_is_engine_error() {
        let h = harness(MockFetcher::new_success(), MockEngine::new_fail("OutOfMemoryError"));
        seed(&h.store, "job-1").await;

        assert_eq!(
            h.runner.run("job-1", repo(), None).await.unwrap(),
            JobStatus::Failed
        );
        let job = h.store.get("job-1").await.unwrap();
        let reason = job.failure_reason().unwrap();
        assert_eq!(reason.kind, FailureKind::Engine);
        assert!(reason.message.contains("OutOfMemoryError"));

        assert_workspaces_gone(&h);
    }

    #[tokio::test]
    async fn test_empty_engine_output_fails_instead_of_empty_report() {
        let h = harness(
            MockFetcher::new_success(),
            MockEngine::new(MockEngineBehavior::Empty),
        );
        seed(&h.store, "job-1").await;

        h.runner.run("job-1", repo(), None).await.unwrap();
        let job = h.store.get("job-1").await.unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.failure_reason().unwrap().kind, FailureKind::Engine);
        assert!(job.report().is_none());
    }

    #[tokio::test]
    async fn test_workspace_failure_is_recorded() {
        let h = harness(MockFetcher::new_success(), MockEngine::new_success());
        h.workspaces.fail_acquire();
        seed(&h.store, "job-1").await;

        h.runner.run("job-1", repo(), None).await.unwrap();
        let job = h.store.get("job-1").await.unwrap();
        let reason = job.failure_reason().unwrap();
        assert_eq!(reason.kind, FailureKind::Workspace);
        assert!(reason.to_string().starts_with("WorkspaceError: "));
        assert!(h.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_engine_panic_is_isolated() {
        let h = harness(
            MockFetcher::new_success(),
            MockEngine::new_panic_inducing("index out of bounds"),
        );
        seed(&h.store, "job-1").await;

        let status = h.runner.run("job-1", repo(), None).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let job = h.store.get("job-1").await.unwrap();
        assert_eq!(
            job.failure_reason().unwrap().to_string(),
            "EngineError: unexpected fault: index out of bounds"
        );
        assert_workspaces_gone(&h);
    }

    #[tokio::test]
    async fn test_run_rejects_non_pending_job() {
        let h = harness(MockFetcher::new_success(), MockEngine::new_success());
        seed(&h.store, "job-1").await;
        h.runner.run("job-1", repo(), None).await.unwrap();

        // Second run must not touch the terminal record
        assert!(h.runner.run("job-1", repo(), None).await.is_err());
        assert_eq!(
            h.store.get("job-1").await.unwrap().status(),
            JobStatus::Completed
        );
        assert!(h.runner.run("missing", repo(), None).await.is_err());
    }
}

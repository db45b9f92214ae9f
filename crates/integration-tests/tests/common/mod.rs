//! Shared wiring: real adapters against fake `git` and engine scripts

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use codequal_core::application::{
    AnalysisRunner, JobScheduler, JobView, ResultsGateway, SubmitRequest,
};
use codequal_core::config::SchedulerConfig;
use codequal_core::domain::{ExternalCredential, JobId, Session};
use codequal_core::port::id_provider::UuidProvider;
use codequal_core::port::time_provider::SystemTimeProvider;
use codequal_infra_memory::InMemoryJobStore;
use codequal_infra_system::{
    EngineConfig, GitFetcher, GitFetcherConfig, ProcessRunner, ScannerEngine, TempWorkspaceManager,
};

/// Clones "succeed" by creating the destination with one source file;
/// branch `missing` fails the way real git does
pub const FAKE_GIT: &str = r#"#!/bin/sh
if [ "$1" = "-C" ]; then
  echo "0123456789abcdef0123456789abcdef01234567"
  exit 0
fi
for arg in "$@"; do
  if [ "$arg" = "missing" ]; then
    echo "fatal: Remote branch missing not found in upstream origin" >&2
    exit 128
  fi
done
for last in "$@"; do :; done
mkdir -p "$last/src"
printf 'fn main() {\n    let foo = 1;\n}\n' > "$last/src/main.rs"
exit 0
"#;

/// Engine printing a report for the project key found in its properties
/// file (`$1`)
pub const REPORTING_ENGINE: &str = r#"#!/bin/sh
test -f "$1" || { echo "ERROR: missing properties file" >&2; exit 3; }
KEY=$(sed -n 's/^sonar.projectKey=//p' "$1")
cat <<JSON
{
  "issues": [
    {
      "key": "AY-1",
      "rule": "rust:S1481",
      "severity": "MAJOR",
      "component": "$KEY:src/main.rs",
      "line": 2,
      "message": "Remove this unused local variable.",
      "type": "CODE_SMELL",
      "status": "OPEN"
    },
    {
      "key": "AY-2",
      "rule": "rust:S4507",
      "severity": "CRITICAL",
      "component": "$KEY:src/main.rs",
      "message": "Review this security-sensitive code.",
      "type": "SECURITY_HOTSPOT"
    }
  ],
  "measures": [
    { "metric": "duplicated_lines_density", "value": "0.0" },
    { "metric": "coverage", "value": "42.5" },
    { "metric": "sqale_rating", "value": "1.0" }
  ]
}
JSON
"#;

pub const FAILING_ENGINE: &str = r#"#!/bin/sh
echo "ERROR: Error during SonarScanner execution" >&2
exit 2
"#;

pub const SILENT_ENGINE: &str = "#!/bin/sh\nexit 0\n";

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Engine that blocks until `gate` exists, then reports like
/// `REPORTING_ENGINE`
pub fn gated_engine(gate: &Path) -> String {
    REPORTING_ENGINE.replacen(
        "#!/bin/sh\n",
        &format!(
            "#!/bin/sh\nwhile [ ! -f '{}' ]; do sleep 0.05; done\n",
            gate.display()
        ),
        1,
    )
}

pub fn session_with_credential() -> Session {
    Session::new("alice", Some(ExternalCredential::new("gho_integration")))
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub workspace_root: PathBuf,
    pub store: Arc<InMemoryJobStore>,
    pub scheduler: Arc<JobScheduler>,
    pub gateway: Arc<ResultsGateway>,
}

impl Harness {
    pub fn new(engine_script: &str) -> Self {
        Self::with_config(engine_script, SchedulerConfig::default())
    }

    pub fn with_config(engine_script: &str, config: SchedulerConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let git = write_script(&bin, "git", FAKE_GIT);
        let engine = write_script(&bin, "engine", engine_script);

        let workspace_root = dir.path().join("workspaces");
        let workspaces = Arc::new(TempWorkspaceManager::new(&workspace_root).unwrap());
        let process_runner = ProcessRunner::default();
        let fetcher = Arc::new(GitFetcher::new(
            GitFetcherConfig {
                executable: git,
                timeout: Duration::from_secs(30),
            },
            process_runner.clone(),
        ));
        let engine = Arc::new(ScannerEngine::new(
            EngineConfig {
                executable: engine,
                args: vec!["{config}".to_string()],
                timeout: Duration::from_secs(30),
                ..EngineConfig::default()
            },
            process_runner,
        ));

        let store = Arc::new(InMemoryJobStore::new());
        let time_provider = Arc::new(SystemTimeProvider);
        let runner = Arc::new(AnalysisRunner::new(
            store.clone(),
            workspaces,
            fetcher,
            engine,
            time_provider.clone(),
        ));
        let scheduler = Arc::new(JobScheduler::new(
            store.clone(),
            runner,
            Arc::new(UuidProvider),
            time_provider,
            config,
        ));
        let gateway = Arc::new(ResultsGateway::new(store.clone()));

        Self {
            dir,
            workspace_root,
            store,
            scheduler,
            gateway,
        }
    }

    pub async fn submit(&self, repository: &str, branch: Option<&str>) -> JobId {
        self.scheduler
            .submit(
                &session_with_credential(),
                SubmitRequest::new(repository, branch.map(str::to_string)),
            )
            .await
            .unwrap()
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait_terminal(&self, id: &str) -> JobView {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let view = self.gateway.get_result(id).await.unwrap();
                if view.status().is_terminal() {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state")
    }

    /// Entries left under the workspace root
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(&self.workspace_root).unwrap().count()
    }
}

// Analysis Engine Port - external static-analysis tool, treated as a black box

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Everything the engine needs to know about one job's workspace
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub job_id: String,
    /// Engine project key; components in the output are prefixed with it
    pub project_key: String,
    pub workspace_root: PathBuf,
    /// Analysis root (the fetched repository)
    pub source_root: PathBuf,
    pub revision: Option<String>,
}

/// Raw engine output, before normalization
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Report document (JSON)
    pub report: String,
    /// Diagnostic text (stderr)
    pub diagnostics: String,
    pub duration_ms: u64,
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to write engine configuration: {0}")]
    Configuration(String),

    #[error("Engine could not be started: {0}")]
    SpawnFailed(String),

    #[error("Engine exited unsuccessfully ({}): {diagnostics}", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Engine timed out after {0}s")]
    Timeout(u64),

    #[error("Engine produced no output")]
    EmptyOutput,

    #[error("Engine output could not be parsed: {0}")]
    InvalidOutput(String),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Write the engine configuration describing `ctx.source_root` as the
    /// analysis root
    async fn configure(&self, ctx: &EngineContext) -> Result<(), EngineError>;

    /// Run the engine to completion
    async fn analyze(&self, ctx: &EngineContext) -> Result<EngineOutput, EngineError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    /// Stderr tail the mock reports alongside a successful analysis
    pub const MOCK_ENGINE_DIAGNOSTICS: &str = "INFO: mock analysis finished";

    /// A small but complete engine report in the expected wire shape
    pub const SAMPLE_REPORT_JSON: &str = r#"{
  "issues": [
    {
      "key": "AY-1",
      "rule": "rust:S1481",
      "severity": "MAJOR",
      "component": "codequal-job:src/main.rs",
      "line": 3,
      "message": "Remove this unused \"foo\" local variable.",
      "type": "CODE_SMELL",
      "status": "OPEN"
    },
    {
      "key": "AY-2",
      "rule": "rust:S2076",
      "severity": "CRITICAL",
      "component": "codequal-job:src/db.rs",
      "line": 12,
      "message": "Make sure that this SQL query is not vulnerable to injection.",
      "type": "VULNERABILITY",
      "status": "OPEN"
    }
  ],
  "measures": [
    { "metric": "code_smells", "value": "1" },
    { "metric": "bugs", "value": "0" },
    { "metric": "vulnerabilities", "value": "1" },
    { "metric": "security_hotspots", "value": "2" },
    { "metric": "duplicated_lines_density", "value": "12.5" },
    { "metric": "coverage", "value": "81.3" },
    { "metric": "reliability_rating", "value": "1.0" },
    { "metric": "security_rating", "value": "4.0" },
    { "metric": "sqale_rating", "value": "2.0" }
  ]
}"#;

    /// Mock engine behavior
    #[derive(Debug, Clone)]
    pub enum MockEngineBehavior {
        /// Succeed with this report document
        Report(String),
        /// Exit non-zero with this diagnostic
        Fail(String),
        /// Exit zero but print nothing
        Empty,
        /// Panic inside `analyze` (fault isolation testing)
        Panic(String),
    }

    pub struct MockEngine {
        behavior: MockEngineBehavior,
        gate: Option<Arc<Semaphore>>,
        contexts: Arc<Mutex<Vec<EngineContext>>>,
    }

    impl MockEngine {
        pub fn new(behavior: MockEngineBehavior) -> Self {
            Self {
                behavior,
                gate: None,
                contexts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockEngineBehavior::Report(SAMPLE_REPORT_JSON.to_string()))
        }

        pub fn new_fail(diagnostics: impl Into<String>) -> Self {
            Self::new(MockEngineBehavior::Fail(diagnostics.into()))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockEngineBehavior::Panic(message.into()))
        }

        /// Block every `analyze` call until the returned semaphore gets a
        /// permit per call
        pub fn gated(behavior: MockEngineBehavior) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let mut engine = Self::new(behavior);
            engine.gate = Some(Arc::clone(&gate));
            (engine, gate)
        }

        /// Contexts seen by `analyze`
        pub fn contexts(&self) -> Vec<EngineContext> {
            self.contexts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnalysisEngine for MockEngine {
        async fn configure(&self, ctx: &EngineContext) -> Result<(), EngineError> {
            let contents = format!("sonar.projectBaseDir={}\n", ctx.source_root.display());
            std::fs::write(ctx.workspace_root.join("engine.properties"), contents)
                .map_err(|e| EngineError::Configuration(e.to_string()))
        }

        async fn analyze(&self, ctx: &EngineContext) -> Result<EngineOutput, EngineError> {
            self.contexts.lock().unwrap().push(ctx.clone());

            if let Some(gate) = &self.gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
                permit.forget();
            }

            if !ctx.workspace_root.join("engine.properties").exists() {
                return Err(EngineError::Configuration(
                    "analyze called before configure".to_string(),
                ));
            }

            match &self.behavior {
                MockEngineBehavior::Report(json) => Ok(EngineOutput {
                    report: json.clone(),
                    diagnostics: MOCK_ENGINE_DIAGNOSTICS.to_string(),
                    duration_ms: 5,
                }),
                MockEngineBehavior::Fail(diagnostics) => Err(EngineError::Failed {
                    exit_code: Some(2),
                    diagnostics: diagnostics.clone(),
                }),
                MockEngineBehavior::Empty => Ok(EngineOutput {
                    report: String::new(),
                    diagnostics: String::new(),
                    duration_ms: 5,
                }),
                MockEngineBehavior::Panic(message) => {
                    panic!("{}", message); // Actually panic for fault isolation testing
                }
            }
        }
    }
}

// Scanner engine adapter: properties file + external executable
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use codequal_core::application::constants::excerpt;
use codequal_core::port::{AnalysisEngine, EngineContext, EngineError, EngineOutput};

use crate::process::{CommandSpec, ProcessError, ProcessRunner, DEFAULT_OUTPUT_LIMIT};

/// Placeholders substituted in `EngineConfig::args`
pub const CONFIG_PLACEHOLDER: &str = "{config}";
pub const SOURCE_PLACEHOLDER: &str = "{source}";
pub const WORKSPACE_PLACEHOLDER: &str = "{workspace}";
pub const REPORT_PLACEHOLDER: &str = "{report}";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub executable: PathBuf,
    /// Arguments; may reference `{config}`, `{source}`, `{workspace}`, `{report}`
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Properties file written into the workspace root
    pub config_file_name: String,
    /// Where the engine may write its report, relative to the workspace root
    pub report_file_name: String,
    /// Engine server URL, when the engine needs one
    pub host_url: Option<String>,
    /// Largest report accepted from stdout or the report file
    pub max_output_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("sonar-scanner"),
            args: vec![
                format!("-Dproject.settings={}", CONFIG_PLACEHOLDER),
                format!("-Dcodequal.report.path={}", REPORT_PLACEHOLDER),
            ],
            timeout: Duration::from_secs(900),
            config_file_name: "sonar-project.properties".to_string(),
            report_file_name: "codequal-report.json".to_string(),
            host_url: None,
            max_output_bytes: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

/// Runs an external scanner against the workspace source tree
pub struct ScannerEngine {
    config: EngineConfig,
    runner: ProcessRunner,
}

impl ScannerEngine {
    pub fn new(config: EngineConfig, runner: ProcessRunner) -> Self {
        Self { config, runner }
    }

    fn config_path(&self, ctx: &EngineContext) -> PathBuf {
        ctx.workspace_root.join(&self.config.config_file_name)
    }

    fn report_path(&self, ctx: &EngineContext) -> PathBuf {
        ctx.workspace_root.join(&self.config.report_file_name)
    }

    /// Properties document describing the analysis
    fn render_properties(&self, ctx: &EngineContext) -> String {
        let mut props = vec![
            ("sonar.projectKey", ctx.project_key.clone()),
            ("sonar.projectName", ctx.project_key.clone()),
            ("sonar.projectBaseDir", path_value(&ctx.source_root)),
            ("sonar.sources", ".".to_string()),
            (
                "sonar.working.directory",
                path_value(&ctx.workspace_root.join(".scannerwork")),
            ),
        ];
        if let Some(url) = &self.config.host_url {
            props.push(("sonar.host.url", url.clone()));
        }
        if let Some(revision) = &ctx.revision {
            props.push(("sonar.scm.revision", revision.clone()));
        }

        let mut out = String::from("# Generated per analysis job\n");
        for (key, value) in props {
            out.push_str(key);
            out.push('=');
            out.push_str(&escape_property(&value));
            out.push('\n');
        }
        out
    }

    fn render_args(&self, ctx: &EngineContext) -> Vec<String> {
        let config = path_value(&self.config_path(ctx));
        let source = path_value(&ctx.source_root);
        let workspace = path_value(&ctx.workspace_root);
        let report = path_value(&self.report_path(ctx));
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace(CONFIG_PLACEHOLDER, &config)
                    .replace(SOURCE_PLACEHOLDER, &source)
                    .replace(WORKSPACE_PLACEHOLDER, &workspace)
                    .replace(REPORT_PLACEHOLDER, &report)
            })
            .collect()
    }
}

fn path_value(path: &Path) -> String {
    path.display().to_string()
}

/// Escape a value for the Java properties format
fn escape_property(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl AnalysisEngine for ScannerEngine {
    async fn configure(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        let path = self.config_path(ctx);
        tokio::fs::write(&path, self.render_properties(ctx))
            .await
            .map_err(|e| EngineError::Configuration(format!("{}: {}", path.display(), e)))?;
        debug!(job_id = %ctx.job_id, path = %path.display(), "Engine configuration written");
        Ok(())
    }

    async fn analyze(&self, ctx: &EngineContext) -> Result<EngineOutput, EngineError> {
        let spec = CommandSpec::new(&self.config.executable, self.config.timeout)
            .args(self.render_args(ctx))
            .cwd(&ctx.source_root)
            .output_limit(self.config.max_output_bytes);

        let output = self.runner.run(&spec).await.map_err(|e| match e {
            ProcessError::SpawnFailed { .. } => EngineError::SpawnFailed(e.to_string()),
            ProcessError::Timeout(limit) => EngineError::Timeout(limit.as_secs()),
            ProcessError::Io(reason) => EngineError::SpawnFailed(reason),
        })?;

        if !output.success {
            return Err(EngineError::Failed {
                exit_code: output.exit_code,
                diagnostics: excerpt(&output.stderr),
            });
        }

        let limit = self.config.max_output_bytes;
        let too_large =
            |source: &str| EngineError::InvalidOutput(format!("{} exceeds {} bytes", source, limit));

        // The report file wins over stdout when the engine wrote one
        let report_path = self.report_path(ctx);
        let report = match tokio::fs::metadata(&report_path).await {
            Ok(meta) if meta.len() > limit as u64 => {
                return Err(too_large(&report_path.display().to_string()))
            }
            Ok(_) => tokio::fs::read_to_string(&report_path).await.map_err(|e| {
                EngineError::InvalidOutput(format!("{}: {}", report_path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if output.stdout_truncated {
                    return Err(too_large("engine stdout"));
                }
                output.stdout
            }
            Err(e) => {
                return Err(EngineError::InvalidOutput(format!(
                    "{}: {}",
                    report_path.display(),
                    e
                )))
            }
        };

        info!(
            job_id = %ctx.job_id,
            duration_ms = output.duration_ms,
            report_bytes = report.len(),
            "Engine run finished"
        );

        Ok(EngineOutput {
            report,
            diagnostics: excerpt(&output.stderr),
            duration_ms: output.duration_ms,
        })
    }
}

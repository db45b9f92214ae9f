// Git repository fetcher (shallow clone through the git CLI)
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use codequal_core::application::constants::excerpt;
use codequal_core::domain::{ExternalCredential, RepositoryRef};
use codequal_core::port::{FetchError, FetchedRevision, RepositoryFetcher};

use crate::process::{CommandSpec, ProcessError, ProcessRunner};

/// Time allowed for `git rev-parse` after a successful clone
const REV_PARSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct GitFetcherConfig {
    /// `git` executable (resolved through PATH when relative)
    pub executable: PathBuf,
    /// Upper bound for the clone
    pub timeout: Duration,
}

impl Default for GitFetcherConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("git"),
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct GitFetcher {
    config: GitFetcherConfig,
    runner: ProcessRunner,
}

impl GitFetcher {
    pub fn new(config: GitFetcherConfig, runner: ProcessRunner) -> Self {
        Self { config, runner }
    }

    /// `git clone` arguments for a shallow, single-branch, tag-less fetch
    fn clone_args(repository: &RepositoryRef, destination: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["clone", "--depth", "1", "--single-branch", "--no-tags"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(branch) = &repository.branch {
            args.push("--branch".to_string());
            args.push(branch.clone());
        }
        // Everything after `--` is positional, never an option
        args.push("--".to_string());
        args.push(repository.clone_url.clone());
        args.push(destination.display().to_string());
        args
    }

    /// The credential is passed as an HTTP header through git's
    /// environment-based config, so it never appears in argv or the URL
    fn credential_env(credential: &ExternalCredential) -> Vec<(String, String)> {
        let basic = BASE64.encode(format!("x-access-token:{}", credential.expose()));
        vec![
            ("GIT_CONFIG_COUNT".to_string(), "1".to_string()),
            ("GIT_CONFIG_KEY_0".to_string(), "http.extraHeader".to_string()),
            (
                "GIT_CONFIG_VALUE_0".to_string(),
                format!("Authorization: Basic {}", basic),
            ),
        ]
    }

    async fn resolve_head(&self, destination: &Path) -> Option<String> {
        let spec = CommandSpec::new(&self.config.executable, REV_PARSE_TIMEOUT)
            .arg("-C")
            .arg(destination.display().to_string())
            .args(["rev-parse", "HEAD"])
            .env("GIT_TERMINAL_PROMPT", "0");

        match self.runner.run(&spec).await {
            Ok(output) if output.success => {
                let commit = output.stdout.trim().to_string();
                (!commit.is_empty()).then_some(commit)
            }
            Ok(output) => {
                warn!(stderr = %output.stderr.trim(), "Could not resolve HEAD after clone");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not resolve HEAD after clone");
                None
            }
        }
    }
}

/// Strip the credential from text that may echo it back
fn redact(text: &str, credential: Option<&ExternalCredential>) -> String {
    match credential {
        Some(c) if !c.expose().is_empty() => text.replace(c.expose(), "***"),
        _ => text.to_string(),
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(
        &self,
        repository: &RepositoryRef,
        credential: Option<&ExternalCredential>,
        destination: &Path,
    ) -> Result<FetchedRevision, FetchError> {
        let mut spec = CommandSpec::new(&self.config.executable, self.config.timeout)
            .args(Self::clone_args(repository, destination))
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(parent) = destination.parent() {
            spec = spec.cwd(parent);
        }
        if let Some(credential) = credential {
            spec.env.extend(Self::credential_env(credential));
        }

        debug!(repository = %repository, destination = %destination.display(), "Cloning repository");

        let output = self.runner.run(&spec).await.map_err(|e| match e {
            ProcessError::SpawnFailed { .. } => FetchError::Unavailable(e.to_string()),
            ProcessError::Timeout(limit) => FetchError::Timeout(limit.as_secs()),
            ProcessError::Io(reason) => FetchError::Io(reason),
        })?;

        if !output.success {
            let diagnostics = excerpt(&redact(&output.stderr, credential));
            return Err(FetchError::Rejected {
                repository: repository.to_string(),
                diagnostics: if diagnostics.is_empty() {
                    format!("git exited with {:?}", output.exit_code)
                } else {
                    diagnostics
                },
            });
        }

        Ok(FetchedRevision {
            commit: self.resolve_head(destination).await,
        })
    }
}

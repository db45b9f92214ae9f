//! Daemon settings
//!
//! Loaded once at startup from an optional TOML file overlaid by
//! `CODEQUAL_*` environment variables, validated, then turned into the
//! explicit config structs each component takes.
//!
//! ```text
//! CODEQUAL_CONFIG=~/.codequal/server.toml      # file location
//! CODEQUAL_HTTP__PORT=9090                     # nested keys use `__`
//! CODEQUAL_ENGINE__ARGS=-X,{config}            # lists are comma-separated
//! ```

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use codequal_api_http::HttpServerConfig;
use codequal_core::config::{SchedulerConfig, DEFAULT_REPOSITORY_HOST};
use codequal_infra_system::{EngineConfig, GitFetcherConfig};

pub const CONFIG_PATH_ENV: &str = "CODEQUAL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.codequal/server.toml";
const ENV_PREFIX: &str = "CODEQUAL";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub auth: AuthSettings,
    pub workspace: WorkspaceSettings,
    pub git: GitSettings,
    pub engine: EngineSettings,
    pub scheduler: SchedulerSettings,
    pub log_format: LogFormat,
    /// How long shutdown waits for running pipelines
    pub shutdown_drain_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            auth: AuthSettings::default(),
            workspace: WorkspaceSettings::default(),
            git: GitSettings::default(),
            engine: EngineSettings::default(),
            scheduler: SchedulerSettings::default(),
            log_format: LogFormat::default(),
            shutdown_drain_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
        }
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 secret shared with whoever issues session tokens
    pub token_secret: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("token_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub root: String,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir()
                .join("codequal-workspaces")
                .display()
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub executable: String,
    pub timeout_secs: u64,
}

impl Default for GitSettings {
    fn default() -> Self {
        let defaults = GitFetcherConfig::default();
        Self {
            executable: defaults.executable.display().to_string(),
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub executable: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub config_file_name: String,
    pub report_file_name: String,
    pub host_url: Option<String>,
    pub max_output_bytes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            executable: defaults.executable.display().to_string(),
            args: defaults.args,
            timeout_secs: defaults.timeout.as_secs(),
            config_file_name: defaults.config_file_name,
            report_file_name: defaults.report_file_name,
            host_url: defaults.host_url,
            max_output_bytes: defaults.max_output_bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub repository_host: String,
    pub allowed_schemes: Vec<String>,
    pub require_external_credential: bool,
    /// 0 = unbounded
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            repository_host: defaults.repository_host,
            allowed_schemes: defaults.allowed_schemes,
            require_external_credential: defaults.require_external_credential,
            max_concurrent_jobs: defaults.max_concurrent_jobs,
        }
    }
}

impl Settings {
    /// Load from `$CODEQUAL_CONFIG` (or the default path) plus environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(shellexpand::tilde(&path).into_owned());

        let builder = Config::builder()
            .add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engine.args")
                    .with_list_parse_key("scheduler.allowed_schemes")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
            .with_context(|| format!("Failed to load settings (file: {})", path.display()))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.token_secret.len() < MIN_SECRET_LEN {
            bail!(
                "auth.token_secret must be set and at least {} bytes long",
                MIN_SECRET_LEN
            );
        }
        if self.http.host.trim().is_empty() {
            bail!("http.host must not be empty");
        }
        if self.workspace.root.trim().is_empty() {
            bail!("workspace.root must not be empty");
        }
        if self.git.executable.trim().is_empty() {
            bail!("git.executable must not be empty");
        }
        if self.engine.executable.trim().is_empty() {
            bail!("engine.executable must not be empty");
        }
        if self.git.timeout_secs == 0 || self.engine.timeout_secs == 0 {
            bail!("git.timeout_secs and engine.timeout_secs must be > 0");
        }
        if self.engine.max_output_bytes == 0 {
            bail!("engine.max_output_bytes must be > 0");
        }
        if self.engine.config_file_name.contains(['/', '\\'])
            || self.engine.report_file_name.contains(['/', '\\'])
        {
            bail!("engine.config_file_name and engine.report_file_name must be plain file names");
        }
        if self.scheduler.allowed_schemes.is_empty() {
            bail!("scheduler.allowed_schemes must list at least one scheme");
        }
        if !self.scheduler.repository_host.contains("://") {
            bail!(
                "scheduler.repository_host must be an absolute URL (e.g. {})",
                DEFAULT_REPOSITORY_HOST
            );
        }
        Ok(())
    }

    pub fn token_secret(&self) -> &[u8] {
        self.auth.token_secret.as_bytes()
    }

    pub fn workspace_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.workspace.root).into_owned())
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }

    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http.host.clone(),
            port: self.http.port,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            repository_host: self.scheduler.repository_host.clone(),
            allowed_schemes: self
                .scheduler
                .allowed_schemes
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .collect(),
            require_external_credential: self.scheduler.require_external_credential,
            max_concurrent_jobs: self.scheduler.max_concurrent_jobs,
        }
    }

    pub fn git_config(&self) -> GitFetcherConfig {
        GitFetcherConfig {
            executable: expand_path(&self.git.executable),
            timeout: Duration::from_secs(self.git.timeout_secs),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            executable: expand_path(&self.engine.executable),
            args: self.engine.args.clone(),
            timeout: Duration::from_secs(self.engine.timeout_secs),
            config_file_name: self.engine.config_file_name.clone(),
            report_file_name: self.engine.report_file_name.clone(),
            host_url: self.engine.host_url.clone().filter(|u| !u.trim().is_empty()),
            max_output_bytes: self.engine.max_output_bytes,
        }
    }
}

fn expand_path(value: &str) -> PathBuf {
    Path::new(shellexpand::tilde(value).as_ref()).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn from_toml(toml: &str) -> Result<Settings> {
        Settings::from_builder(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_defaults_with_secret() {
        let settings = from_toml(&format!("[auth]\ntoken_secret = \"{}\"\n", SECRET)).unwrap();

        assert_eq!(settings.http.port, 8080);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.shutdown_drain(), Duration::from_secs(30));
        assert_eq!(settings.git_config().executable, PathBuf::from("git"));
        assert_eq!(settings.engine_config().timeout, Duration::from_secs(900));
        let scheduler = settings.scheduler_config();
        assert!(scheduler.require_external_credential);
        assert_eq!(scheduler.allowed_schemes, vec!["https".to_string()]);
    }

    #[test]
    fn test_missing_or_short_secret_is_rejected() {
        assert!(from_toml("").is_err());
        assert!(from_toml("[auth]\ntoken_secret = \"short\"\n").is_err());
    }

    #[test]
    fn test_full_file() {
        let toml = format!(
            r#"
log_format = "json"
shutdown_drain_secs = 5

[http]
host = "0.0.0.0"
port = 9090

[auth]
token_secret = "{}"

[workspace]
root = "/var/lib/codequal/ws"

[git]
executable = "/usr/bin/git"
timeout_secs = 60

[engine]
executable = "/opt/scanner/bin/scan"
args = ["--settings", "{{config}}"]
timeout_secs = 120
host_url = "http://sonar.local:9000"
max_output_bytes = 1048576

[scheduler]
repository_host = "https://git.example.org"
allowed_schemes = ["HTTPS", "ssh"]
require_external_credential = false
max_concurrent_jobs = 4
"#,
            SECRET
        );
        let settings = from_toml(&toml).unwrap();

        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.http_config().address(), "0.0.0.0:9090");
        assert_eq!(settings.workspace_root(), PathBuf::from("/var/lib/codequal/ws"));
        assert_eq!(settings.git_config().timeout, Duration::from_secs(60));

        let engine = settings.engine_config();
        assert_eq!(engine.args, vec!["--settings", "{config}"]);
        assert_eq!(engine.host_url.as_deref(), Some("http://sonar.local:9000"));
        assert_eq!(engine.report_file_name, "codequal-report.json");
        assert_eq!(engine.max_output_bytes, 1024 * 1024);

        let scheduler = settings.scheduler_config();
        assert_eq!(scheduler.allowed_schemes, vec!["https", "ssh"]);
        assert_eq!(scheduler.max_concurrent_jobs, 4);
        assert!(!scheduler.require_external_credential);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let base = format!("[auth]\ntoken_secret = \"{}\"\n", SECRET);
        for extra in [
            "[git]\ntimeout_secs = 0\n",
            "[engine]\nreport_file_name = \"../out.json\"\n",
            "[engine]\nmax_output_bytes = 0\n",
            "[scheduler]\nallowed_schemes = []\n",
            "[scheduler]\nrepository_host = \"github.com\"\n",
        ] {
            assert!(from_toml(&format!("{}{}", base, extra)).is_err(), "{}", extra);
        }
        assert!(from_toml(&format!("log_format = \"xml\"\n{}", base)).is_err());
    }

    #[test]
    fn test_secret_is_not_debug_printed() {
        let settings = from_toml(&format!("[auth]\ntoken_secret = \"{}\"\n", SECRET)).unwrap();
        assert!(!format!("{:?}", settings).contains(SECRET));
    }
}

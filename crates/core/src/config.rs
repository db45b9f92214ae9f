// Scheduler configuration (explicit, immutable after startup)

/// Default host used to resolve `owner/name` repository ids
pub const DEFAULT_REPOSITORY_HOST: &str = "https://github.com";

/// Submission and dispatch settings handed to the `JobScheduler`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base URL prepended to `owner/name` ids to form a clone URL
    pub repository_host: String,
    /// URL schemes accepted for explicit clone URLs
    pub allowed_schemes: Vec<String>,
    /// Reject submissions whose session carries no code-host credential
    pub require_external_credential: bool,
    /// Upper bound on concurrently running pipelines (0 = unbounded)
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            repository_host: DEFAULT_REPOSITORY_HOST.to_string(),
            allowed_schemes: vec!["https".to_string()],
            require_external_credential: true,
            max_concurrent_jobs: 0,
        }
    }
}

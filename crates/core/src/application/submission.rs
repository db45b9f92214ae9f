// Submission validation: turns a raw request into a RepositoryRef

use crate::application::constants::{FORBIDDEN_BRANCH_CHARS, MAX_BRANCH_LEN, MAX_REPOSITORY_REF_LEN};
use crate::config::SchedulerConfig;
use crate::domain::RepositoryRef;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Submit request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Clone URL or `owner/name` id
    pub repository: String,

    #[serde(default)]
    pub branch: Option<String>,
}

impl SubmitRequest {
    pub fn new(repository: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            repository: repository.into(),
            branch,
        }
    }
}

/// Validate `req` and resolve it into the repository to fetch.
///
/// Pure: no store access, no I/O.
pub fn resolve(req: &SubmitRequest, config: &SchedulerConfig) -> Result<RepositoryRef> {
    let clone_url = resolve_repository(&req.repository, config)?;
    let branch = normalize_branch(req.branch.as_deref())?;
    Ok(RepositoryRef::new(clone_url, branch))
}

fn resolve_repository(raw: &str, config: &SchedulerConfig) -> Result<String> {
    let repository = raw.trim();
    if repository.is_empty() {
        return Err(invalid("repository must not be empty"));
    }
    if repository.len() > MAX_REPOSITORY_REF_LEN {
        return Err(invalid(format!(
            "repository exceeds {} bytes",
            MAX_REPOSITORY_REF_LEN
        )));
    }
    if repository.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("repository must not contain whitespace or control characters"));
    }

    if repository.contains("://") {
        resolve_url(repository, config)
    } else {
        resolve_id(repository, config)
    }
}

fn resolve_url(repository: &str, config: &SchedulerConfig) -> Result<String> {
    let url = Url::parse(repository)
        .map_err(|e| invalid(format!("repository is not a valid URL: {}", e)))?;

    if !config
        .allowed_schemes
        .iter()
        .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme()))
    {
        return Err(invalid(format!(
            "URL scheme '{}' is not allowed (allowed: {})",
            url.scheme(),
            config.allowed_schemes.join(", ")
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("repository URL has no host"));
    }
    // Credentials travel out-of-band, never in the URL; ssh keeps its login
    // user (`ssh://git@host/...`) since that is not a secret
    let login_allowed = url.scheme() == "ssh" && url.password().is_none();
    if (!url.username().is_empty() && !login_allowed) || url.password().is_some() {
        return Err(invalid("repository URL must not embed credentials"));
    }

    Ok(url.to_string())
}

fn resolve_id(repository: &str, config: &SchedulerConfig) -> Result<String> {
    let mut parts = repository.split('/');
    let (owner, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) => (owner, name),
        _ => {
            return Err(invalid(
                "repository must be an absolute URL or an 'owner/name' id",
            ))
        }
    };

    for segment in [owner, name] {
        if !is_valid_id_segment(segment) {
            return Err(invalid(format!("invalid repository id segment '{}'", segment)));
        }
    }

    let host = config.repository_host.trim_end_matches('/');
    if name.ends_with(".git") {
        Ok(format!("{}/{}/{}", host, owner, name))
    } else {
        Ok(format!("{}/{}/{}.git", host, owner, name))
    }
}

fn is_valid_id_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && !segment.starts_with('-')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Blank branch means "default branch"
fn normalize_branch(branch: Option<&str>) -> Result<Option<String>> {
    let branch = match branch.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(b) => b,
    };

    if branch.len() > MAX_BRANCH_LEN {
        return Err(invalid(format!("branch exceeds {} bytes", MAX_BRANCH_LEN)));
    }
    // A leading dash would be read as a git option
    if branch.starts_with('-') {
        return Err(invalid("branch must not start with '-'"));
    }
    if branch.contains("..") {
        return Err(invalid("branch must not contain '..'"));
    }
    if branch
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_BRANCH_CHARS.contains(&c))
    {
        return Err(invalid(format!("branch '{}' contains forbidden characters", branch)));
    }

    Ok(Some(branch.to_string()))
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

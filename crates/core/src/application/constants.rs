// Pipeline constants (no magic values)

/// Workspace subdirectory the repository is fetched into
pub const SOURCE_DIR_NAME: &str = "source";

/// Prefix of every workspace directory name
pub const WORKSPACE_PREFIX: &str = "codequal-";

/// Prefix of the engine project key (`codequal-<job_id>`)
pub const PROJECT_KEY_PREFIX: &str = "codequal-";

/// Maximum accepted length of the `repository` field (bytes)
pub const MAX_REPOSITORY_REF_LEN: usize = 2048;

/// Maximum accepted branch name length (bytes)
pub const MAX_BRANCH_LEN: usize = 255;

/// Diagnostic text kept on a failure reason (4 KiB)
pub const DIAGNOSTIC_EXCERPT_LIMIT: usize = 4096;

/// Characters git refuses in ref names
pub const FORBIDDEN_BRANCH_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Build the engine project key for a job
pub fn project_key(job_id: &str) -> String {
    format!("{}{}", PROJECT_KEY_PREFIX, job_id)
}

/// Keep at most `DIAGNOSTIC_EXCERPT_LIMIT` bytes of `text`, cut on a char
/// boundary, with a marker when something was dropped
pub fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= DIAGNOSTIC_EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut end = DIAGNOSTIC_EXCERPT_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &trimmed[..end])
}

//! HTTP Request/Response Types

use serde::{Deserialize, Serialize};

use codequal_core::application::{JobCounts, SubmitRequest};
use codequal_core::error::AppError;

/// POST /analysis/repository
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnalysisRequest {
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub repository_id: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl SubmitAnalysisRequest {
    /// Exactly one of `repositoryUrl` / `repositoryId` must be given
    pub fn into_submit_request(self) -> Result<SubmitRequest, AppError> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let repository = match (non_blank(self.repository_url), non_blank(self.repository_id)) {
            (Some(url), None) => {
                if !url.contains("://") {
                    return Err(AppError::Validation(
                        "repositoryUrl must be an absolute URL".to_string(),
                    ));
                }
                url
            }
            (None, Some(id)) => {
                if id.contains("://") {
                    return Err(AppError::Validation(
                        "repositoryId must be an 'owner/name' id".to_string(),
                    ));
                }
                id
            }
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "give either repositoryUrl or repositoryId, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "repositoryUrl or repositoryId is required".to_string(),
                ))
            }
        };

        Ok(SubmitRequest::new(repository, self.branch))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnalysisResponse {
    pub analysis_id: String,
}

/// GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub jobs: JobCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> SubmitAnalysisRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_url_or_id_is_accepted() {
        let req = parse(r#"{"repositoryUrl": "https://github.com/acme/widgets.git", "branch": "dev"}"#)
            .into_submit_request()
            .unwrap();
        assert_eq!(req.repository, "https://github.com/acme/widgets.git");
        assert_eq!(req.branch.as_deref(), Some("dev"));

        let req = parse(r#"{"repositoryId": "acme/widgets"}"#)
            .into_submit_request()
            .unwrap();
        assert_eq!(req.repository, "acme/widgets");
        assert_eq!(req.branch, None);
    }

    #[test]
    fn test_exactly_one_source_required() {
        for body in [
            r#"{}"#,
            r#"{"repositoryUrl": "  "}"#,
            r#"{"repositoryUrl": "https://github.com/a/b", "repositoryId": "a/b"}"#,
            r#"{"repositoryUrl": "a/b"}"#,
            r#"{"repositoryId": "https://github.com/a/b"}"#,
        ] {
            assert!(
                matches!(parse(body).into_submit_request(), Err(AppError::Validation(_))),
                "{} should be rejected",
                body
            );
        }
    }
}

// Repository Fetcher Port - brings repository content into a workspace

use crate::domain::{ExternalCredential, RepositoryRef};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// What was fetched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedRevision {
    /// HEAD commit SHA, when it could be resolved
    pub commit: Option<String>,
}

/// Fetch errors (bad ref, network, auth all surface as `Rejected`)
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Fetch tool could not be started: {0}")]
    Unavailable(String),

    #[error("Fetch of {repository} rejected: {diagnostics}")]
    Rejected {
        repository: String,
        diagnostics: String,
    },

    #[error("Fetch timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(String),
}

#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Shallow-fetch `repository` into `destination` (which must not exist yet)
    async fn fetch(
        &self,
        repository: &RepositoryRef,
        credential: Option<&ExternalCredential>,
        destination: &Path,
    ) -> Result<FetchedRevision, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock fetcher behavior
    #[derive(Debug, Clone)]
    pub enum MockFetchBehavior {
        /// Create the destination with a single source file
        Success,
        /// Fail with a rejection carrying this diagnostic
        Reject(String),
    }

    pub struct MockFetcher {
        behavior: MockFetchBehavior,
        calls: Arc<Mutex<Vec<(RepositoryRef, bool)>>>,
    }

    impl MockFetcher {
        pub fn new(behavior: MockFetchBehavior) -> Self {
            Self {
                behavior,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockFetchBehavior::Success)
        }

        pub fn new_reject(diagnostics: impl Into<String>) -> Self {
            Self::new(MockFetchBehavior::Reject(diagnostics.into()))
        }

        /// (repository, had_credential) per call
        pub fn calls(&self) -> Vec<(RepositoryRef, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RepositoryFetcher for MockFetcher {
        async fn fetch(
            &self,
            repository: &RepositoryRef,
            credential: Option<&ExternalCredential>,
            destination: &Path,
        ) -> Result<FetchedRevision, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((repository.clone(), credential.is_some()));

            match &self.behavior {
                MockFetchBehavior::Success => {
                    std::fs::create_dir_all(destination).map_err(|e| FetchError::Io(e.to_string()))?;
                    std::fs::write(destination.join("main.rs"), "fn main() {}\n")
                        .map_err(|e| FetchError::Io(e.to_string()))?;
                    Ok(FetchedRevision {
                        commit: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
                    })
                }
                MockFetchBehavior::Reject(diagnostics) => Err(FetchError::Rejected {
                    repository: repository.to_string(),
                    diagnostics: diagnostics.clone(),
                }),
            }
        }
    }
}

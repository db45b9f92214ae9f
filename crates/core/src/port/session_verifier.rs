// Session Verifier Port - resolves a bearer token into a Session

use crate::domain::Session;
use thiserror::Error;

/// Authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Session token expired")]
    ExpiredToken,
}

pub trait SessionVerifier: Send + Sync {
    /// Verify `bearer_token` and return the session it encodes
    fn verify(&self, bearer_token: &str) -> Result<Session, AuthError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ExternalCredential;
    use std::collections::HashMap;

    /// Maps fixed token strings to sessions
    #[derive(Default)]
    pub struct StaticSessionVerifier {
        sessions: HashMap<String, Session>,
    }

    impl StaticSessionVerifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_session(
            mut self,
            token: impl Into<String>,
            subject: impl Into<String>,
            credential: Option<&str>,
        ) -> Self {
            let session = Session::new(subject, credential.map(ExternalCredential::new));
            self.sessions.insert(token.into(), session);
            self
        }
    }

    impl SessionVerifier for StaticSessionVerifier {
        fn verify(&self, bearer_token: &str) -> Result<Session, AuthError> {
            self.sessions
                .get(bearer_token)
                .cloned()
                .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
        }
    }
}

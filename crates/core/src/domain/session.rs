// Authenticated caller context, produced by the identity collaborator

/// Opaque code-host credential (e.g. an OAuth access token).
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalCredential(String);

impl ExternalCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ExternalCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExternalCredential(<redacted>)")
    }
}

/// Authenticated session: who is calling, and which code-host credential
/// (if any) they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub external_credential: Option<ExternalCredential>,
}

impl Session {
    pub fn new(subject: impl Into<String>, external_credential: Option<ExternalCredential>) -> Self {
        Self {
            subject: subject.into(),
            external_credential,
        }
    }
}

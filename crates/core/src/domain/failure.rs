// Failure reasons recorded on failed jobs

use serde::{Serialize, Serializer};

/// Pipeline failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Workspace,
    Fetch,
    Engine,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Workspace => write!(f, "WorkspaceError"),
            FailureKind::Fetch => write!(f, "FetchError"),
            FailureKind::Engine => write!(f, "EngineError"),
        }
    }
}

/// Human-readable reason attached to a `Failed` job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn workspace(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Workspace, message)
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Fetch, message)
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Engine, message)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// Serialized as the rendered "<Kind>: <message>" string
impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Domain Layer - Pure business logic and entities

pub mod error;
pub mod failure;
pub mod job;
pub mod report;
pub mod session;

// Re-exports
pub use error::DomainError;
pub use failure::{FailureKind, FailureReason};
pub use job::{AnalysisJob, JobId, JobState, JobStatus, RepositoryRef};
pub use report::{Issue, IssueStatus, IssueType, Metrics, Rating, Report, Severity};
pub use session::{ExternalCredential, Session};

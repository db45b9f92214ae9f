// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("Unknown issue type: {0}")]
    UnknownIssueType(String),

    #[error("Unknown issue status: {0}")]
    UnknownIssueStatus(String),

    #[error("Invalid rating: {0}")]
    InvalidRating(String),

    #[error("Metric {name} out of range: {value}")]
    MetricOutOfRange { name: String, value: f64 },
}

pub type Result<T> = std::result::Result<T, DomainError>;

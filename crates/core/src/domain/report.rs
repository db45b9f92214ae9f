// Report Domain Model (normalized engine output)

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Issue severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "MINOR" => Ok(Severity::Minor),
            "MAJOR" => Ok(Severity::Major),
            "CRITICAL" => Ok(Severity::Critical),
            "BLOCKER" => Ok(Severity::Blocker),
            _ => Err(DomainError::UnknownSeverity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    CodeSmell,
    Bug,
    Vulnerability,
}

impl FromStr for IssueType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CODE_SMELL" => Ok(IssueType::CodeSmell),
            "BUG" => Ok(IssueType::Bug),
            "VULNERABILITY" => Ok(IssueType::Vulnerability),
            _ => Err(DomainError::UnknownIssueType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Confirmed,
    Reopened,
    Resolved,
    Closed,
}

impl FromStr for IssueStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(IssueStatus::Open),
            "CONFIRMED" => Ok(IssueStatus::Confirmed),
            "REOPENED" => Ok(IssueStatus::Reopened),
            "RESOLVED" => Ok(IssueStatus::Resolved),
            "CLOSED" => Ok(IssueStatus::Closed),
            _ => Err(DomainError::UnknownIssueStatus(s.to_string())),
        }
    }
}

/// Letter rating, A (best) to E (worst)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    A,
    B,
    C,
    D,
    E,
}

impl Rating {
    /// Numeric form used by the engine's measures (1.0 = A ... 5.0 = E)
    pub fn from_numeric(value: f64) -> Result<Self, DomainError> {
        match value.round() as i64 {
            1 => Ok(Rating::A),
            2 => Ok(Rating::B),
            3 => Ok(Rating::C),
            4 => Ok(Rating::D),
            5 => Ok(Rating::E),
            _ => Err(DomainError::InvalidRating(value.to_string())),
        }
    }

    /// Rating implied by the worst open finding of a category
    pub fn from_worst_severity(worst: Option<Severity>) -> Self {
        match worst {
            None => Rating::A,
            Some(Severity::Info) | Some(Severity::Minor) => Rating::B,
            Some(Severity::Major) => Rating::C,
            Some(Severity::Critical) => Rating::D,
            Some(Severity::Blocker) => Rating::E,
        }
    }

    /// Maintainability rating grid over the technical debt ratio (percent)
    pub fn from_debt_ratio(ratio: f64) -> Self {
        if ratio <= 5.0 {
            Rating::A
        } else if ratio <= 10.0 {
            Rating::B
        } else if ratio <= 20.0 {
            Rating::C
        } else if ratio <= 50.0 {
            Rating::D
        } else {
            Rating::E
        }
    }
}

impl FromStr for Rating {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "A" => Ok(Rating::A),
            "B" => Ok(Rating::B),
            "C" => Ok(Rating::C),
            "D" => Ok(Rating::D),
            "E" => Ok(Rating::E),
            _ => trimmed
                .parse::<f64>()
                .map_err(|_| DomainError::InvalidRating(s.to_string()))
                .and_then(Rating::from_numeric),
        }
    }
}

/// A single finding reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub rule: String,
    pub severity: Severity,
    /// Path within the repository
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub status: IssueStatus,
}

/// Quality metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub code_smells: u64,
    pub bugs: u64,
    pub vulnerabilities: u64,
    pub security_hotspots: u64,
    /// Duplicated lines density, 0-100
    pub duplication_density: f64,
    /// Line coverage, 0-100 (absent when the engine measured none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    pub reliability_rating: Rating,
    pub security_rating: Rating,
    pub maintainability_rating: Rating,
}

impl Metrics {
    /// Validate a percentage metric
    pub fn check_percentage(name: &str, value: f64) -> Result<f64, DomainError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(value)
        } else {
            Err(DomainError::MetricOutOfRange {
                name: name.to_string(),
                value,
            })
        }
    }
}

/// Normalized analysis report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Engine output order
    pub issues: Vec<Issue>,
    pub metrics: Metrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Minor < Severity::Major);
        assert!(Severity::Major < Severity::Critical);
        assert!(Severity::Critical < Severity::Blocker);
        assert!(Severity::Info < Severity::Minor);
    }

    #[test]
    fn test_enums_parse_case_insensitively() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("Code_Smell".parse::<IssueType>().unwrap(), IssueType::CodeSmell);
        assert_eq!("reopened".parse::<IssueStatus>().unwrap(), IssueStatus::Reopened);
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        assert_eq!(
            "warning".parse::<Severity>().unwrap_err(),
            DomainError::UnknownSeverity("warning".to_string())
        );
        assert!("SECURITY_HOTSPOT".parse::<IssueType>().is_err());
        assert!("WONTFIX".parse::<IssueStatus>().is_err());
    }

    #[test]
    fn test_rating_parses_letters_and_numbers() {
        assert_eq!("1.0".parse::<Rating>().unwrap(), Rating::A);
        assert_eq!("3".parse::<Rating>().unwrap(), Rating::C);
        assert_eq!("e".parse::<Rating>().unwrap(), Rating::E);
        assert!("6.0".parse::<Rating>().is_err());
        assert!("F".parse::<Rating>().is_err());
    }

    #[test]
    fn test_rating_from_worst_severity() {
        assert_eq!(Rating::from_worst_severity(None), Rating::A);
        assert_eq!(Rating::from_worst_severity(Some(Severity::Minor)), Rating::B);
        assert_eq!(Rating::from_worst_severity(Some(Severity::Blocker)), Rating::E);
    }

    #[test]
    fn test_rating_from_debt_ratio() {
        assert_eq!(Rating::from_debt_ratio(0.0), Rating::A);
        assert_eq!(Rating::from_debt_ratio(7.5), Rating::B);
        assert_eq!(Rating::from_debt_ratio(20.0), Rating::C);
        assert_eq!(Rating::from_debt_ratio(99.0), Rating::E);
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(Metrics::check_percentage("coverage", 100.0).is_ok());
        assert!(Metrics::check_percentage("coverage", -0.1).is_err());
        assert!(Metrics::check_percentage("coverage", f64::NAN).is_err());
    }

    #[test]
    fn test_issue_serialization_shape() {
        let issue = Issue {
            id: "AX-1".to_string(),
            rule: "rust:S1481".to_string(),
            severity: Severity::Major,
            component: "src/main.rs".to_string(),
            line: None,
            message: "Remove this unused variable".to_string(),
            issue_type: IssueType::CodeSmell,
            status: IssueStatus::Open,
        };

        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "CODE_SMELL");
        assert_eq!(value["severity"], "MAJOR");
        assert!(value.get("line").is_none());
    }
}

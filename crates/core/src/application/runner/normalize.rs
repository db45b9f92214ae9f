// Engine output normalization
//
// The engine speaks a SonarQube-web-API-shaped JSON document; this module
// turns it into the domain `Report` or rejects it. It never returns an empty
// report for output it could not understand.

use crate::domain::{Issue, IssueStatus, IssueType, Metrics, Rating, Report, Severity};
use crate::port::EngineError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const HOTSPOT_TYPE: &str = "SECURITY_HOTSPOT";

#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default)]
    issues: Option<Vec<RawIssue>>,
    #[serde(default)]
    measures: Option<Vec<RawMeasure>>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: Option<String>,
    rule: Option<String>,
    severity: Option<String>,
    component: Option<String>,
    line: Option<u32>,
    message: Option<String>,
    #[serde(rename = "type")]
    issue_type: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMeasure {
    metric: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Parse raw engine output into a `Report`.
///
/// `project_key` is stripped from component paths (`<key>:src/lib.rs`).
pub fn parse_report(raw: &str, project_key: &str) -> Result<Report, EngineError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EngineError::EmptyOutput);
    }

    let document: RawReport = serde_json::from_str(raw)
        .map_err(|e| EngineError::InvalidOutput(format!("not a report document: {}", e)))?;

    if document.issues.is_none() && document.measures.is_none() {
        return Err(EngineError::InvalidOutput(
            "document has neither issues nor measures".to_string(),
        ));
    }

    let mut issues = Vec::new();
    let mut hotspot_count: u64 = 0;
    for (index, raw_issue) in document.issues.unwrap_or_default().into_iter().enumerate() {
        if raw_issue
            .issue_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(HOTSPOT_TYPE))
        {
            hotspot_count += 1;
            continue;
        }
        issues.push(normalize_issue(raw_issue, index, project_key)?);
    }

    let measures = collect_measures(document.measures.unwrap_or_default())?;
    let metrics = build_metrics(&issues, hotspot_count, &measures)?;

    Ok(Report { issues, metrics })
}

fn normalize_issue(raw: RawIssue, index: usize, project_key: &str) -> Result<Issue, EngineError> {
    let id = required(raw.key, "key", index)?;
    let rule = required(raw.rule, "rule", index)?;
    let severity: Severity = required(raw.severity, "severity", index)?
        .parse()
        .map_err(invalid)?;
    let issue_type: IssueType = required(raw.issue_type, "type", index)?
        .parse()
        .map_err(invalid)?;
    let status = match raw.status.as_deref().map(str::trim) {
        None | Some("") => IssueStatus::Open,
        Some(s) => s.parse().map_err(invalid)?,
    };

    let component = raw.component.unwrap_or_default();
    let prefix = format!("{}:", project_key);
    let component = component
        .strip_prefix(&prefix)
        .map(str::to_string)
        .unwrap_or(component);

    Ok(Issue {
        id,
        rule,
        severity,
        component,
        line: raw.line,
        message: raw.message.unwrap_or_default(),
        issue_type,
        status,
    })
}

fn required(value: Option<String>, field: &str, index: usize) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::InvalidOutput(format!(
            "issue #{} is missing '{}'",
            index, field
        ))),
    }
}

fn invalid(e: crate::domain::DomainError) -> EngineError {
    EngineError::InvalidOutput(e.to_string())
}

/// Metric name -> textual value; null values are dropped
fn collect_measures(raw: Vec<RawMeasure>) -> Result<HashMap<String, String>, EngineError> {
    let mut measures = HashMap::new();
    for measure in raw {
        let text = match measure.value {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(EngineError::InvalidOutput(format!(
                    "measure '{}' has a non-scalar value: {}",
                    measure.metric, other
                )))
            }
        };
        measures.insert(measure.metric, text);
    }
    Ok(measures)
}

fn number(measures: &HashMap<String, String>, metric: &str) -> Result<Option<f64>, EngineError> {
    measures
        .get(metric)
        .map(|text| {
            text.trim().parse::<f64>().map_err(|_| {
                EngineError::InvalidOutput(format!("measure '{}' is not numeric: {}", metric, text))
            })
        })
        .transpose()
}

fn count(
    measures: &HashMap<String, String>,
    metric: &str,
    derived: u64,
) -> Result<u64, EngineError> {
    match number(measures, metric)? {
        None => Ok(derived),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        Some(v) => Err(EngineError::InvalidOutput(format!(
            "measure '{}' is not a count: {}",
            metric, v
        ))),
    }
}

fn percentage(measures: &HashMap<String, String>, metric: &str) -> Result<Option<f64>, EngineError> {
    number(measures, metric)?
        .map(|v| Metrics::check_percentage(metric, v).map_err(invalid))
        .transpose()
}

fn rating(measures: &HashMap<String, String>, metric: &str) -> Result<Option<Rating>, EngineError> {
    measures
        .get(metric)
        .map(|text| text.parse::<Rating>().map_err(invalid))
        .transpose()
}

fn worst_severity(issues: &[Issue], issue_type: IssueType) -> Option<Severity> {
    issues
        .iter()
        .filter(|issue| issue.issue_type == issue_type)
        .map(|issue| issue.severity)
        .max()
}

fn build_metrics(
    issues: &[Issue],
    hotspot_count: u64,
    measures: &HashMap<String, String>,
) -> Result<Metrics, EngineError> {
    let of_type = |t: IssueType| issues.iter().filter(|i| i.issue_type == t).count() as u64;

    let reliability_rating = match rating(measures, "reliability_rating")? {
        Some(r) => r,
        None => Rating::from_worst_severity(worst_severity(issues, IssueType::Bug)),
    };
    let security_rating = match rating(measures, "security_rating")? {
        Some(r) => r,
        None => Rating::from_worst_severity(worst_severity(issues, IssueType::Vulnerability)),
    };
    let maintainability_rating = match rating(measures, "sqale_rating")? {
        Some(r) => r,
        None => match number(measures, "sqale_debt_ratio")? {
            Some(ratio) if ratio.is_finite() && ratio >= 0.0 => Rating::from_debt_ratio(ratio),
            Some(ratio) => {
                return Err(EngineError::InvalidOutput(format!(
                    "measure 'sqale_debt_ratio' is invalid: {}",
                    ratio
                )))
            }
            None => Rating::A,
        },
    };

    Ok(Metrics {
        code_smells: count(measures, "code_smells", of_type(IssueType::CodeSmell))?,
        bugs: count(measures, "bugs", of_type(IssueType::Bug))?,
        vulnerabilities: count(measures, "vulnerabilities", of_type(IssueType::Vulnerability))?,
        security_hotspots: count(measures, "security_hotspots", hotspot_count)?,
        duplication_density: percentage(measures, "duplicated_lines_density")?.unwrap_or(0.0),
        coverage: percentage(measures, "coverage")?,
        reliability_rating,
        security_rating,
        maintainability_rating,
    })
}

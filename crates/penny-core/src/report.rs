//! Audit report parsing and the durable audit record.
//!
//! Models are asked to answer with a single JSON object. In practice the
//! object often arrives wrapped in a Markdown code fence or surrounded by
//! prose, so parsing extracts the outermost `{...}` span before
//! deserializing. A transport-successful response with no parseable object
//! is an error — never a silent success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single finding inside an audit report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Area of the user's finances the finding concerns.
    pub area: String,
    /// What the model observed.
    pub detail: String,
    /// Concrete next step, when the model offered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Structured result of one audit, parsed from the model's final text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// One-line summary of the audit.
    pub headline: String,
    /// Letter or word grade, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    /// Individual findings.
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Estimated monthly savings if all suggestions are followed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_monthly_savings: Option<f64>,
}

/// The durable artifact written on success.
///
/// Constructed by the orchestrator, persisted by the host's sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// When the audit completed.
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the form inputs that produced the audit.
    pub form_snapshot: serde_json::Value,
    /// The parsed result.
    pub parsed_result: AuditReport,
    /// Whether this was a test run rather than a real audit.
    pub is_test_run: bool,
}

/// Failure to extract a structured report from response text.
#[derive(Debug, Error)]
pub enum ReportParseError {
    /// The text contains no JSON object at all.
    #[error("response contains no JSON object")]
    NoJsonObject,

    /// A JSON object was found but did not deserialize as a report.
    #[error("response JSON is not a valid report: {0}")]
    InvalidShape(#[from] serde_json::Error),
}

/// Parse an audit report out of raw model text.
///
/// Tolerates code fences and prose around the object by slicing from the
/// first `{` to the last `}` before deserializing.
pub fn parse_report(text: &str) -> Result<AuditReport, ReportParseError> {
    let start = text.find('{').ok_or(ReportParseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ReportParseError::NoJsonObject)?;
    if end < start {
        return Err(ReportParseError::NoJsonObject);
    }
    let report = serde_json::from_str(&text[start..=end])?;
    Ok(report)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

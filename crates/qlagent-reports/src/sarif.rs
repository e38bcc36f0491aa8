//! SARIF (Static Analysis Results Interchange Format) v2.1.0 read model.
//! Spec: https://docs.oasis-open.org/sarif/sarif/v2.1.0/sarif-v2.1.0.html
//!
//! This is a read-only view of the documents the engine writes. Every field
//! beyond the rule identifier is optional: a result whose rule metadata is
//! missing or unmatched still yields an alert, with the rule-derived fields
//! absent. A missing rule catalog or result list means "no findings", not a
//! parse failure.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use qlagent_core::Alert;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read result document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Result document {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct SarifDocument {
    #[serde(default)]
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SarifRun {
    #[serde(default)]
    pub tool: SarifTool,
    #[serde(default)]
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SarifTool {
    #[serde(default)]
    pub driver: SarifDriver,
}

#[derive(Debug, Default, Deserialize)]
pub struct SarifDriver {
    #[serde(default)]
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Deserialize)]
pub struct SarifRule {
    pub id: String,
    #[serde(rename = "shortDescription")]
    pub short_description: Option<SarifMessage>,
    #[serde(rename = "defaultConfiguration")]
    pub default_configuration: Option<SarifConfiguration>,
    pub properties: Option<SarifRuleProperties>,
}

#[derive(Debug, Deserialize)]
pub struct SarifConfiguration {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SarifRuleProperties {
    // Engines emit this as either a JSON string or a number.
    #[serde(rename = "security-severity")]
    pub security_severity: Option<serde_json::Value>,
    pub precision: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SarifMessage {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SarifResult {
    #[serde(rename = "ruleId")]
    pub rule_id: Option<String>,
    pub message: Option<SarifMessage>,
    #[serde(default)]
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Deserialize)]
pub struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    pub physical_location: Option<SarifPhysicalLocation>,
}

#[derive(Debug, Deserialize)]
pub struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    pub artifact_location: Option<SarifArtifactLocation>,
    pub region: Option<SarifRegion>,
}

#[derive(Debug, Deserialize)]
pub struct SarifArtifactLocation {
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SarifRegion {
    #[serde(rename = "startLine")]
    pub start_line: Option<i64>,
    #[serde(rename = "endLine")]
    pub end_line: Option<i64>,
}

impl SarifDocument {
    pub fn from_path(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ReportError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| ReportError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Normalize the first run's results into alerts, in document order.
    pub fn alerts(&self) -> Vec<Alert> {
        let Some(run) = self.runs.first() else {
            return Vec::new();
        };
        let rules = &run.tool.driver.rules;

        run.results
            .iter()
            .map(|result| normalize_result(result, rules))
            .collect()
    }
}

/// Parse one result document into a normalized alert list.
pub fn parse_alerts(path: &Path) -> Result<Vec<Alert>, ReportError> {
    let document = SarifDocument::from_path(path)?;
    let alerts = document.alerts();
    debug!("{}: {} alert(s)", path.display(), alerts.len());
    Ok(alerts)
}

fn normalize_result(result: &SarifResult, rules: &[SarifRule]) -> Alert {
    let rule_id = result.rule_id.clone().unwrap_or_default();
    let rule = rules.iter().find(|rule| rule.id == rule_id);

    let title = rule
        .and_then(|r| r.short_description.as_ref())
        .and_then(|m| m.text.clone());
    let level = rule
        .and_then(|r| r.default_configuration.as_ref())
        .and_then(|c| c.level.clone());
    let security_severity = rule
        .and_then(|r| r.properties.as_ref())
        .and_then(|p| p.security_severity.as_ref())
        .and_then(severity_score);
    let precision = rule
        .and_then(|r| r.properties.as_ref())
        .and_then(|p| p.precision.clone());

    Alert {
        id: rule_id,
        title,
        level,
        security_severity,
        precision,
        location: format_location(result),
    }
}

/// `security-severity` arrives as `"8.8"` or `8.8` depending on the engine
/// version; anything unparsable stays absent.
fn severity_score(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `uri#Lstart[-end]` from the first physical location. The line suffix is
/// only appended when a start line is reported.
fn format_location(result: &SarifResult) -> Option<String> {
    let physical = result
        .locations
        .first()
        .and_then(|l| l.physical_location.as_ref())?;
    let uri = physical
        .artifact_location
        .as_ref()
        .and_then(|a| a.uri.clone())?;

    let Some(start) = physical.region.as_ref().and_then(|r| r.start_line) else {
        return Some(uri);
    };
    match physical.region.as_ref().and_then(|r| r.end_line) {
        Some(end) => Some(format!("{uri}#L{start}-{end}")),
        None => Some(format!("{uri}#L{start}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_doc(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    const FULL_DOC: &str = r#"{
        "runs": [{
            "tool": {"driver": {"rules": [{
                "id": "js/sql-injection",
                "shortDescription": {"text": "Database query built from user-controlled sources"},
                "defaultConfiguration": {"level": "error"},
                "properties": {"security-severity": "8.8", "precision": "high"}
            }]}},
            "results": [{
                "ruleId": "js/sql-injection",
                "message": {"text": "This query depends on a user-provided value."},
                "locations": [{"physicalLocation": {
                    "artifactLocation": {"uri": "app/routes.js"},
                    "region": {"startLine": 10, "endLine": 15}
                }}]
            }]
        }]
    }"#;

    #[test]
    fn test_full_document() {
        let file = write_doc(FULL_DOC);
        let alerts = parse_alerts(file.path()).unwrap();
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.id, "js/sql-injection");
        assert_eq!(
            alert.title.as_deref(),
            Some("Database query built from user-controlled sources")
        );
        assert_eq!(alert.level.as_deref(), Some("error"));
        assert_eq!(alert.security_severity, Some(8.8));
        assert_eq!(alert.precision.as_deref(), Some("high"));
        assert_eq!(alert.location.as_deref(), Some("app/routes.js#L10-15"));
    }

    #[test]
    fn test_unmatched_rule_keeps_location_only() {
        let file = write_doc(
            r#"{
            "runs": [{
                "tool": {"driver": {"rules": []}},
                "results": [{
                    "ruleId": "py/unknown-rule",
                    "locations": [{"physicalLocation": {
                        "artifactLocation": {"uri": "main.py"},
                        "region": {"startLine": 10}
                    }}]
                }]
            }]
        }"#,
        );
        let alerts = parse_alerts(file.path()).unwrap();
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.id, "py/unknown-rule");
        assert!(alert.title.is_none());
        assert!(alert.level.is_none());
        assert!(alert.security_severity.is_none());
        assert!(alert.precision.is_none());
        assert_eq!(alert.location.as_deref(), Some("main.py#L10"));
    }

    #[test]
    fn test_empty_and_absent_sections() {
        let file = write_doc(r#"{"runs": []}"#);
        assert!(parse_alerts(file.path()).unwrap().is_empty());

        let file = write_doc(r#"{"runs": [{}]}"#);
        assert!(parse_alerts(file.path()).unwrap().is_empty());

        let file = write_doc(r#"{}"#);
        assert!(parse_alerts(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_line_suffix_rules() {
        let file = write_doc(
            r#"{
            "runs": [{
                "results": [
                    {"ruleId": "a", "locations": [{"physicalLocation": {
                        "artifactLocation": {"uri": "x.go"},
                        "region": {"startLine": 10}
                    }}]},
                    {"ruleId": "b", "locations": [{"physicalLocation": {
                        "artifactLocation": {"uri": "y.go"},
                        "region": {"startLine": 10, "endLine": 15}
                    }}]},
                    {"ruleId": "c", "locations": [{"physicalLocation": {
                        "artifactLocation": {"uri": "z.go"}
                    }}]},
                    {"ruleId": "d", "locations": []}
                ]
            }]
        }"#,
        );
        let alerts = parse_alerts(file.path()).unwrap();
        assert_eq!(alerts[0].location.as_deref(), Some("x.go#L10"));
        assert_eq!(alerts[1].location.as_deref(), Some("y.go#L10-15"));
        assert_eq!(alerts[2].location.as_deref(), Some("z.go"));
        assert!(alerts[3].location.is_none());
    }

    #[test]
    fn test_numeric_security_severity() {
        let file = write_doc(
            r#"{
            "runs": [{
                "tool": {"driver": {"rules": [{
                    "id": "a",
                    "properties": {"security-severity": 6.1}
                }]}},
                "results": [{"ruleId": "a"}]
            }]
        }"#,
        );
        let alerts = parse_alerts(file.path()).unwrap();
        assert_eq!(alerts[0].security_severity, Some(6.1));
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let file = write_doc(FULL_DOC);
        let first = parse_alerts(file.path()).unwrap();
        let second = parse_alerts(file.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let file = write_doc("not json at all");
        assert!(matches!(
            parse_alerts(file.path()),
            Err(ReportError::Json { .. })
        ));
    }
}

//! Normalized alert model.
//!
//! An [`Alert`] is the terminal output of the scan pipeline: one finding
//! extracted from an engine result document. Fields that the rule catalog
//! did not supply stay `None`; consumers must treat absence as "unknown",
//! never coerce it to a default.

use serde::{Deserialize, Serialize};

/// A normalized finding extracted from a result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Rule identifier, e.g. `js/sql-injection`.
    pub id: String,
    /// Human-readable rule title.
    pub title: Option<String>,
    /// Engine-defined level: `error`, `warning`, `note`, ...
    pub level: Option<String>,
    /// Numeric security-severity score from the rule metadata.
    pub security_severity: Option<f64>,
    /// Rule precision tag: `very-high`, `high`, `medium`, ...
    pub precision: Option<String>,
    /// `file/uri#Lstart[-end]`; present whenever the result carried at
    /// least one physical location.
    pub location: Option<String>,
}

impl Alert {
    /// The logging priority this alert should be reported at.
    #[must_use]
    pub fn report_level(&self) -> ReportLevel {
        ReportLevel::from_engine_level(self.level.as_deref())
    }
}

/// Logging priority for reporting a found alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl ReportLevel {
    /// Map an engine severity level onto a logging priority. Unmapped
    /// values fall through to the lowest priority rather than failing.
    #[must_use]
    pub fn from_engine_level(level: Option<&str>) -> Self {
        match level {
            Some("error") => ReportLevel::Error,
            Some("warning") => ReportLevel::Warn,
            Some("note") | Some("recommendation") => ReportLevel::Info,
            _ => ReportLevel::Debug,
        }
    }
}

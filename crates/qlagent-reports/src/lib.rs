//! Result-document parsing for qlagent.

pub mod sarif;

pub use sarif::{parse_alerts, ReportError, SarifDocument};

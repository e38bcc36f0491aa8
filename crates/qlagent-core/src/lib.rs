//! Core types and traits for qlagent.

pub mod alert;
pub mod language;

pub use alert::{Alert, ReportLevel};
pub use language::QlLanguage;

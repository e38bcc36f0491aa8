pub mod cli;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod pipeline;
pub mod repo;
pub mod reporter;

pub use qlagent_core::{Alert, QlLanguage, ReportLevel};

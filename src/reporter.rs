//! Found-alert reporting.
//!
//! Reporting goes through its own sink contract, independent of the
//! diagnostic logger, so findings can be routed to a different channel
//! (console, notification webhook) without touching pipeline logs.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use qlagent_core::{Alert, ReportLevel};

/// Destination for normalized findings.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn report(&self, alert: &Alert) -> Result<()>;
}

/// Logs each alert at its classified level.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

fn describe(alert: &Alert) -> String {
    let mut line = format!("[{}]", alert.id);
    if let Some(title) = &alert.title {
        line.push_str(&format!(" {title}"));
    }
    if let Some(severity) = alert.security_severity {
        line.push_str(&format!(" severity={severity}"));
    }
    if let Some(precision) = &alert.precision {
        line.push_str(&format!(" precision={precision}"));
    }
    if let Some(location) = &alert.location {
        line.push_str(&format!(" at {location}"));
    }
    line
}

#[async_trait]
impl AlertSink for ConsoleReporter {
    async fn report(&self, alert: &Alert) -> Result<()> {
        let line = describe(alert);
        match alert.report_level() {
            ReportLevel::Error => error!(target: "qlagent::alerts", "{line}"),
            ReportLevel::Warn => warn!(target: "qlagent::alerts", "{line}"),
            ReportLevel::Info => info!(target: "qlagent::alerts", "{line}"),
            ReportLevel::Debug => debug!(target: "qlagent::alerts", "{line}"),
        }
        Ok(())
    }
}

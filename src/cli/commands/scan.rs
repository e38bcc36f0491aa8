use std::time::Duration;

use anyhow::Result;
use tracing::info;

use qlagent_executor::{CommandRunner, FatalMarkers, RunnerConfig};

use crate::cli::args::Args;
use crate::config::AgentConfig;
use crate::pipeline::{Pipeline, ScanOutcome};
use crate::reporter::ConsoleReporter;

pub async fn run_scan_command(target: &str, args: &Args) -> Result<()> {
    let config = AgentConfig::load(args.config.as_deref())?;
    let options = args.scan_options(&config);

    // Fail fast: both external tools must resolve before any pipeline starts.
    CommandRunner::ensure_installed(&config.engine.binary).await?;
    CommandRunner::ensure_installed(&config.engine.vcs_binary).await?;

    let runner = CommandRunner::new(RunnerConfig {
        fatal_markers: FatalMarkers::new(config.engine.fatal_markers.clone()),
        timeout: config.engine.timeout_secs.map(Duration::from_secs),
    });
    let sink = ConsoleReporter;
    let pipeline = Pipeline::new(&runner, &config, &sink);

    match pipeline.scan_target(target, options).await? {
        ScanOutcome::Alerts(alerts) => {
            info!("Scan finished: {} alert(s) found", alerts.len());
        }
        ScanOutcome::Database(path) => {
            info!("Database created at {}; scan skipped", path.display());
        }
    }
    Ok(())
}

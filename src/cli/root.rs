use anyhow::Result;
use clap::Parser;

use crate::cli::args::{validate_args, Args};
use crate::cli::commands::run_scan_command;

pub struct RootCommand;

impl RootCommand {
    pub async fn execute() -> Result<()> {
        let args = Args::parse();

        let default_filter = if args.verbose {
            "qlagent=debug,qlagent_executor=debug,qlagent_reports=debug"
        } else {
            "info"
        };
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
            )
            .with_target(false)
            .init();

        println!("qlagent v{}", env!("CARGO_PKG_VERSION"));

        let target = validate_args(&args)?.to_string();
        run_scan_command(&target, &args).await
    }
}

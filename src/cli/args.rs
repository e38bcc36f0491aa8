use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::AgentConfig;
use crate::pipeline::ScanOptions;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Automate the process of using CodeQL, a semantic code analysis engine, to execute code scanning in source.",
    long_about = None
)]
pub struct Args {
    /// Source code folder, batch list file, or remote repository
    /// (e.g. https://github.com/OWASP/NodeGoat)
    pub target: Option<String>,

    /// Language of source code. Omit to auto-detect.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Output folder. Default: <target>-codeql-results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Build command for compiled languages; omit to let the engine
    /// autobuild.
    #[arg(short = 'c', long = "command")]
    pub build_command: Option<String>,

    /// Number of threads to use. Pass 0 to use one thread per core.
    #[arg(short, long, default_value_t = 1)]
    pub threads: u32,

    /// Query suite to run. Default: <language>-security-extended.qls
    #[arg(long)]
    pub query: Option<String>,

    /// Output format. Default: sarif-latest
    #[arg(long)]
    pub format: Option<String>,

    /// Overwrite an existing database.
    #[arg(long)]
    pub overwrite: bool,

    /// Do not download missing queries before analyzing.
    #[arg(long)]
    pub no_download: bool,

    /// Remove the remote repository after cloning.
    #[arg(long)]
    pub remove_remote_repository: bool,

    /// Database folder path.
    #[arg(long)]
    pub db_output: Option<PathBuf>,

    /// Remove the database after scanning.
    #[arg(long)]
    pub remove_database: bool,

    /// Only create the database, do not scan.
    #[arg(long)]
    pub create_db_only: bool,

    /// Batch-list targets scanned in parallel. Default: 1 (sequential).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file path. Default: qlagent.toml, then the user config dir.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Effective scan options: CLI flags over configuration defaults.
    pub fn scan_options(&self, config: &AgentConfig) -> ScanOptions {
        ScanOptions {
            language: self.language.clone(),
            output: self.output.clone(),
            db_output: self.db_output.clone(),
            command: self.build_command.clone(),
            threads: self.threads,
            query: self.query.clone(),
            format: self.format.clone(),
            overwrite: self.overwrite,
            download: !self.no_download,
            remove_remote_repository: self.remove_remote_repository,
            remove_database: self.remove_database,
            create_db_only: self.create_db_only,
            verbose: self.verbose,
            concurrency: self.concurrency.unwrap_or(config.batch.concurrency),
        }
    }
}

pub fn validate_args(args: &Args) -> Result<&str> {
    match args.target.as_deref() {
        Some(target) if !target.trim().is_empty() => Ok(target),
        _ => anyhow::bail!("Target must be specified: a source folder, a batch list file, or a repository URL"),
    }
}

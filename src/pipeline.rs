//! Scan orchestration: single-target pipeline and batch fan-out.
//!
//! A batch-list target launches one independent pipeline per line, gated by
//! a bounded-concurrency stream. Everything inside a single pipeline is
//! strictly sequential: clone, then database creation, then one scan per
//! language (the languages share the database's on-disk lock).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tracing::{info, warn};

use qlagent_core::Alert;
use qlagent_executor::{CommandRunner, RunnerError};
use qlagent_reports::parse_alerts;

use crate::config::AgentConfig;
use crate::database::{create_database, DATABASE_SUFFIX};
use crate::dispatch::dispatch;
use crate::repo::{classify_target, clone_remote, remove_folder, ResolvedTarget};
use crate::reporter::AlertSink;

/// Per-invocation scan configuration. Each batch sibling receives its own
/// clone so per-target mutation never leaks across siblings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Language override; skips auto-detection when set.
    pub language: Option<String>,
    /// Results directory override.
    pub output: Option<PathBuf>,
    /// Database path override.
    pub db_output: Option<PathBuf>,
    /// Build command for compiled languages.
    pub command: Option<String>,
    /// Threads for the engine; 0 means one per core.
    pub threads: u32,
    /// Query suite override.
    pub query: Option<String>,
    /// Output format override.
    pub format: Option<String>,
    pub overwrite: bool,
    /// Download missing queries before analyzing.
    pub download: bool,
    pub remove_remote_repository: bool,
    pub remove_database: bool,
    pub create_db_only: bool,
    pub verbose: bool,
    /// Batch fan-out width.
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            language: None,
            output: None,
            db_output: None,
            command: None,
            threads: 1,
            query: None,
            format: None,
            overwrite: false,
            download: true,
            remove_remote_repository: false,
            remove_database: false,
            create_db_only: false,
            verbose: false,
            concurrency: 1,
        }
    }
}

impl ScanOptions {
    /// Key/value view of the effective options, for the verbose dump before
    /// database creation.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        fn opt<T: std::fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "unset".to_string(), ToString::to_string)
        }

        vec![
            ("language", opt(&self.language)),
            (
                "output",
                opt(&self.output.as_ref().map(|p| p.display().to_string())),
            ),
            (
                "db-output",
                opt(&self.db_output.as_ref().map(|p| p.display().to_string())),
            ),
            ("command", opt(&self.command)),
            ("threads", self.threads.to_string()),
            ("query", opt(&self.query)),
            ("format", opt(&self.format)),
            ("overwrite", self.overwrite.to_string()),
            ("download", self.download.to_string()),
            (
                "remove-remote-repository",
                self.remove_remote_repository.to_string(),
            ),
            ("remove-database", self.remove_database.to_string()),
            ("create-db-only", self.create_db_only.to_string()),
            ("verbose", self.verbose.to_string()),
            ("concurrency", self.concurrency.to_string()),
        ]
    }
}

/// Terminal result of one pipeline invocation.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Aggregated alerts from every scanned language (or batch sibling).
    Alerts(Vec<Alert>),
    /// Create-db-only mode: the database path, no scan performed.
    Database(PathBuf),
}

impl ScanOutcome {
    pub fn into_alerts(self) -> Vec<Alert> {
        match self {
            ScanOutcome::Alerts(alerts) => alerts,
            ScanOutcome::Database(_) => Vec::new(),
        }
    }
}

/// Drives targets through resolve, build, dispatch, and parse.
pub struct Pipeline<'a> {
    pub runner: &'a CommandRunner,
    pub config: &'a AgentConfig,
    pub sink: &'a dyn AlertSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        runner: &'a CommandRunner,
        config: &'a AgentConfig,
        sink: &'a dyn AlertSink,
    ) -> Self {
        Self {
            runner,
            config,
            sink,
        }
    }

    /// Scan one target: a batch-list file fans out into sibling pipelines,
    /// anything else runs the single-target pipeline once.
    ///
    /// Boxed because batch entries recurse through the whole pipeline.
    pub fn scan_target(
        &'a self,
        target: &str,
        options: ScanOptions,
    ) -> BoxFuture<'a, Result<ScanOutcome>> {
        let target = target.to_string();
        async move {
            match classify_target(&target)? {
                ResolvedTarget::Batch(list) => self.scan_batch(&list, options).await,
                ResolvedTarget::Local(source) => self.scan_source(&source, None, options).await,
                ResolvedTarget::Remote(remote) => {
                    let destination = remote.destination();
                    clone_remote(
                        self.runner,
                        &self.config.engine.vcs_binary,
                        &remote,
                        &destination,
                    )
                    .await?;
                    let source = std::fs::canonicalize(&destination).with_context(|| {
                        format!("Failed to resolve clone at {}", destination.display())
                    })?;
                    let cleanup = options.remove_remote_repository.then(|| destination.clone());
                    self.scan_source(&source, cleanup, options).await
                }
            }
        }
        .boxed()
    }

    /// Fan a batch list out into independent sibling pipelines, capped at
    /// `options.concurrency` in flight. Alerts aggregate in completion
    /// order. A sibling that fails for an ordinary reason (bad target,
    /// failed clone) is skipped with a warning; a fatal engine abort stops
    /// draining, so with a cap of one the remaining siblings never start.
    async fn scan_batch(&'a self, list: &Path, options: ScanOptions) -> Result<ScanOutcome> {
        let raw = std::fs::read_to_string(list)
            .with_context(|| format!("Failed to read batch list {}", list.display()))?;
        let targets: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        info!(
            "Batch list {} with {} target(s)",
            list.display(),
            targets.len()
        );

        let concurrency = options.concurrency.max(1);
        let mut pipelines = stream::iter(targets)
            .map(|target| {
                let sibling_options = options.clone();
                async move { self.scan_target(&target, sibling_options).await }
            })
            .buffer_unordered(concurrency);

        let mut alerts = Vec::new();
        while let Some(outcome) = pipelines.next().await {
            match outcome {
                Ok(outcome) => alerts.extend(outcome.into_alerts()),
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => warn!("Skipping batch target: {e:#}"),
            }
        }
        Ok(ScanOutcome::Alerts(alerts))
    }

    /// The single-target pipeline: build the database, scan per language,
    /// normalize and report the findings.
    async fn scan_source(
        &self,
        source: &Path,
        clone_cleanup: Option<PathBuf>,
        options: ScanOptions,
    ) -> Result<ScanOutcome> {
        let database = create_database(self.runner, source, &options, self.config).await?;

        if let Some(clone_dir) = clone_cleanup {
            info!("Removing remote repository {}", clone_dir.display());
            remove_folder(&clone_dir);
        }

        if options.create_db_only {
            return Ok(ScanOutcome::Database(database));
        }

        let results_dir = results_dir_for(&database, &options);
        std::fs::create_dir_all(&results_dir).with_context(|| {
            format!("Failed to create output folder {}", results_dir.display())
        })?;

        let documents = dispatch(self.runner, &database, &results_dir, &options, self.config)
            .await?;
        if documents.is_empty() {
            warn!(
                "No supported languages found in database {}; nothing was scanned",
                database.display()
            );
        }

        let mut alerts = Vec::new();
        for (language, document) in documents {
            match parse_alerts(&document) {
                Ok(found) => {
                    info!("{}: {} alert(s)", language, found.len());
                    for alert in &found {
                        self.sink.report(alert).await?;
                    }
                    alerts.extend(found);
                }
                Err(e) => warn!("{e}"),
            }
        }
        info!("CodeQL scan results saved at {}.", results_dir.display());

        if options.remove_database {
            info!("Removing database folder {}", database.display());
            remove_folder(&database);
        }

        Ok(ScanOutcome::Alerts(alerts))
    }
}

/// Whether an error chain contains a fatal-marker abort. Fatal aborts stop
/// the whole batch; any other sibling failure is local to its target.
fn is_fatal(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<RunnerError>(),
            Some(RunnerError::FatalMarker { .. })
        )
    })
}

/// Results directory: `<database path with the database suffix stripped>
/// -codeql-results`, unless overridden.
pub fn results_dir_for(database: &Path, options: &ScanOptions) -> PathBuf {
    if let Some(output) = &options.output {
        return output.clone();
    }
    let base = database.display().to_string();
    let stem = base.strip_suffix(DATABASE_SUFFIX).unwrap_or(&base);
    PathBuf::from(format!("{stem}-codeql-results"))
}

//! CodeQL database creation: argument construction and execution.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use qlagent_core::QlLanguage;
use qlagent_executor::CommandRunner;

use crate::config::AgentConfig;
use crate::pipeline::ScanOptions;

/// Suffix appended to the source basename for the default database path.
pub const DATABASE_SUFFIX: &str = "-codeql-database";

/// Build the `database create` invocation. Returns the argument vector and
/// the database path it will produce.
pub fn create_database_args(
    source: &Path,
    options: &ScanOptions,
    config: &AgentConfig,
) -> Result<(Vec<String>, PathBuf)> {
    let mut args = vec!["database".to_string(), "create".to_string()];

    if options.overwrite {
        args.push("--overwrite".to_string());
    }
    // Cluster mode: one sub-database per language under the database path.
    args.push("--db-cluster".to_string());

    let languages = match &options.language {
        Some(language) => vec![QlLanguage::normalize(language)],
        None => detect_source_languages(source, config),
    };
    if !languages.is_empty() {
        args.push(format!("--language={}", languages.join(",")));
    }

    if let Some(command) = &options.command {
        args.push(format!("--command={command}"));
    }
    args.push(format!("--source-root={}", source.display()));
    args.push(format!("--threads={}", options.threads));
    if options.verbose {
        args.push("--verbose".to_string());
    }

    let database_path = match &options.db_output {
        Some(path) => path.clone(),
        None => default_database_path(source)?,
    };
    args.push("--".to_string());
    args.push(database_path.display().to_string());

    Ok((args, database_path))
}

/// `<basename(source)>-codeql-database` under the current working directory.
pub fn default_database_path(source: &Path) -> Result<PathBuf> {
    let basename = source
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Cannot derive a database name from {}", source.display()))?;
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    Ok(cwd.join(format!("{basename}{DATABASE_SUFFIX}")))
}

/// Detect the languages present in a source tree by file extension, filtered
/// to the supported-language allow-list. Deterministic order, de-duplicated.
pub fn detect_source_languages(source: &Path, config: &AgentConfig) -> Vec<String> {
    let mut found: BTreeSet<QlLanguage> = BTreeSet::new();
    visit_files(source, &mut |path| {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(language) = QlLanguage::from_extension(ext) {
                found.insert(language);
            }
        }
    });

    found
        .into_iter()
        .map(|l| l.identifier().to_string())
        .filter(|identifier| config.is_supported(identifier))
        .collect()
}

fn visit_files<F: FnMut(&Path)>(dir: &Path, cb: &mut F) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            // Hidden trees (VCS metadata, tool caches) carry no language signal.
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !hidden {
                visit_files(&path, cb);
            }
        } else {
            cb(&path);
        }
    }
}

/// Create the database via the Command Runner. A non-zero exit is a warning,
/// not a failure: the engine reports recoverable per-file extraction errors
/// through its exit code. Fatal-marker aborts propagate as errors.
pub async fn create_database(
    runner: &CommandRunner,
    source: &Path,
    options: &ScanOptions,
    config: &AgentConfig,
) -> Result<PathBuf> {
    info!("Creating CodeQL database for {}...", source.display());
    let (args, database_path) = create_database_args(source, options, config)?;
    debug!("Options:");
    for (key, value) in options.describe() {
        debug!("[+] {}: {}", key, value);
    }

    runner
        .run(&config.engine.binary, &args, "Create CodeQL database")
        .await?;
    info!("CodeQL database created at {}.", database_path.display());
    Ok(database_path)
}

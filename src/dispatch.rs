//! Per-language scan dispatch over a built database.
//!
//! Languages within one database are scanned sequentially: they share the
//! database's on-disk lock. Parallelism lives one level up, across
//! independent batch targets.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use qlagent_executor::CommandRunner;

use crate::config::AgentConfig;
use crate::pipeline::ScanOptions;

/// Languages present in a built database: its subdirectories intersected
/// with the supported-language allow-list, in sorted order. An unreadable
/// or unrecognized layout yields an empty list; callers must report that to
/// the user instead of silently scanning nothing.
pub fn database_languages(database: &Path, config: &AgentConfig) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(database) else {
        return Vec::new();
    };

    let mut languages: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| config.is_supported(name))
        .collect();
    languages.sort();
    languages
}

/// `<output_dir>/<language>-codeql-result.<ext>`, with the extension taken
/// from the same format the analyze invocation will emit.
pub fn result_document_path(
    output_dir: &Path,
    language: &str,
    options: &ScanOptions,
    config: &AgentConfig,
) -> PathBuf {
    output_dir.join(format!(
        "{language}-codeql-result.{}",
        config.result_extension(options.format.as_deref())
    ))
}

/// Build the `database analyze` invocation for one language sub-database.
pub fn scan_args(
    language_database: &Path,
    language: &str,
    output_path: &Path,
    options: &ScanOptions,
    config: &AgentConfig,
) -> Vec<String> {
    let mut args = vec!["database".to_string(), "analyze".to_string()];

    let format = options
        .format
        .clone()
        .unwrap_or_else(|| config.defaults.format.clone());
    args.push(format!("--format={format}"));
    args.push(format!("--output={}", output_path.display()));
    if options.download {
        args.push("--download".to_string());
    }
    args.push(format!("--threads={}", options.threads));
    if options.verbose {
        args.push("--verbose".to_string());
    }

    args.push("--".to_string());
    args.push(language_database.display().to_string());
    args.push(
        options
            .query
            .clone()
            .unwrap_or_else(|| config.query_suite(language)),
    );

    args
}

/// Run one scan per language and return the produced result documents as
/// `(language, path)` pairs in scan order.
pub async fn dispatch(
    runner: &CommandRunner,
    database: &Path,
    output_dir: &Path,
    options: &ScanOptions,
    config: &AgentConfig,
) -> Result<Vec<(String, PathBuf)>> {
    let mut documents = Vec::new();
    for language in database_languages(database, config) {
        let language_database = database.join(&language);
        let output_path = result_document_path(output_dir, &language, options, config);
        info!("Scanning {} code in {}...", language, database.display());

        let args = scan_args(&language_database, &language, &output_path, options, config);
        runner
            .run(&config.engine.binary, &args, "Scan CodeQL database")
            .await?;
        documents.push((language, output_path));
    }
    Ok(documents)
}

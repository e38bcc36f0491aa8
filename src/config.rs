use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use qlagent_core::QlLanguage;

/// Configuration for the scan orchestrator, loaded once at startup.
///
/// Precedence: explicit `--config` path, then `qlagent.toml` in the working
/// directory, then `<config dir>/qlagent/config.toml`, then built-in defaults.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AgentConfig {
    /// Allow-list of language identifiers the engine may build and scan.
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DefaultsConfig {
    /// Output format passed to `database analyze`.
    #[serde(default = "default_format")]
    pub format: String,

    /// Per-language query suite overrides. Languages not listed fall back
    /// to `<language>-security-extended.qls`.
    #[serde(default)]
    pub queries: HashMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EngineConfig {
    /// Analysis engine binary.
    #[serde(default = "default_engine_binary")]
    pub binary: String,

    /// Version-control client used for remote targets.
    #[serde(default = "default_vcs_binary")]
    pub vcs_binary: String,

    /// Error-stream substrings that force immediate abort.
    #[serde(default = "default_fatal_markers")]
    pub fatal_markers: Vec<String>,

    /// Hard cap in seconds on one engine invocation. Unset means wait
    /// indefinitely, which matches historical behavior.
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BatchConfig {
    /// Number of batch-file targets scanned in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_supported_languages() -> Vec<String> {
    [
        QlLanguage::Cpp,
        QlLanguage::Csharp,
        QlLanguage::Go,
        QlLanguage::Java,
        QlLanguage::JavaScript,
        QlLanguage::Python,
        QlLanguage::Ruby,
        QlLanguage::Swift,
    ]
    .iter()
    .map(|l| l.identifier().to_string())
    .collect()
}

fn default_format() -> String {
    "sarif-latest".to_string()
}

fn default_engine_binary() -> String {
    "codeql".to_string()
}

fn default_vcs_binary() -> String {
    "git".to_string()
}

fn default_fatal_markers() -> Vec<String> {
    vec!["A fatal error occurred".to_string()]
}

fn default_concurrency() -> usize {
    1
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            supported_languages: default_supported_languages(),
            defaults: DefaultsConfig::default(),
            engine: EngineConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            queries: HashMap::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            vcs_binary: default_vcs_binary(),
            fatal_markers: default_fatal_markers(),
            timeout_secs: None,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl AgentConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local = PathBuf::from("qlagent.toml");
        if local.exists() {
            return Self::load_from_file(&local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let global = config_dir.join("qlagent").join("config.toml");
            if global.exists() {
                return Self::load_from_file(&global);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Whether a (normalized) language identifier is on the allow-list.
    pub fn is_supported(&self, identifier: &str) -> bool {
        let normalized = QlLanguage::normalize(identifier);
        self.supported_languages
            .iter()
            .any(|l| QlLanguage::normalize(l) == normalized)
    }

    /// The query suite to run for `language`: the configured mapping, or
    /// the engine's standard security suite.
    pub fn query_suite(&self, language: &str) -> String {
        self.defaults
            .queries
            .get(language)
            .cloned()
            .unwrap_or_else(|| format!("{language}-security-extended.qls"))
    }

    /// File extension for result documents in the effective format: the
    /// per-invocation override when given, the configured default otherwise.
    pub fn result_extension<'a>(&'a self, override_format: Option<&'a str>) -> &'a str {
        let format = override_format.unwrap_or(&self.defaults.format);
        if format.starts_with("sarif") {
            "sarif"
        } else {
            format
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert!(config.is_supported("python"));
        assert!(config.is_supported("C++"));
        assert!(!config.is_supported("scratch"));
        assert_eq!(config.defaults.format, "sarif-latest");
        assert_eq!(config.batch.concurrency, 1);
        assert_eq!(config.engine.binary, "codeql");
        assert_eq!(
            config.query_suite("python"),
            "python-security-extended.qls"
        );
        assert_eq!(config.result_extension(None), "sarif");
        assert_eq!(config.result_extension(Some("csv")), "csv");
        assert_eq!(config.result_extension(Some("sarifv2.1.0")), "sarif");
    }

    #[test]
    fn test_load_from_file_merges_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
supported_languages = ["go", "python"]

[defaults]
format = "csv"

[defaults.queries]
go = "go-custom.qls"

[batch]
concurrency = 4
"#
        )
        .unwrap();

        let config = AgentConfig::load_from_file(file.path()).unwrap();
        assert!(config.is_supported("go"));
        assert!(!config.is_supported("java"));
        assert_eq!(config.query_suite("go"), "go-custom.qls");
        assert_eq!(config.query_suite("python"), "python-security-extended.qls");
        assert_eq!(config.result_extension(None), "csv");
        assert_eq!(config.batch.concurrency, 4);
        // Sections not present keep their defaults.
        assert_eq!(config.engine.binary, "codeql");
        assert_eq!(config.engine.fatal_markers, vec!["A fatal error occurred"]);
    }
}

//! CodeQL extractor language definitions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Languages the CodeQL engine can build a database for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QlLanguage {
    Cpp,
    Csharp,
    Go,
    Java,
    JavaScript,
    Python,
    Ruby,
    Swift,
}

impl QlLanguage {
    /// The identifier CodeQL expects in `--language=` and uses for the
    /// per-language database subdirectories.
    #[must_use]
    pub fn identifier(&self) -> &'static str {
        match self {
            QlLanguage::Cpp => "cpp",
            QlLanguage::Csharp => "csharp",
            QlLanguage::Go => "go",
            QlLanguage::Java => "java",
            QlLanguage::JavaScript => "javascript",
            QlLanguage::Python => "python",
            QlLanguage::Ruby => "ruby",
            QlLanguage::Swift => "swift",
        }
    }

    /// Map a file extension to the extractor that covers it.
    ///
    /// TypeScript folds into the JavaScript extractor, Kotlin into Java,
    /// matching how CodeQL groups them.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "c" | "h" | "cpp" | "cxx" | "cc" | "hpp" | "hxx" => Some(QlLanguage::Cpp),
            "cs" => Some(QlLanguage::Csharp),
            "go" => Some(QlLanguage::Go),
            "java" | "kt" => Some(QlLanguage::Java),
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => Some(QlLanguage::JavaScript),
            "py" => Some(QlLanguage::Python),
            "rb" | "erb" => Some(QlLanguage::Ruby),
            "swift" => Some(QlLanguage::Swift),
            _ => None,
        }
    }

    /// Normalize a user- or linguist-supplied language name: whitespace
    /// stripped, lowercased, display aliases folded to extractor identifiers
    /// ("C++" -> "cpp", "C#" -> "csharp", "TypeScript" -> "javascript").
    #[must_use]
    pub fn normalize(name: &str) -> String {
        let folded: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "c++" => "cpp".to_string(),
            "c#" => "csharp".to_string(),
            "typescript" => "javascript".to_string(),
            _ => folded,
        }
    }
}

impl std::fmt::Display for QlLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl FromStr for QlLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match QlLanguage::normalize(s).as_str() {
            "c" | "cpp" => Ok(QlLanguage::Cpp),
            "csharp" => Ok(QlLanguage::Csharp),
            "go" | "golang" => Ok(QlLanguage::Go),
            "java" | "kotlin" => Ok(QlLanguage::Java),
            "javascript" => Ok(QlLanguage::JavaScript),
            "python" => Ok(QlLanguage::Python),
            "ruby" => Ok(QlLanguage::Ruby),
            "swift" => Ok(QlLanguage::Swift),
            other => Err(format!(
                "Unknown language: '{}'. Supported languages: cpp, csharp, go, java, javascript, python, ruby, swift",
                other
            )),
        }
    }
}

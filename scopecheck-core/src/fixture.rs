//! Fixture model and suite loading.
//!
//! A suite file is an ordered list of case records in the first-mate layout:
//!
//! ```text
//! [
//!   {
//!     "desc": "numbers and keywords",
//!     "grammarScopeName": "source.calc",       // or "grammarPath": "..."
//!     "grammars": ["grammars/calc.json"],
//!     "lines": [
//!       { "line": "let x", "tokens": [
//!           { "value": "let", "scopes": ["source.calc", "keyword.other.let.calc"] }, ...
//!       ] }
//!     ]
//!   }
//! ]
//! ```
//!
//! Expected scopes are written outermost-first. JSON and YAML suites share
//! the same field names; the format is picked from the file extension.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LoadError;

/// An ordered, immutable collection of test cases.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub cases: Vec<TestCase>,
    /// Directory grammar paths are resolved against.
    pub base_dir: PathBuf,
}

/// A single test case from a suite file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub desc: String,
    /// Declared scope name of the grammar to look up in the registry.
    #[serde(default)]
    pub grammar_scope_name: Option<String>,
    /// Grammar file to load and use directly.
    #[serde(default)]
    pub grammar_path: Option<PathBuf>,
    /// Auxiliary grammar files registered for this case.
    #[serde(default)]
    pub grammars: Vec<PathBuf>,
    #[serde(default)]
    pub lines: Vec<LineCase>,
    #[serde(default)]
    pub skip: bool,
}

/// One fixture line and the tokens it must produce.
#[derive(Debug, Clone, Deserialize)]
pub struct LineCase {
    pub line: String,
    #[serde(default)]
    pub tokens: Vec<ExpectedToken>,
}

/// Expected token: literal text plus scopes, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExpectedToken {
    pub value: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl TestCase {
    /// Grammar references in registration order: auxiliary grammars first,
    /// then the direct grammar path if there is one.
    pub fn grammar_references(&self) -> impl Iterator<Item = &Path> {
        self.grammars
            .iter()
            .chain(self.grammar_path.iter())
            .map(PathBuf::as_path)
    }

    /// Human-readable label used in reports.
    pub fn label(&self, index: usize) -> String {
        if self.desc.is_empty() {
            format!("case #{}", index)
        } else {
            self.desc.clone()
        }
    }
}

impl TestSuite {
    /// Load a suite file. The format follows the extension: `.json`,
    /// `.yaml` or `.yml`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let cases = match extension(path) {
            Some("json") => parse_json(&content, path)?,
            Some("yaml") | Some("yml") => parse_yaml(&content, path)?,
            _ => {
                return Err(LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        tracing::debug!(path = %path.display(), cases = cases.len(), "loaded suite");
        Ok(TestSuite { cases, base_dir })
    }

    /// Parse a JSON suite held in memory.
    pub fn from_json_str(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let base_dir = base_dir.into();
        let cases = parse_json(content, &base_dir)?;
        Ok(TestSuite { cases, base_dir })
    }

    /// Parse a YAML suite held in memory.
    pub fn from_yaml_str(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let base_dir = base_dir.into();
        let cases = parse_yaml(content, &base_dir)?;
        Ok(TestSuite { cases, base_dir })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn parse_json(content: &str, origin: &Path) -> Result<Vec<TestCase>, LoadError> {
    serde_json::from_str(content).map_err(|e| LoadError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_yaml(content: &str, origin: &Path) -> Result<Vec<TestCase>, LoadError> {
    serde_yaml::from_str(content).map_err(|e| LoadError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

//! Error taxonomy.
//!
//! Suite-level failures (`LoadError`) abort before any case runs. Everything
//! else is scoped to one case: a `CaseError` marks that case failed and the
//! runner moves on to the next one.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A suite or theme file could not be read or parsed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported file format for {path:?} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },
}

/// A grammar file could not be loaded or compiled.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("failed to read grammar {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid grammar JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid grammar YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("grammar in {origin} does not declare a scopeName")]
    MissingScopeName { origin: String },

    #[error("invalid regex {pattern:?}: {message}")]
    Regex { pattern: String, message: String },
}

/// The tokenizer engine failed on a line.
#[derive(Debug, Error)]
pub enum TokenizeError {
    /// An end/while pattern rebuilt from back-references did not compile.
    #[error("invalid regex {pattern:?}: {message}")]
    Regex { pattern: String, message: String },
}

/// Which side of a comparison still had elements when the other ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Expected,
    Actual,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Expected => f.write_str("expected"),
            Side::Actual => f.write_str("actual"),
        }
    }
}

/// First divergence between produced and expected tokens on one line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error(
        "token count mismatch: expected {expected}, got {actual} \
         ({leftover} has leftover token {first_leftover:?})"
    )]
    TokenCount {
        expected: usize,
        actual: usize,
        leftover: Side,
        first_leftover: String,
    },

    #[error("token {index}: expected value {expected:?}, got {actual:?}")]
    TokenValue {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("token {index}, scope {position}: expected {expected:?}, got {actual:?}")]
    Scope {
        index: usize,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("token {index}, scope {position}: expected scope {scope:?} is not in the token")]
    MissingScope { index: usize, position: usize, scope: String },

    #[error("token {index}, scope {position}: extra scope {scope:?} is present in the token")]
    ExtraScope { index: usize, position: usize, scope: String },
}

/// Fatal condition for a single test case.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("grammar load failed: {0}")]
    Load(#[from] GrammarError),

    #[error("no grammar found for scope {}", .scope_name.as_deref().unwrap_or("<unspecified>"))]
    GrammarNotFound { scope_name: Option<String> },

    #[error("line {line}: tokenizer failed: {source}")]
    Tokenize {
        line: usize,
        #[source]
        source: TokenizeError,
    },

    #[error("line {line} {line_text:?}: {mismatch}")]
    Mismatch {
        line: usize,
        line_text: String,
        mismatch: Mismatch,
    },
}

impl CaseError {
    /// The token mismatch behind this failure, if that is what it was.
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            CaseError::Mismatch { mismatch, .. } => Some(mismatch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar_not_found_message() {
        let err = CaseError::GrammarNotFound {
            scope_name: Some("source.nope".to_string()),
        };
        assert_eq!(err.to_string(), "no grammar found for scope source.nope");

        let err = CaseError::GrammarNotFound { scope_name: None };
        assert_eq!(err.to_string(), "no grammar found for scope <unspecified>");
    }

    #[test]
    fn test_mismatch_message_cites_both_values() {
        let err = Mismatch::TokenValue {
            index: 0,
            expected: "foo".to_string(),
            actual: "bar".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"foo\""));
        assert!(msg.contains("\"bar\""));
    }

    #[test]
    fn test_missing_and_extra_scope_messages_name_the_slot() {
        let err = Mismatch::MissingScope {
            index: 1,
            position: 2,
            scope: "meta.outer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "token 1, scope 2: expected scope \"meta.outer\" is not in the token"
        );

        let err = Mismatch::ExtraScope {
            index: 0,
            position: 1,
            scope: "source.x".to_string(),
        };
        assert_eq!(err.to_string(), "token 0, scope 1: extra scope \"source.x\" is present in the token");
    }
}

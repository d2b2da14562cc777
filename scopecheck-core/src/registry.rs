//! Per-case grammar registry and grammar resolution.
//!
//! A registry is built fresh for every case from the case's own grammar
//! references; nothing is shared or cached between cases, so one case's
//! grammars can never leak into another's.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::CaseError;
use crate::fixture::TestCase;
use crate::grammar::Grammar;

/// Grammars keyed by scope name. Inserting a scope name that is already
/// present replaces the earlier grammar.
#[derive(Debug, Default)]
pub struct GrammarRegistry {
    grammars: HashMap<String, Arc<Grammar>>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every grammar a case references, in order: `grammars` first,
    /// then `grammarPath`. Relative paths are taken from `base_dir`.
    pub fn for_case(case: &TestCase, base_dir: &Path) -> Result<Self, CaseError> {
        let mut registry = GrammarRegistry::new();
        for reference in case.grammar_references() {
            let path = base_dir.join(reference);
            let grammar = Grammar::load(&path)?;
            debug!(path = %path.display(), scope = grammar.scope_name(), "loaded grammar");
            registry.insert(Arc::new(grammar));
        }
        Ok(registry)
    }

    /// Register `grammar` under its scope name, returning whatever it
    /// replaced.
    pub fn insert(&mut self, grammar: Arc<Grammar>) -> Option<Arc<Grammar>> {
        let scope = grammar.scope_name().to_string();
        let replaced = self.grammars.insert(scope, grammar);
        if let Some(old) = &replaced {
            debug!(scope = old.scope_name(), "grammar replaced by later definition");
        }
        replaced
    }

    #[inline]
    pub fn get(&self, scope_name: &str) -> Option<&Arc<Grammar>> {
        self.grammars.get(scope_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    /// Registered scope names, sorted.
    pub fn scope_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.grammars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Pick the grammar a case is tokenized with.
///
/// `grammarPath` wins and is loaded straight from disk; otherwise
/// `grammarScopeName` is looked up in `registry`.
pub fn resolve_grammar(
    case: &TestCase,
    base_dir: &Path,
    registry: &GrammarRegistry,
) -> Result<Arc<Grammar>, CaseError> {
    if let Some(path) = &case.grammar_path {
        let grammar = Grammar::load(&base_dir.join(path))?;
        return Ok(Arc::new(grammar));
    }

    case.grammar_scope_name
        .as_deref()
        .and_then(|scope| registry.get(scope))
        .cloned()
        .ok_or_else(|| CaseError::GrammarNotFound {
            scope_name: case.grammar_scope_name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(scope: &str, name: &str) -> Arc<Grammar> {
        let json = format!(r#"{{ "scopeName": "{scope}", "name": "{name}", "patterns": [] }}"#);
        Arc::new(Grammar::from_json_str(&json).unwrap())
    }

    fn case(scope: Option<&str>) -> TestCase {
        TestCase {
            desc: String::new(),
            grammar_scope_name: scope.map(str::to_string),
            grammar_path: None,
            grammars: Vec::new(),
            lines: Vec::new(),
            skip: false,
        }
    }

    #[test]
    fn test_insert_last_write_wins() {
        let mut registry = GrammarRegistry::new();
        assert!(registry.insert(grammar("source.dup", "first")).is_none());
        let replaced = registry.insert(grammar("source.dup", "second")).unwrap();
        assert_eq!(replaced.name(), Some("first"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("source.dup").unwrap().name(), Some("second"));
    }

    #[test]
    fn test_scope_names_sorted() {
        let mut registry = GrammarRegistry::new();
        registry.insert(grammar("source.z", "z"));
        registry.insert(grammar("source.a", "a"));
        assert_eq!(registry.scope_names(), vec!["source.a", "source.z"]);
    }

    #[test]
    fn test_resolve_by_scope_name() {
        let mut registry = GrammarRegistry::new();
        registry.insert(grammar("source.x", "x"));
        let found = resolve_grammar(&case(Some("source.x")), Path::new("."), &registry).unwrap();
        assert_eq!(found.scope_name(), "source.x");
    }

    #[test]
    fn test_resolve_missing_scope() {
        let registry = GrammarRegistry::new();
        let err = resolve_grammar(&case(Some("source.nope")), Path::new("."), &registry).unwrap_err();
        assert!(matches!(
            err,
            CaseError::GrammarNotFound { scope_name: Some(ref s) } if s == "source.nope"
        ));

        let err = resolve_grammar(&case(None), Path::new("."), &registry).unwrap_err();
        assert!(matches!(err, CaseError::GrammarNotFound { scope_name: None }));
    }

    #[test]
    fn test_for_case_reports_missing_file() {
        let mut case = case(Some("source.x"));
        case.grammars.push("does/not/exist.json".into());
        let err = GrammarRegistry::for_case(&case, Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, CaseError::Load(_)));
    }
}

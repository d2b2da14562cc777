//! Test harness: run a fixture suite, print every failing case, then fail once

use std::path::Path;

use scopecheck_core::{
    init_tracing, resolve_grammar, run_suite, tokenize_lines, ActualToken, CaseReport, GrammarRegistry, RunConfig,
    TestCase, TestSuite, Tokenizer,
};

use crate::common::load_suite_by_name;

/// Tokenize `lines` with the grammar a case resolves to.
pub fn tokenize_with(case: &TestCase, base_dir: &Path, lines: &[&str]) -> Vec<Vec<ActualToken>> {
    let registry = GrammarRegistry::for_case(case, base_dir).unwrap_or_else(|e| panic!("registry: {}", e));
    let grammar = resolve_grammar(case, base_dir, &registry).unwrap_or_else(|e| panic!("grammar: {}", e));
    let mut tokenizer = Tokenizer::new(grammar, &registry);
    let (tokens, _) =
        tokenize_lines(&mut tokenizer, lines.iter().copied()).unwrap_or_else(|e| panic!("tokenize: {}", e));
    tokens
}

/// Tokens the engine produces for every line of a case.
pub fn actual_tokens(case: &TestCase, base_dir: &Path) -> Vec<Vec<ActualToken>> {
    let lines: Vec<&str> = case.lines.iter().map(|l| l.line.as_str()).collect();
    tokenize_with(case, base_dir, &lines)
}

/// Run every case of a fixture suite. All failures are printed before the
/// test panics, so one broken case never hides another.
pub fn run_fixture(name: &str) {
    init_tracing();
    let suite = load_suite_by_name(name);
    let report = run_suite(&suite, &RunConfig::from_env());

    let failures: Vec<String> = report
        .failures()
        .map(|failed| {
            print_failure(&suite, failed);
            format!("{}::{}", name, failed.desc)
        })
        .collect();

    if !failures.is_empty() {
        panic!("\n{} cases failed:\n  {}", failures.len(), failures.join("\n  "));
    }

    if report.skipped() > 0 {
        eprintln!("  {} - {} cases ({} skipped)", name, suite.len(), report.skipped());
    }
}

/// Print detailed failure info, with the produced tokens of the failing line
/// when the failure was a token mismatch.
fn print_failure(suite: &TestSuite, failed: &CaseReport) {
    eprintln!("\n=== FAILED: {} ===", failed.desc);
    if let Some(message) = failed.message() {
        eprintln!("{}", message);
    }

    let case = &suite.cases[failed.index];
    let Some(scopecheck_core::CaseError::Mismatch { line, .. }) = failed_error(failed) else {
        return;
    };
    let Some(expected) = case.lines.get(line - 1) else {
        return;
    };

    eprintln!("\nExpected tokens:");
    for (i, token) in expected.tokens.iter().enumerate() {
        eprintln!("  {}: {:?} {:?}", i, token.value, token.scopes);
    }

    let lines: Vec<&str> = case.lines[..*line].iter().map(|l| l.line.as_str()).collect();
    let produced = tokenize_with(case, &suite.base_dir, &lines);
    eprintln!("\nActual tokens (innermost scope first):");
    if let Some(tokens) = produced.last() {
        for (i, token) in tokens.iter().enumerate() {
            let text = token.text(&expected.line).unwrap_or("<out of range>");
            eprintln!("  {}: {:?} {:?}", i, text, token.scopes);
        }
    }
}

fn failed_error(report: &CaseReport) -> Option<&scopecheck_core::CaseError> {
    match &report.outcome {
        scopecheck_core::Outcome::Failed(err) => Some(err),
        _ => None,
    }
}

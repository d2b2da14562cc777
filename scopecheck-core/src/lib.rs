//! scopecheck core
//!
//! Conformance harness for TextMate-style grammar tokenizers. Loads a suite
//! of golden fixtures, tokenizes each case line by line while carrying the
//! scope stack across lines, and checks every produced token against the
//! expected text and scopes.
//!
//! # Architecture
//!
//! - **fixture.rs** - Suite/case/line/token fixture model and loading
//! - **grammar.rs** - TextMate grammar model, compiled into a rule arena
//! - **registry.rs** - Per-case grammar registry and grammar resolution
//! - **tokenizer/** - Line tokenizer engine and its scope stack
//! - **driver.rs** - `LineTokenizer` seam and the sequential line fold
//! - **validate.rs** - Token count, value and scope comparison
//! - **runner.rs** - One pass/fail report per case
//! - **theme.rs** - Scope selector theme resolution
//! - **config.rs** - Run configuration from environment
//! - **error.rs** - Error taxonomy

pub mod config;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod grammar;
pub mod registry;
pub mod runner;
pub mod theme;
pub mod tokenizer;
pub mod validate;

pub use config::{init_tracing, RunConfig};
pub use driver::{drive_case, tokenize_lines, ActualToken, LineTokenizer};
pub use error::{CaseError, GrammarError, LoadError, Mismatch, Side, TokenizeError};
pub use fixture::{ExpectedToken, LineCase, TestCase, TestSuite};
pub use grammar::Grammar;
pub use registry::{resolve_grammar, GrammarRegistry};
pub use runner::{run_case, run_suite, CaseReport, Outcome, SuiteReport};
pub use theme::{ResolvedStyle, ScopeSelector, StyleSettings, Theme, ThemeDefaults, ThemeRule};
pub use tokenizer::{ScopeStack, Tokenizer};
pub use validate::{compare_scopes, validate_line, ScopeComparison};

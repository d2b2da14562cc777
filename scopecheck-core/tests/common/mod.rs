//! Test infrastructure for scopecheck
//!
//! Provides fixture loading, suite running and failure printing.

#![allow(dead_code)]

mod harness;
mod loader;

pub use harness::{actual_tokens, run_fixture, tokenize_with};
pub use loader::{fixture_path, load_suite_by_name};

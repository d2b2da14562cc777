//! Suite-level load errors.

mod common;

use std::io::Write;

use common::load_suite_by_name;
use scopecheck_core::{LoadError, TestSuite};
use tempfile::{tempdir, Builder};

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = TestSuite::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn test_malformed_json_is_parse_error() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "[{{ \"lines\": 3 }}]").unwrap();
    let err = TestSuite::load(file.path()).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "- desc: [unclosed").unwrap();
    let err = TestSuite::load(file.path()).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
}

#[test]
fn test_unknown_extension() {
    let file = Builder::new().suffix(".toml").tempfile().unwrap();
    let err = TestSuite::load(file.path()).unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
}

#[test]
fn test_relative_grammar_paths_use_suite_dir() {
    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("g")).unwrap();
    std::fs::write(
        dir.path().join("g/t.json"),
        r#"{ "scopeName": "source.t", "patterns": [ { "name": "keyword.t", "match": "k" } ] }"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("suite.json"),
        r#"[{ "grammarPath": "g/t.json",
              "lines": [ { "line": "k", "tokens": [ { "value": "k", "scopes": ["source.t", "keyword.t"] } ] } ] }]"#,
    )
    .unwrap();

    let suite = TestSuite::load(&dir.path().join("suite.json")).unwrap();
    assert_eq!(suite.base_dir, dir.path());
    scopecheck_core::run_case(&suite.cases[0], &suite.base_dir).unwrap();
}

#[test]
fn test_fixture_suites_load() {
    for name in ["basic.json", "multiline.yaml", "embedded.json"] {
        assert!(!load_suite_by_name(name).is_empty(), "{name}");
    }
}

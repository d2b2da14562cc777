//! Fixture loading from the tests/fixtures directory

use std::path::{Path, PathBuf};

use scopecheck_core::TestSuite;

/// Path of a file under tests/fixtures.
pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

/// Load a suite by file name (extension included).
pub fn load_suite_by_name(name: &str) -> TestSuite {
    let path = fixture_path(name);
    TestSuite::load(&path).unwrap_or_else(|e| panic!("Failed to load suite {:?}: {}", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_basic() {
        let suite = load_suite_by_name("basic.json");
        assert!(!suite.is_empty());
        assert!(suite.cases.iter().any(|c| c.desc == "single unmatched line"));
    }
}

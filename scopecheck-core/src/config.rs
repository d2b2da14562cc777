//! Run configuration.
//!
//! Knobs come from the environment so `cargo test` runs can be steered
//! without code changes; the CLI overrides them with flags.
//!
//! | Variable               | Effect                                   |
//! |------------------------|------------------------------------------|
//! | `SCOPECHECK_FILTER`    | only run cases whose description contains it |
//! | `SCOPECHECK_PARALLEL`  | run cases on scoped worker threads       |
//! | `SCOPECHECK_FAIL_FAST` | stop at the first failing case           |

use std::sync::Once;

use crate::fixture::TestCase;

static TRACING_INIT: Once = Once::new();

/// Install the `tracing` subscriber. Safe to call more than once.
///
/// The filter comes from `SCOPECHECK_LOG` (e.g. `scopecheck_core=trace`)
/// and falls back to `warn`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_env("SCOPECHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another subscriber may already be installed by the host; keep it.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Substring a case description must contain to run.
    pub filter: Option<String>,
    pub parallel: bool,
    pub fail_fast: bool,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        RunConfig {
            filter: lookup("SCOPECHECK_FILTER").filter(|s| !s.is_empty()),
            parallel: lookup("SCOPECHECK_PARALLEL").is_some_and(|v| truthy(&v)),
            fail_fast: lookup("SCOPECHECK_FAIL_FAST").is_some_and(|v| truthy(&v)),
        }
    }

    /// Whether `case` passes the description filter.
    pub fn selects(&self, case: &TestCase) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |needle| case.desc.contains(needle))
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(RunConfig::from_lookup(lookup(&[])), RunConfig::default());
    }

    #[test]
    fn test_reads_all_knobs() {
        let config = RunConfig::from_lookup(lookup(&[
            ("SCOPECHECK_FILTER", "comment"),
            ("SCOPECHECK_PARALLEL", "1"),
            ("SCOPECHECK_FAIL_FAST", "TRUE"),
        ]));
        assert_eq!(config.filter.as_deref(), Some("comment"));
        assert!(config.parallel);
        assert!(config.fail_fast);
    }

    #[test]
    fn test_falsy_and_empty_values() {
        let config = RunConfig::from_lookup(lookup(&[
            ("SCOPECHECK_FILTER", ""),
            ("SCOPECHECK_PARALLEL", "0"),
            ("SCOPECHECK_FAIL_FAST", "no"),
        ]));
        assert_eq!(config, RunConfig::default());
    }
}

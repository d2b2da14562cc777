//! Case runner and suite report.
//!
//! Each case is isolated: it gets its own grammar registry, its own
//! tokenizer and its own scope stack, and its failure is recorded in its
//! own report without affecting the cases around it.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{debug, info_span};

use crate::config::RunConfig;
use crate::driver::drive_case;
use crate::error::CaseError;
use crate::fixture::{TestCase, TestSuite};
use crate::registry::{resolve_grammar, GrammarRegistry};
use crate::tokenizer::Tokenizer;

/// Run a single case: build its registry, resolve its grammar, then
/// tokenize and validate its lines in order.
pub fn run_case(case: &TestCase, base_dir: &Path) -> Result<(), CaseError> {
    let registry = GrammarRegistry::for_case(case, base_dir)?;
    let grammar = resolve_grammar(case, base_dir, &registry)?;
    let mut tokenizer = Tokenizer::new(grammar, &registry);
    drive_case(&mut tokenizer, &case.lines)
}

#[derive(Debug)]
pub enum Outcome {
    Passed,
    Failed(CaseError),
    Skipped,
}

impl Outcome {
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Result of one case in suite order.
#[derive(Debug)]
pub struct CaseReport {
    pub index: usize,
    pub desc: String,
    pub outcome: Outcome,
}

impl CaseReport {
    /// Failure message, present only for failed cases.
    pub fn message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Failed(err) => Some(err.to_string()),
            Outcome::Passed | Outcome::Skipped => None,
        }
    }
}

/// Reports for every case of a suite, in suite order.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|r| r.outcome.is_failure())
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.cases.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.cases {
            match &report.outcome {
                Outcome::Passed => writeln!(f, "ok      {}", report.desc)?,
                Outcome::Skipped => writeln!(f, "skip    {}", report.desc)?,
                Outcome::Failed(err) => writeln!(f, "FAILED  {}\n        {}", report.desc, err)?,
            }
        }
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Run every case of `suite` under `config`.
pub fn run_suite(suite: &TestSuite, config: &RunConfig) -> SuiteReport {
    let span = info_span!("run_suite", cases = suite.len(), parallel = config.parallel);
    let _guard = span.enter();

    let cases = if config.parallel {
        run_parallel(suite, config)
    } else {
        run_sequential(suite, config)
    };
    SuiteReport { cases }
}

fn run_sequential(suite: &TestSuite, config: &RunConfig) -> Vec<CaseReport> {
    let mut stopped = false;
    suite
        .cases
        .iter()
        .enumerate()
        .map(|(index, case)| {
            let report = run_one(index, case, suite, config, stopped);
            stopped |= config.fail_fast && report.outcome.is_failure();
            report
        })
        .collect()
}

/// Cases are pulled from a shared counter by scoped workers; reports are put
/// back in suite order afterwards.
fn run_parallel(suite: &TestSuite, config: &RunConfig) -> Vec<CaseReport> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(suite.len().max(1));
    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let done = Mutex::new(Vec::with_capacity(suite.len()));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(case) = suite.cases.get(index) else {
                    break;
                };
                let report = run_one(index, case, suite, config, stop.load(Ordering::Relaxed));
                if config.fail_fast && report.outcome.is_failure() {
                    stop.store(true, Ordering::Relaxed);
                }
                // A poisoned lock still holds every report pushed before the panic.
                done.lock().unwrap_or_else(|e| e.into_inner()).push(report);
            });
        }
    });

    let mut cases = done.into_inner().unwrap_or_else(|e| e.into_inner());
    cases.sort_by_key(|r| r.index);
    cases
}

fn run_one(index: usize, case: &TestCase, suite: &TestSuite, config: &RunConfig, stopped: bool) -> CaseReport {
    let desc = case.label(index);
    let outcome = if stopped || case.skip || !config.selects(case) {
        Outcome::Skipped
    } else {
        match run_case(case, &suite.base_dir) {
            Ok(()) => Outcome::Passed,
            Err(err) => {
                debug!(case = %desc, error = %err, "case failed");
                Outcome::Failed(err)
            }
        }
    };
    CaseReport { index, desc, outcome }
}

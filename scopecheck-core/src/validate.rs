//! Token validation.
//!
//! Produced tokens are compared against expected tokens positionally and
//! fail fast on the first divergence:
//!
//! 1. token counts must be equal
//! 2. each token's byte slice of the line must equal the expected value
//! 3. each token's scopes must equal the expected scopes, reversed
//!
//! Fixtures list scopes outermost-first (`source.x`, `string.quoted.x`, ...)
//! while the tokenizer reports them innermost-first, so the expected list is
//! walked back to front.

use std::borrow::Cow;

use crate::driver::ActualToken;
use crate::error::{Mismatch, Side};
use crate::fixture::ExpectedToken;

/// Outcome of walking two scope lists in lock-step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeComparison {
    /// Same length, same elements.
    Equal,
    /// Both sides had an element at `position` and they differ.
    Differ {
        position: usize,
        expected: String,
        actual: String,
    },
    /// Actual ran out first; `missing` is the next expected scope.
    ActualExhausted { position: usize, missing: String },
    /// Expected ran out first; `extra` is the next actual scope.
    ExpectedExhausted { position: usize, extra: String },
}

/// Compare two scope sequences element by element.
pub fn compare_scopes<'a, E, A>(expected: E, actual: A) -> ScopeComparison
where
    E: IntoIterator<Item = &'a str>,
    A: IntoIterator<Item = &'a str>,
{
    let mut expected = expected.into_iter();
    let mut actual = actual.into_iter();
    let mut position = 0;

    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return ScopeComparison::Equal,
            (Some(e), Some(a)) if e == a => position += 1,
            (Some(e), Some(a)) => {
                return ScopeComparison::Differ {
                    position,
                    expected: e.to_string(),
                    actual: a.to_string(),
                }
            }
            (Some(e), None) => {
                return ScopeComparison::ActualExhausted {
                    position,
                    missing: e.to_string(),
                }
            }
            (None, Some(a)) => {
                return ScopeComparison::ExpectedExhausted {
                    position,
                    extra: a.to_string(),
                }
            }
        }
    }
}

/// Validate one line's produced tokens against its expected tokens.
pub fn validate_line(line: &str, actual: &[ActualToken], expected: &[ExpectedToken]) -> Result<(), Mismatch> {
    if actual.len() != expected.len() {
        let (leftover, first_leftover) = if expected.len() > actual.len() {
            (Side::Expected, expected[actual.len()].value.clone())
        } else {
            (Side::Actual, slice_lossy(line, &actual[expected.len()]).into_owned())
        };
        return Err(Mismatch::TokenCount {
            expected: expected.len(),
            actual: actual.len(),
            leftover,
            first_leftover,
        });
    }

    for (index, (act, exp)) in actual.iter().zip(expected).enumerate() {
        let matches = line.as_bytes().get(act.range()) == Some(exp.value.as_bytes());
        if !matches {
            return Err(Mismatch::TokenValue {
                index,
                expected: exp.value.clone(),
                actual: slice_lossy(line, act).into_owned(),
            });
        }

        let expected_scopes = exp.scopes.iter().rev().map(String::as_str);
        let actual_scopes = act.scopes.iter().map(String::as_str);
        match compare_scopes(expected_scopes, actual_scopes) {
            ScopeComparison::Equal => {}
            ScopeComparison::Differ {
                position,
                expected,
                actual,
            } => {
                return Err(Mismatch::Scope {
                    index,
                    position,
                    expected,
                    actual,
                })
            }
            ScopeComparison::ActualExhausted { position, missing } => {
                return Err(Mismatch::MissingScope {
                    index,
                    position,
                    scope: missing,
                })
            }
            ScopeComparison::ExpectedExhausted { position, extra } => {
                return Err(Mismatch::ExtraScope {
                    index,
                    position,
                    scope: extra,
                })
            }
        }
    }

    Ok(())
}

fn slice_lossy<'l>(line: &'l str, token: &ActualToken) -> Cow<'l, str> {
    match line.as_bytes().get(token.range()) {
        Some(bytes) => String::from_utf8_lossy(bytes),
        None => Cow::Borrowed("<out of range>"),
    }
}

//! Stateful tokenization driver.
//!
//! Lines of a case are tokenized strictly in order. Each call hands the
//! tokenizer the stack left behind by the previous line and takes back the
//! stack for the next one:
//!
//! ```text
//! initial ──line 0──▶ stack₁ ──line 1──▶ stack₂ ──line 2──▶ ...
//!             │                 │                 │
//!           tokens₀           tokens₁           tokens₂
//! ```
//!
//! The fold owns the stack outright; nothing else can observe or mutate it
//! between lines.

use tracing::{debug_span, trace};

use crate::error::{CaseError, TokenizeError};
use crate::fixture::LineCase;
use crate::validate::validate_line;

/// A token produced by a tokenizer: a byte span of the line plus scopes.
///
/// Scopes are innermost-first, the reverse of how fixtures are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualToken {
    pub offset: usize,
    pub length: usize,
    pub scopes: Vec<String>,
}

impl ActualToken {
    /// Byte range of this token within its line. Saturates instead of
    /// overflowing, so a bogus span is simply out of range.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset.saturating_add(self.length)
    }

    /// The token's text, if the span is a valid slice of `line`.
    pub fn text<'l>(&self, line: &'l str) -> Option<&'l str> {
        line.get(self.range())
    }
}

/// Line-at-a-time tokenizer with an opaque continuation state.
pub trait LineTokenizer {
    /// Continuation state carried from one line to the next.
    type Stack;

    /// State to use before the first line.
    fn initial_stack(&self) -> Self::Stack;

    /// Tokenize `line` (no trailing newline) starting from `stack`.
    fn tokenize_line(
        &mut self,
        stack: Self::Stack,
        line: &str,
    ) -> Result<(Vec<ActualToken>, Self::Stack), TokenizeError>;
}

/// Tokenize `lines` in order, threading the stack through each call.
///
/// Returns the tokens of every line and the stack after the last one.
pub fn tokenize_lines<'l, T, I>(
    tokenizer: &mut T,
    lines: I,
) -> Result<(Vec<Vec<ActualToken>>, T::Stack), TokenizeError>
where
    T: LineTokenizer,
    I: IntoIterator<Item = &'l str>,
{
    let mut out = Vec::new();
    let mut stack = tokenizer.initial_stack();
    for line in lines {
        let (tokens, next) = tokenizer.tokenize_line(stack, line)?;
        out.push(tokens);
        stack = next;
    }
    Ok((out, stack))
}

/// Tokenize and validate every line of a case, stopping at the first
/// failure. Line numbers in errors are 1-based.
pub fn drive_case<T: LineTokenizer>(tokenizer: &mut T, lines: &[LineCase]) -> Result<(), CaseError> {
    let span = debug_span!("drive_case", lines = lines.len());
    let _guard = span.enter();

    let mut stack = tokenizer.initial_stack();
    for (i, line) in lines.iter().enumerate() {
        let line_number = i + 1;
        let (tokens, next) = tokenizer
            .tokenize_line(stack, &line.line)
            .map_err(|source| CaseError::Tokenize {
                line: line_number,
                source,
            })?;
        trace!(line = line_number, tokens = tokens.len(), "tokenized");

        validate_line(&line.line, &tokens, &line.tokens).map_err(|mismatch| CaseError::Mismatch {
            line: line_number,
            line_text: line.line.clone(),
            mismatch,
        })?;
        stack = next;
    }
    Ok(())
}

//! Scope stack carried between lines.

use std::sync::Arc;

use crate::grammar::{Grammar, RuleId};

/// A rule in a specific grammar.
#[derive(Debug, Clone)]
pub(crate) struct RuleRef {
    pub grammar: Arc<Grammar>,
    pub rule: RuleId,
}

impl RuleRef {
    pub fn new(grammar: &Arc<Grammar>, rule: RuleId) -> Self {
        RuleRef {
            grammar: Arc::clone(grammar),
            rule,
        }
    }

    /// Identity of the rule: the same grammar instance and rule id.
    pub fn key(&self) -> (*const Grammar, RuleId) {
        (Arc::as_ptr(&self.grammar), self.rule)
    }

    pub fn same_rule(&self, other: &RuleRef) -> bool {
        self.key() == other.key()
    }
}

/// One active rule. Scopes are kept outermost-first.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub rule: RuleRef,
    /// Scopes up to and including this rule's `name`.
    pub name_scopes: Vec<String>,
    /// `name_scopes` plus this rule's `contentName`.
    pub content_scopes: Vec<String>,
    /// End/while pattern with back-references already substituted.
    pub end_pattern: Option<String>,
    /// Position on the current line where the rule was pushed.
    pub enter_position: Option<usize>,
    /// `\G` position in effect before this rule was pushed; restored on pop.
    pub anchor_position: Option<usize>,
    /// The begin match ran to the end of its line, so `\G` holds at the
    /// start of the next one.
    pub begin_captured_eol: bool,
}

impl Frame {
    pub fn new(rule: RuleRef, scopes: Vec<String>, enter_position: Option<usize>) -> Self {
        Frame {
            rule,
            name_scopes: scopes.clone(),
            content_scopes: scopes,
            end_pattern: None,
            enter_position,
            anchor_position: None,
            begin_captured_eol: false,
        }
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.rule.same_rule(&other.rule)
            && self.name_scopes == other.name_scopes
            && self.content_scopes == other.content_scopes
            && self.end_pattern == other.end_pattern
            && self.begin_captured_eol == other.begin_captured_eol
    }
}

/// Nested rule context in effect at the end of a line.
///
/// The root frame (the grammar's base scope) can never be popped.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeStack {
    root: Frame,
    frames: Vec<Frame>,
    /// No line has been tokenized from this stack yet.
    first_line: bool,
}

impl ScopeStack {
    /// Fresh stack holding only the grammar's base scope.
    pub fn initial(grammar: &Arc<Grammar>) -> Self {
        let root = Frame::new(
            RuleRef::new(grammar, grammar.root()),
            vec![grammar.scope_name().to_string()],
            None,
        );
        ScopeStack {
            root,
            frames: Vec::new(),
            first_line: true,
        }
    }

    /// Number of frames above the root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Scopes applied to text at this point, outermost first.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.top().content_scopes.iter().map(String::as_str)
    }

    #[inline]
    pub(crate) fn top(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.root)
    }

    #[inline]
    pub(crate) fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap_or(&mut self.root)
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pop the top frame. The root stays put and yields `None`.
    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// All frames bottom to top, root included.
    pub(crate) fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::once(&self.root).chain(self.frames.iter())
    }

    /// Keep the root and the first `depth` frames above it.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    /// Copy of this stack cut down to the root plus `depth` frames.
    pub(crate) fn prefix(&self, depth: usize) -> ScopeStack {
        ScopeStack {
            root: self.root.clone(),
            frames: self.frames[..depth.min(self.frames.len())].to_vec(),
            first_line: self.first_line,
        }
    }

    #[inline]
    pub(crate) fn is_first_line(&self) -> bool {
        self.first_line
    }

    /// Forget per-line positions once a line is done.
    pub(crate) fn end_line(&mut self) {
        self.first_line = false;
        for frame in std::iter::once(&mut self.root).chain(self.frames.iter_mut()) {
            frame.enter_position = None;
            frame.anchor_position = None;
        }
    }
}

//! TextMate line tokenizer.
//!
//! Each line is scanned left to right. At every position the candidate
//! patterns of the rule on top of the scope stack are searched, together
//! with that rule's `end` pattern; the earliest match wins, ties going to
//! the pattern listed first (and to `end` over patterns unless the rule asks
//! for `applyEndPatternLast`).
//!
//! ```text
//! line ──▶ while checks ──▶ scan ──▶ (tokens, stack)
//!                            │
//!                            ├─ match       push, captures, pop
//!                            ├─ begin       push, captures, content scopes
//!                            └─ end         captures, pop
//! ```
//!
//! Lines are matched with a trailing `\n` so `$` and `\n`-terminated
//! patterns behave as they do in editors; the token covering only that
//! newline is dropped again before tokens are returned.
//!
//! `\G` is only live where the most recent begin or while match ended, and
//! `\A` only on the first line a stack sees (see [`anchors`]).

mod anchors;
mod stack;
mod substitute;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use onig::{Region, SearchOptions};
use tracing::{debug, trace, warn};

use crate::driver::{ActualToken, LineTokenizer};
use crate::error::TokenizeError;
use crate::grammar::{EndPattern, Grammar, PatternRef, Rule, RuleId};
use crate::registry::GrammarRegistry;

use anchors::AnchorActive;
pub use stack::ScopeStack;
use stack::{Frame, RuleRef};
use substitute::{resolve_backreferences, substitute_captures, CapturePositions};

/// Span of a regex match plus all of its capture groups.
#[derive(Debug)]
struct Found {
    start: usize,
    end: usize,
    captures: Vec<Option<(usize, usize)>>,
}

#[derive(Debug)]
enum Target {
    Rule(RuleRef),
    End,
}

/// Collects tokens in order. Empty tokens are never produced.
#[derive(Debug, Default)]
struct TokenAccumulator {
    tokens: Vec<(usize, usize, Vec<String>)>,
    last_end: usize,
}

impl TokenAccumulator {
    fn starting_at(pos: usize) -> Self {
        TokenAccumulator {
            tokens: Vec::new(),
            last_end: pos,
        }
    }

    fn produce(&mut self, end: usize, scopes: &[String]) {
        if self.last_end >= end {
            return;
        }
        self.tokens.push((self.last_end, end, scopes.to_vec()));
        self.last_end = end;
    }

    /// Clip tokens to the original line, dropping the appended newline, and
    /// flip scopes to innermost-first. An empty line still yields one empty
    /// token carrying `trailing` scopes.
    fn finish(self, line_len: usize, trailing: &[String]) -> Vec<ActualToken> {
        let mut tokens: Vec<ActualToken> = self
            .tokens
            .into_iter()
            .filter(|(start, _, _)| *start < line_len)
            .map(|(start, end, scopes)| ActualToken {
                offset: start,
                length: end.min(line_len) - start,
                scopes: scopes.into_iter().rev().collect(),
            })
            .collect();

        if tokens.is_empty() {
            tokens.push(ActualToken {
                offset: 0,
                length: 0,
                scopes: trailing.iter().rev().cloned().collect(),
            });
        }
        tokens
    }
}

/// Tokenizer for one base grammar. Includes of other grammars are looked up
/// in `registry`.
#[derive(Debug)]
pub struct Tokenizer<'r> {
    base: Arc<Grammar>,
    registry: &'r GrammarRegistry,
    /// End/while patterns rebuilt from back-references, by resolved source.
    dynamic_patterns: HashMap<String, onig::Regex>,
}

impl<'r> Tokenizer<'r> {
    pub fn new(base: Arc<Grammar>, registry: &'r GrammarRegistry) -> Self {
        Tokenizer {
            base,
            registry,
            dynamic_patterns: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------------

    fn scan(
        &mut self,
        stack: &mut ScopeStack,
        text: &str,
        start: usize,
        mut anchor: Option<usize>,
        acc: &mut TokenAccumulator,
    ) -> Result<(), TokenizeError> {
        let mut pos = start;

        loop {
            let anchors = AnchorActive::new(stack.is_first_line(), anchor, pos);
            let Some((target, found)) = self.find_match(stack, text, pos, anchors)? else {
                acc.produce(text.len(), &stack.top().content_scopes);
                return Ok(());
            };
            trace!(pos, start = found.start, end = found.end, "match");
            let advanced = found.end > pos;

            match target {
                Target::End => {
                    acc.produce(found.start, &stack.top().content_scopes);
                    let owner = stack.top().rule.clone();
                    let end_captures: &[Option<RuleId>] = match owner.grammar.rule(owner.rule) {
                        Rule::BeginEnd { end_captures, .. } => end_captures.as_slice(),
                        _ => &[],
                    };

                    let name_scopes = stack.top().name_scopes.clone();
                    stack.top_mut().content_scopes = name_scopes;
                    self.resolve_captures(stack, &owner.grammar, text, end_captures, &found.captures, acc)?;
                    acc.produce(found.end, &stack.top().content_scopes);

                    let popped = stack.pop();
                    if let Some(frame) = &popped {
                        anchor = frame.anchor_position;
                    }
                    // Pushed and popped at the same spot: keep the rule and
                    // give up on the rest of the line.
                    if let Some(frame) = popped.filter(|f| !advanced && f.enter_position == Some(pos)) {
                        stack.push(frame);
                        acc.produce(text.len(), &stack.top().content_scopes);
                        return Ok(());
                    }
                }

                Target::Rule(rule_ref) => {
                    let grammar = Arc::clone(&rule_ref.grammar);
                    let rule = grammar.rule(rule_ref.rule);
                    acc.produce(found.start, &stack.top().content_scopes);

                    let mut scopes = stack.top().content_scopes.clone();
                    scopes.extend(scopes_from(rule.name(), text, &found.captures));

                    if let Rule::Match { captures, .. } = rule {
                        stack.push(Frame::new(rule_ref, scopes, Some(pos)));
                        self.resolve_captures(stack, &grammar, text, captures, &found.captures, acc)?;
                        acc.produce(found.end, &stack.top().content_scopes);
                        stack.pop();

                        if !advanced {
                            acc.produce(text.len(), &stack.top().content_scopes);
                            return Ok(());
                        }
                    } else if let Some((content_name, end, begin_captures)) = begin_parts(rule) {
                        let looping = !advanced
                            && stack
                                .frames()
                                .any(|f| f.enter_position == Some(pos) && f.rule.same_rule(&rule_ref));

                        let mut frame = Frame::new(rule_ref, scopes, Some(pos));
                        frame.anchor_position = anchor;
                        frame.begin_captured_eol = found.end == text.len();
                        stack.push(frame);
                        self.resolve_captures(stack, &grammar, text, begin_captures, &found.captures, acc)?;
                        acc.produce(found.end, &stack.top().content_scopes);
                        anchor = Some(found.end);

                        let mut content = stack.top().name_scopes.clone();
                        content.extend(scopes_from(content_name, text, &found.captures));
                        let top = stack.top_mut();
                        top.content_scopes = content;
                        if let EndPattern::Dynamic(source) = end {
                            top.end_pattern = Some(resolve_backreferences(source, text, &found.captures));
                        }

                        if looping {
                            stack.pop();
                            acc.produce(text.len(), &stack.top().content_scopes);
                            return Ok(());
                        }
                    }
                }
            }

            if advanced {
                pos = found.end;
            }
        }
    }

    /// Best match at or after `pos` among the top rule's patterns and its
    /// end pattern.
    fn find_match(
        &mut self,
        stack: &ScopeStack,
        text: &str,
        pos: usize,
        anchors: AnchorActive,
    ) -> Result<Option<(Target, Found)>, TokenizeError> {
        let options = anchors.to_search_options();
        let top = stack.top();
        let mut best: Option<(RuleRef, Found)> = None;

        for candidate in self.candidates(&top.rule) {
            let Some(pattern) = candidate.grammar.rule(candidate.rule).match_pattern() else {
                continue;
            };
            let Some(found) = search(pattern.regex(), text, pos, options) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, b)| found.start < b.start) {
                let at_pos = found.start == pos;
                best = Some((candidate, found));
                if at_pos {
                    break;
                }
            }
        }

        let end = self.match_end(top, text, pos, options)?;
        let end_last = matches!(
            top.rule.grammar.rule(top.rule.rule),
            Rule::BeginEnd {
                apply_end_pattern_last: true,
                ..
            }
        );

        Ok(match (best, end) {
            (None, None) => None,
            (Some((rule, found)), None) => Some((Target::Rule(rule), found)),
            (None, Some(end)) => Some((Target::End, end)),
            (Some((rule, found)), Some(end)) => {
                if found.start < end.start || (found.start == end.start && end_last) {
                    Some((Target::Rule(rule), found))
                } else {
                    Some((Target::End, end))
                }
            }
        })
    }

    fn match_end(
        &mut self,
        frame: &Frame,
        text: &str,
        pos: usize,
        options: SearchOptions,
    ) -> Result<Option<Found>, TokenizeError> {
        let Rule::BeginEnd { end, .. } = frame.rule.grammar.rule(frame.rule.rule) else {
            return Ok(None);
        };
        let regex = match (&frame.end_pattern, end) {
            (Some(resolved), _) => self.dynamic_regex(resolved)?,
            (None, EndPattern::Static(pattern)) => pattern.regex(),
            (None, EndPattern::Dynamic(source)) => self.dynamic_regex(source)?,
        };
        Ok(search(regex, text, pos, options))
    }

    fn dynamic_regex(&mut self, source: &str) -> Result<&onig::Regex, TokenizeError> {
        if !self.dynamic_patterns.contains_key(source) {
            let regex = onig::Regex::new(source).map_err(|e| TokenizeError::Regex {
                pattern: source.to_string(),
                message: e.to_string(),
            })?;
            self.dynamic_patterns.insert(source.to_string(), regex);
        }
        Ok(&self.dynamic_patterns[source])
    }

    // ------------------------------------------------------------------------
    // While rules
    // ------------------------------------------------------------------------

    /// Re-check every active `while` rule at the start of the line. The
    /// first one that fails is popped along with everything above it.
    /// Returns the position scanning should continue from and the `\G`
    /// position in effect there.
    fn check_while_conditions(
        &mut self,
        stack: &mut ScopeStack,
        text: &str,
        acc: &mut TokenAccumulator,
    ) -> Result<(usize, Option<usize>), TokenizeError> {
        let mut pos = 0;
        let mut anchor = stack.top().begin_captured_eol.then_some(0);
        let while_frames: Vec<usize> = stack
            .frames()
            .enumerate()
            .filter(|(_, f)| matches!(f.rule.grammar.rule(f.rule.rule), Rule::BeginWhile { .. }))
            .map(|(i, _)| i)
            .collect();

        for index in while_frames {
            let Some(frame) = stack.frames().nth(index).cloned() else {
                break;
            };
            let Rule::BeginWhile {
                while_,
                while_captures,
                ..
            } = frame.rule.grammar.rule(frame.rule.rule)
            else {
                continue;
            };

            let found = {
                let regex = match (&frame.end_pattern, while_) {
                    (Some(resolved), _) => self.dynamic_regex(resolved)?,
                    (None, EndPattern::Static(pattern)) => pattern.regex(),
                    (None, EndPattern::Dynamic(source)) => self.dynamic_regex(source)?,
                };
                let anchors = AnchorActive::new(stack.is_first_line(), anchor, pos);
                search(regex, text, pos, anchors.to_search_options())
            };

            match found {
                Some(found) if found.start == pos => {
                    acc.produce(pos, &frame.content_scopes);
                    let upto = stack.prefix(index);
                    self.resolve_captures(&upto, &frame.rule.grammar, text, while_captures, &found.captures, acc)?;
                    acc.produce(found.end, &frame.content_scopes);
                    if found.end > pos {
                        pos = found.end;
                        anchor = Some(pos);
                    }
                }
                _ => {
                    debug!(scope = ?frame.name_scopes.last(), "while condition ended");
                    stack.truncate(index.saturating_sub(1));
                    break;
                }
            }
        }

        Ok((pos, anchor))
    }

    // ------------------------------------------------------------------------
    // Captures
    // ------------------------------------------------------------------------

    /// Emit tokens for the named capture groups of a match. Captures nest by
    /// span; a capture rule with patterns re-tokenizes its captured text.
    fn resolve_captures(
        &mut self,
        stack: &ScopeStack,
        grammar: &Arc<Grammar>,
        text: &str,
        rules: &[Option<RuleId>],
        captures: &CapturePositions,
        acc: &mut TokenAccumulator,
    ) -> Result<(), TokenizeError> {
        if rules.is_empty() {
            return Ok(());
        }

        let base = stack.top().content_scopes.clone();
        // (scopes, end) of captures still open
        let mut open: Vec<(Vec<String>, usize)> = Vec::new();

        for (group, rule_id) in rules.iter().enumerate() {
            let Some(rule_id) = *rule_id else {
                continue;
            };
            let Some(&Some((cap_start, cap_end))) = captures.get(group) else {
                continue;
            };
            if cap_start == cap_end {
                continue;
            }

            while let Some((scopes, end)) = open.last() {
                if *end > cap_start {
                    break;
                }
                acc.produce(*end, scopes);
                open.pop();
            }

            let parent = open.last().map_or(&base, |(scopes, _)| scopes).clone();
            acc.produce(cap_start, &parent);

            let rule = grammar.rule(rule_id);
            let names = scopes_from(rule.name(), text, captures);

            if !rule.patterns().is_empty() {
                let mut scopes = parent;
                scopes.extend(names);
                let mut nested = stack.clone();
                nested.push(Frame::new(RuleRef::new(grammar, rule_id), scopes, Some(cap_start)));
                let mut nested_acc = TokenAccumulator::starting_at(cap_start);
                self.scan(&mut nested, &text[..cap_end], cap_start, None, &mut nested_acc)?;
                for (_, end, scopes) in nested_acc.tokens {
                    acc.produce(end, &scopes);
                }
                continue;
            }

            if !names.is_empty() {
                let mut scopes = parent;
                scopes.extend(names);
                open.push((scopes, cap_end));
            }
        }

        while let Some((scopes, end)) = open.pop() {
            acc.produce(end, &scopes);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Pattern collection
    // ------------------------------------------------------------------------

    /// Rules with a regex reachable from `rule`'s patterns, in order, with
    /// includes and pattern groups flattened.
    fn candidates(&self, rule: &RuleRef) -> Vec<RuleRef> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let grammar = Arc::clone(&rule.grammar);
        self.expand(&grammar, grammar.rule(rule.rule).patterns(), &mut out, &mut seen);
        out
    }

    fn expand(
        &self,
        grammar: &Arc<Grammar>,
        patterns: &[PatternRef],
        out: &mut Vec<RuleRef>,
        seen: &mut HashSet<(*const Grammar, RuleId)>,
    ) {
        for pattern in patterns {
            let Some(target) = self.resolve(grammar, pattern) else {
                continue;
            };
            if !seen.insert(target.key()) {
                continue;
            }
            if target.grammar.rule(target.rule).match_pattern().is_some() {
                out.push(target);
            } else {
                let owner = Arc::clone(&target.grammar);
                self.expand(&owner, owner.rule(target.rule).patterns(), out, seen);
            }
        }
    }

    fn resolve(&self, grammar: &Arc<Grammar>, pattern: &PatternRef) -> Option<RuleRef> {
        match pattern {
            PatternRef::Rule(id) => Some(RuleRef::new(grammar, *id)),
            PatternRef::SelfRoot => Some(RuleRef::new(grammar, grammar.root())),
            PatternRef::Base => Some(RuleRef::new(&self.base, self.base.root())),
            PatternRef::External { scope, rule } => {
                let target = self.grammar_for_scope(scope)?;
                match rule {
                    None => Some(RuleRef::new(&target, target.root())),
                    Some(name) => {
                        let id = target.repository_rule(name);
                        if id.is_none() {
                            warn!(scope = %scope, rule = %name, "include of unknown rule skipped");
                        }
                        id.map(|id| RuleRef::new(&target, id))
                    }
                }
            }
        }
    }

    fn grammar_for_scope(&self, scope: &str) -> Option<Arc<Grammar>> {
        if self.base.scope_name() == scope {
            return Some(Arc::clone(&self.base));
        }
        let found = self.registry.get(scope).cloned();
        if found.is_none() {
            warn!(scope, "include of unregistered grammar skipped");
        }
        found
    }
}

impl LineTokenizer for Tokenizer<'_> {
    type Stack = ScopeStack;

    fn initial_stack(&self) -> ScopeStack {
        ScopeStack::initial(&self.base)
    }

    fn tokenize_line(
        &mut self,
        stack: ScopeStack,
        line: &str,
    ) -> Result<(Vec<ActualToken>, ScopeStack), TokenizeError> {
        let text = format!("{line}\n");
        let mut stack = stack;

        let mut acc = TokenAccumulator::default();
        let (pos, anchor) = self.check_while_conditions(&mut stack, &text, &mut acc)?;
        self.scan(&mut stack, &text, pos, anchor, &mut acc)?;

        let tokens = acc.finish(line.len(), &stack.top().content_scopes);
        stack.end_line();
        Ok((tokens, stack))
    }
}

fn begin_parts(rule: &Rule) -> Option<(Option<&str>, &EndPattern, &[Option<RuleId>])> {
    match rule {
        Rule::BeginEnd {
            content_name,
            end,
            begin_captures,
            ..
        } => Some((content_name.as_deref(), end, begin_captures.as_slice())),
        Rule::BeginWhile {
            content_name,
            while_,
            begin_captures,
            ..
        } => Some((content_name.as_deref(), while_, begin_captures.as_slice())),
        Rule::Match { .. } | Rule::Group { .. } => None,
    }
}

/// Scopes contributed by a `name`/`contentName`, captures substituted.
fn scopes_from(name: Option<&str>, text: &str, captures: &CapturePositions) -> Vec<String> {
    let Some(name) = name else {
        return Vec::new();
    };
    substitute_captures(name, text, captures)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn search(regex: &onig::Regex, text: &str, pos: usize, options: SearchOptions) -> Option<Found> {
    let mut region = Region::new();
    regex.search_with_options(text, pos, text.len(), options, Some(&mut region))?;
    let (start, end) = region.pos(0)?;
    Some(Found {
        start,
        end,
        captures: (0..region.len()).map(|i| region.pos(i)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tokenize_lines;
    use pretty_assertions::assert_eq;

    fn tokenizer_for(json: &str) -> (Arc<Grammar>, GrammarRegistry) {
        (Arc::new(Grammar::from_json_str(json).unwrap()), GrammarRegistry::new())
    }

    /// (text, scopes innermost-first) per token.
    fn render(line: &str, tokens: &[ActualToken]) -> Vec<(String, Vec<String>)> {
        tokens
            .iter()
            .map(|t| (t.text(line).unwrap_or("<bad>").to_string(), t.scopes.clone()))
            .collect()
    }

    fn tok(text: &str, scopes: &[&str]) -> (String, Vec<String>) {
        (text.to_string(), scopes.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_unmatched_line_is_one_base_token() {
        let (grammar, registry) = tokenizer_for(
            r#"{ "scopeName": "source.x",
                 "patterns": [ { "name": "constant.numeric.x", "match": "[0-9]+" } ] }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let stack = tokenizer.initial_stack();
        let (tokens, _) = tokenizer.tokenize_line(stack, "abc").unwrap();
        assert_eq!(
            tokens,
            vec![ActualToken {
                offset: 0,
                length: 3,
                scopes: vec!["source.x".to_string()],
            }]
        );
    }

    #[test]
    fn test_match_with_captures_nests_scopes() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [
                    { "name": "meta.pair.x", "match": "(\\w+)(=)(\\w+)",
                      "captures": { "1": { "name": "variable.x" }, "2": { "name": "keyword.operator.x" } } }
                ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let line = " a=b";
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), line).unwrap();
        assert_eq!(
            render(line, &tokens),
            vec![
                tok(" ", &["source.x"]),
                tok("a", &["variable.x", "meta.pair.x", "source.x"]),
                tok("=", &["keyword.operator.x", "meta.pair.x", "source.x"]),
                tok("b", &["meta.pair.x", "source.x"]),
            ]
        );
    }

    #[test]
    fn test_begin_end_carries_across_lines() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [ { "name": "comment.block.x", "begin": "/\\*", "end": "\\*/" } ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let (first, stack) = tokenizer.tokenize_line(tokenizer.initial_stack(), "a /* b").unwrap();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.scopes().collect::<Vec<_>>(), vec!["source.x", "comment.block.x"]);
        assert_eq!(
            render("a /* b", &first),
            vec![
                tok("a ", &["source.x"]),
                tok("/*", &["comment.block.x", "source.x"]),
                tok(" b", &["comment.block.x", "source.x"]),
            ]
        );

        let (second, stack) = tokenizer.tokenize_line(stack, "c */ d").unwrap();
        assert_eq!(stack.depth(), 0);
        assert_eq!(
            render("c */ d", &second),
            vec![
                tok("c ", &["comment.block.x", "source.x"]),
                tok("*/", &["comment.block.x", "source.x"]),
                tok(" d", &["source.x"]),
            ]
        );
    }

    #[test]
    fn test_backreference_end_uses_begin_capture() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [ { "name": "string.x", "begin": "(['\"])", "end": "\\1" } ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let line = r#"'a"b' c"#;
        let (tokens, stack) = tokenizer.tokenize_line(tokenizer.initial_stack(), line).unwrap();
        assert_eq!(stack.depth(), 0);
        assert_eq!(
            render(line, &tokens),
            vec![
                tok("'", &["string.x", "source.x"]),
                tok("a\"b", &["string.x", "source.x"]),
                tok("'", &["string.x", "source.x"]),
                tok(" c", &["source.x"]),
            ]
        );
    }

    #[test]
    fn test_content_name_excludes_delimiters() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [ { "name": "meta.block.x", "contentName": "meta.body.x", "begin": "\\{", "end": "\\}" } ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let line = "{a}";
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), line).unwrap();
        assert_eq!(
            render(line, &tokens),
            vec![
                tok("{", &["meta.block.x", "source.x"]),
                tok("a", &["meta.body.x", "meta.block.x", "source.x"]),
                tok("}", &["meta.block.x", "source.x"]),
            ]
        );
    }

    #[test]
    fn test_empty_line_yields_empty_token() {
        let (grammar, registry) = tokenizer_for(r#"{ "scopeName": "source.x", "patterns": [] }"#);
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), "").unwrap();
        assert_eq!(
            tokens,
            vec![ActualToken {
                offset: 0,
                length: 0,
                scopes: vec!["source.x".to_string()],
            }]
        );
    }

    #[test]
    fn test_zero_width_match_does_not_hang() {
        let (grammar, registry) = tokenizer_for(
            r#"{ "scopeName": "source.x", "patterns": [ { "name": "meta.empty.x", "match": "(?=b)" } ] }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), "abc").unwrap();
        assert_eq!(render("abc", &tokens), vec![tok("a", &["source.x"]), tok("bc", &["source.x"])]);
    }

    #[test]
    fn test_zero_width_begin_end_does_not_hang() {
        let (grammar, registry) = tokenizer_for(
            r#"{ "scopeName": "source.x", "patterns": [ { "name": "meta.x", "begin": "(?=a)", "end": "(?=a)" } ] }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), "ab").unwrap();
        let covered: usize = tokens.iter().map(|t| t.length).sum();
        assert_eq!(covered, 2);
    }

    #[test]
    fn test_capture_with_patterns_is_retokenized() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [
                    { "match": "<(\\w+ \\w+)>",
                      "captures": { "1": { "name": "meta.inner.x",
                        "patterns": [ { "name": "keyword.x", "match": "if" } ] } } }
                ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let line = "<if x>";
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), line).unwrap();
        assert_eq!(
            render(line, &tokens),
            vec![
                tok("<", &["source.x"]),
                tok("if", &["keyword.x", "meta.inner.x", "source.x"]),
                tok(" x", &["meta.inner.x", "source.x"]),
                tok(">", &["source.x"]),
            ]
        );
    }

    #[test]
    fn test_g_anchor_only_where_begin_ended() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [
                    { "name": "meta.group.x", "begin": "\\(", "end": "\\)",
                      "patterns": [ { "name": "variable.x", "match": "a" }, { "name": "first.x", "match": "\\G x" } ] }
                ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);

        let line = "(a x)";
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), line).unwrap();
        assert_eq!(
            render(line, &tokens),
            vec![
                tok("(", &["meta.group.x", "source.x"]),
                tok("a", &["variable.x", "meta.group.x", "source.x"]),
                tok(" x", &["meta.group.x", "source.x"]),
                tok(")", &["meta.group.x", "source.x"]),
            ]
        );

        let line = "( x)";
        let (tokens, _) = tokenizer.tokenize_line(tokenizer.initial_stack(), line).unwrap();
        assert_eq!(
            render(line, &tokens),
            vec![
                tok("(", &["meta.group.x", "source.x"]),
                tok(" x", &["first.x", "meta.group.x", "source.x"]),
                tok(")", &["meta.group.x", "source.x"]),
            ]
        );
    }

    #[test]
    fn test_a_anchor_only_on_first_line() {
        let (grammar, registry) =
            tokenizer_for(r#"{ "scopeName": "source.x", "patterns": [ { "name": "first.x", "match": "\\Ax" } ] }"#);
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let (tokens, _) = tokenize_lines(&mut tokenizer, ["x", "x"]).unwrap();
        assert_eq!(render("x", &tokens[0]), vec![tok("x", &["first.x", "source.x"])]);
        assert_eq!(render("x", &tokens[1]), vec![tok("x", &["source.x"])]);
    }

    #[test]
    fn test_g_anchor_at_line_start_after_begin_took_the_newline() {
        let (grammar, registry) = tokenizer_for(
            r#"{
                "scopeName": "source.x",
                "patterns": [
                    { "name": "meta.block.x", "begin": ":\\n", "end": "^\\.",
                      "patterns": [ { "name": "first.x", "match": "\\Gy" } ] }
                ]
            }"#,
        );
        let mut tokenizer = Tokenizer::new(grammar, &registry);
        let (tokens, stack) = tokenize_lines(&mut tokenizer, [":", "yy", "."]).unwrap();
        assert_eq!(
            render("yy", &tokens[1]),
            vec![
                tok("y", &["first.x", "meta.block.x", "source.x"]),
                tok("y", &["meta.block.x", "source.x"]),
            ]
        );
        assert_eq!(stack.depth(), 0);
    }
}

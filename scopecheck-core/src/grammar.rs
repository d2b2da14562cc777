//! TextMate grammar model.
//!
//! Grammars are deserialized into `RawGrammar`/`RawRule` and then compiled
//! into a flat rule arena. Compiling resolves local includes (`#name`,
//! `$self`, `$base`) against the lexically enclosing `repository` blocks and
//! compiles every static regex up front, so a bad pattern surfaces as a load
//! error rather than mid-tokenization.
//!
//! # Rule arena
//!
//! ```text
//! rules[0..n]   repository entries and nested rules, in compile order
//! rules[root]   the top-level `patterns` list, compiled last
//! ```
//!
//! Includes that name another grammar (`source.js`, `source.js#expr`) stay
//! symbolic and are looked up in the registry while tokenizing.

use std::collections::HashMap;
use std::path::Path;

use memchr::memchr_iter;
use serde::{Deserialize, Deserializer};

use crate::error::GrammarError;

/// Index into a grammar's rule arena.
pub type RuleId = usize;

// ============================================================================
// Raw (deserialized) form
// ============================================================================

/// A grammar file as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrammar {
    #[serde(default)]
    pub scope_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub patterns: Vec<RawRule>,
    #[serde(default)]
    pub repository: HashMap<String, RawRule>,
}

/// A single rule as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_name: Option<String>,
    #[serde(default, rename = "match")]
    pub match_: Option<String>,
    #[serde(default)]
    pub begin: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, rename = "while")]
    pub while_: Option<String>,
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub captures: HashMap<String, RawRule>,
    #[serde(default)]
    pub begin_captures: HashMap<String, RawRule>,
    #[serde(default)]
    pub end_captures: HashMap<String, RawRule>,
    #[serde(default)]
    pub while_captures: HashMap<String, RawRule>,
    #[serde(default)]
    pub patterns: Vec<RawRule>,
    #[serde(default)]
    pub repository: HashMap<String, RawRule>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub apply_end_pattern_last: bool,
}

/// `applyEndPatternLast` shows up as both `true` and `1` in the wild.
fn bool_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

// ============================================================================
// Compiled form
// ============================================================================

/// A compiled `match`/`begin`/`end`/`while` regex.
#[derive(Debug)]
pub struct Pattern {
    regex: onig::Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, GrammarError> {
        let regex = onig::Regex::new(source).map_err(|e| GrammarError::Regex {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Pattern { regex })
    }

    #[inline]
    pub fn regex(&self) -> &onig::Regex {
        &self.regex
    }
}

/// An `end` or `while` pattern. When it back-references begin captures it
/// can only be compiled once those captures are known.
#[derive(Debug)]
pub enum EndPattern {
    Static(Pattern),
    Dynamic(String),
}

impl EndPattern {
    fn new(source: &str) -> Result<Self, GrammarError> {
        if has_backreferences(source) {
            Ok(EndPattern::Dynamic(source.to_string()))
        } else {
            Pattern::new(source).map(EndPattern::Static)
        }
    }
}

/// Entry in a rule's `patterns` list after include resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternRef {
    Rule(RuleId),
    /// `$self`: the top-level patterns of the grammar that owns the rule.
    SelfRoot,
    /// `$base`: the top-level patterns of the grammar being tokenized.
    Base,
    /// `scope.name` or `scope.name#rule` from another grammar.
    External { scope: String, rule: Option<String> },
}

/// Capture group number to capture rule. Gaps are `None`.
pub type Captures = Vec<Option<RuleId>>;

/// A compiled grammar rule.
#[derive(Debug)]
pub enum Rule {
    Match {
        name: Option<String>,
        regex: Pattern,
        captures: Captures,
    },
    BeginEnd {
        name: Option<String>,
        content_name: Option<String>,
        begin: Pattern,
        end: EndPattern,
        begin_captures: Captures,
        end_captures: Captures,
        patterns: Vec<PatternRef>,
        apply_end_pattern_last: bool,
    },
    BeginWhile {
        name: Option<String>,
        content_name: Option<String>,
        begin: Pattern,
        while_: EndPattern,
        begin_captures: Captures,
        while_captures: Captures,
        patterns: Vec<PatternRef>,
    },
    /// Include-only rules, capture rules and the grammar root: a name
    /// and/or a list of patterns with no regex of their own.
    Group {
        name: Option<String>,
        patterns: Vec<PatternRef>,
    },
}

impl Rule {
    pub fn name(&self) -> Option<&str> {
        match self {
            Rule::Match { name, .. }
            | Rule::BeginEnd { name, .. }
            | Rule::BeginWhile { name, .. }
            | Rule::Group { name, .. } => name.as_deref(),
        }
    }

    pub fn content_name(&self) -> Option<&str> {
        match self {
            Rule::BeginEnd { content_name, .. } | Rule::BeginWhile { content_name, .. } => {
                content_name.as_deref()
            }
            _ => None,
        }
    }

    pub fn patterns(&self) -> &[PatternRef] {
        match self {
            Rule::BeginEnd { patterns, .. }
            | Rule::BeginWhile { patterns, .. }
            | Rule::Group { patterns, .. } => patterns,
            Rule::Match { .. } => &[],
        }
    }

    /// The regex that starts this rule, if it has one.
    pub fn match_pattern(&self) -> Option<&Pattern> {
        match self {
            Rule::Match { regex, .. } => Some(regex),
            Rule::BeginEnd { begin, .. } | Rule::BeginWhile { begin, .. } => Some(begin),
            Rule::Group { .. } => None,
        }
    }

    fn placeholder() -> Self {
        Rule::Group {
            name: None,
            patterns: Vec::new(),
        }
    }
}

/// A loaded, compiled grammar.
#[derive(Debug)]
pub struct Grammar {
    scope_name: String,
    name: Option<String>,
    rules: Vec<Rule>,
    root: RuleId,
    repository: HashMap<String, RuleId>,
}

impl Grammar {
    /// Load a grammar file: `.yaml`/`.yml` as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, GrammarError> {
        let content = std::fs::read_to_string(path).map_err(|source| GrammarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();

        let raw: RawGrammar = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|source| {
                GrammarError::Yaml {
                    origin: origin.clone(),
                    source,
                }
            })?,
            _ => serde_json::from_str(&content).map_err(|source| GrammarError::Json {
                origin: origin.clone(),
                source,
            })?,
        };

        Self::compile(&raw, &origin)
    }

    /// Parse and compile a JSON grammar held in memory.
    pub fn from_json_str(content: &str) -> Result<Self, GrammarError> {
        let raw: RawGrammar = serde_json::from_str(content).map_err(|source| GrammarError::Json {
            origin: "<inline>".to_string(),
            source,
        })?;
        Self::compile(&raw, "<inline>")
    }

    fn compile(raw: &RawGrammar, origin: &str) -> Result<Self, GrammarError> {
        let scope_name = raw
            .scope_name
            .clone()
            .ok_or_else(|| GrammarError::MissingScopeName {
                origin: origin.to_string(),
            })?;

        let mut compiler = Compiler::default();
        let top = RepoScope {
            entries: compiler.reserve(&raw.repository),
            parent: None,
        };
        compiler.fill(&raw.repository, &top)?;
        let patterns = compiler.patterns(&raw.patterns, &top)?;
        let root = compiler.push(Rule::Group {
            name: None,
            patterns,
        });

        Ok(Grammar {
            scope_name,
            name: raw.name.clone(),
            rules: compiler.rules,
            root,
            repository: top.entries,
        })
    }

    /// The grammar's declared scope name, e.g. `source.js`.
    #[inline]
    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Rule holding the grammar's top-level patterns.
    #[inline]
    pub fn root(&self) -> RuleId {
        self.root
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    /// Look up a top-level repository entry, as `scope#name` includes do.
    pub fn repository_rule(&self, name: &str) -> Option<RuleId> {
        self.repository.get(name).copied()
    }
}

// ============================================================================
// Compiler
// ============================================================================

/// One lexical `repository` level. Entry ids are reserved before any rule
/// in the level is compiled, so siblings can include each other.
struct RepoScope<'p> {
    entries: HashMap<String, RuleId>,
    parent: Option<&'p RepoScope<'p>>,
}

impl RepoScope<'_> {
    fn lookup(&self, name: &str) -> Option<RuleId> {
        match self.entries.get(name) {
            Some(id) => Some(*id),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }
}

#[derive(Default)]
struct Compiler {
    rules: Vec<Rule>,
}

impl Compiler {
    fn push(&mut self, rule: Rule) -> RuleId {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    fn reserve(&mut self, repository: &HashMap<String, RawRule>) -> HashMap<String, RuleId> {
        repository
            .keys()
            .map(|name| (name.clone(), self.push(Rule::placeholder())))
            .collect()
    }

    fn fill(&mut self, repository: &HashMap<String, RawRule>, scope: &RepoScope<'_>) -> Result<(), GrammarError> {
        for (name, raw) in repository {
            let Some(id) = scope.entries.get(name).copied() else {
                continue;
            };
            let rule = self.rule(raw, scope)?;
            self.rules[id] = rule;
        }
        Ok(())
    }

    fn rule(&mut self, raw: &RawRule, parent: &RepoScope<'_>) -> Result<Rule, GrammarError> {
        if raw.repository.is_empty() {
            return self.rule_in(raw, parent);
        }
        let scope = RepoScope {
            entries: self.reserve(&raw.repository),
            parent: Some(parent),
        };
        self.fill(&raw.repository, &scope)?;
        self.rule_in(raw, &scope)
    }

    fn rule_in(&mut self, raw: &RawRule, scope: &RepoScope<'_>) -> Result<Rule, GrammarError> {
        if let Some(source) = &raw.match_ {
            return Ok(Rule::Match {
                name: raw.name.clone(),
                regex: Pattern::new(source)?,
                captures: self.captures(&raw.captures, scope)?,
            });
        }

        if let Some(begin) = &raw.begin {
            let begin_captures = if raw.begin_captures.is_empty() {
                &raw.captures
            } else {
                &raw.begin_captures
            };

            if let Some(while_) = &raw.while_ {
                let while_captures = if raw.while_captures.is_empty() {
                    &raw.captures
                } else {
                    &raw.while_captures
                };
                return Ok(Rule::BeginWhile {
                    name: raw.name.clone(),
                    content_name: raw.content_name.clone(),
                    begin: Pattern::new(begin)?,
                    while_: EndPattern::new(while_)?,
                    begin_captures: self.captures(begin_captures, scope)?,
                    while_captures: self.captures(while_captures, scope)?,
                    patterns: self.patterns(&raw.patterns, scope)?,
                });
            }

            let end_captures = if raw.end_captures.is_empty() {
                &raw.captures
            } else {
                &raw.end_captures
            };
            // A begin rule without an end never closes.
            let end = raw.end.as_deref().unwrap_or("(?!)");
            return Ok(Rule::BeginEnd {
                name: raw.name.clone(),
                content_name: raw.content_name.clone(),
                begin: Pattern::new(begin)?,
                end: EndPattern::new(end)?,
                begin_captures: self.captures(begin_captures, scope)?,
                end_captures: self.captures(end_captures, scope)?,
                patterns: self.patterns(&raw.patterns, scope)?,
                apply_end_pattern_last: raw.apply_end_pattern_last,
            });
        }

        let mut patterns = Vec::new();
        if let Some(include) = &raw.include {
            patterns.extend(resolve_include(include, scope));
        }
        patterns.extend(self.patterns(&raw.patterns, scope)?);
        Ok(Rule::Group {
            name: raw.name.clone(),
            patterns,
        })
    }

    fn patterns(&mut self, raws: &[RawRule], scope: &RepoScope<'_>) -> Result<Vec<PatternRef>, GrammarError> {
        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
            let include_only = raw.match_.is_none() && raw.begin.is_none() && raw.patterns.is_empty();
            match &raw.include {
                Some(include) if include_only => out.extend(resolve_include(include, scope)),
                _ => {
                    let rule = self.rule(raw, scope)?;
                    out.push(PatternRef::Rule(self.push(rule)));
                }
            }
        }
        Ok(out)
    }

    fn captures(&mut self, raw: &HashMap<String, RawRule>, scope: &RepoScope<'_>) -> Result<Captures, GrammarError> {
        let mut numbered: Vec<(usize, &RawRule)> = raw
            .iter()
            .filter_map(|(key, rule)| key.parse::<usize>().ok().map(|n| (n, rule)))
            .collect();
        numbered.sort_by_key(|(n, _)| *n);

        let Some(max) = numbered.last().map(|(n, _)| *n) else {
            return Ok(Vec::new());
        };
        let mut captures = vec![None; max + 1];
        for (n, rule) in numbered {
            let compiled = self.rule(rule, scope)?;
            captures[n] = Some(self.push(compiled));
        }
        Ok(captures)
    }
}

fn resolve_include(include: &str, scope: &RepoScope<'_>) -> Option<PatternRef> {
    match include {
        "$self" => Some(PatternRef::SelfRoot),
        "$base" => Some(PatternRef::Base),
        local if local.starts_with('#') => {
            let found = scope.lookup(&local[1..]).map(PatternRef::Rule);
            if found.is_none() {
                tracing::warn!(include = local, "skipping include of unknown repository rule");
            }
            found
        }
        external => {
            let (scope, rule) = match external.split_once('#') {
                Some((scope, rule)) => (scope, Some(rule.to_string())),
                None => (external, None),
            };
            Some(PatternRef::External {
                scope: scope.to_string(),
                rule,
            })
        }
    }
}

/// True when a pattern refers back to a capture, e.g. `\1`. An escaped
/// backslash (`\\1`) does not count.
pub fn has_backreferences(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut skip_until = 0;
    for i in memchr_iter(b'\\', bytes) {
        if i < skip_until {
            continue;
        }
        match bytes.get(i + 1) {
            Some(b) if b.is_ascii_digit() => return true,
            Some(_) => skip_until = i + 2,
            None => {}
        }
    }
    false
}

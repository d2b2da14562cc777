//! Theme resolution for scope paths.
//!
//! A theme is an ordered list of rules, each a set of scope selectors plus
//! style settings. Resolving a scope path picks, separately for foreground,
//! background and font style, the best-ranked matching rule that sets that
//! attribute.
//!
//! ## Ranking
//!
//! Candidates are compared on, in order:
//!
//! 1. how deep in the path the scope matched by the selector's last element is
//! 2. how many dot segments that element has
//! 3. how many ancestor elements precede it
//! 4. rule position (later wins)
//!
//! So for the path `source.reason markup.inserted entity.name.filename`,
//! `source.reason entity.name.filename` outranks `entity.name`, which
//! outranks `markup.inserted`.

use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;

/// Optional style attributes of one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSettings {
    #[serde(default)]
    pub foreground: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub font_style: Option<String>,
}

/// Colors used when no rule sets an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDefaults {
    pub foreground: String,
    pub background: String,
}

impl Default for ThemeDefaults {
    fn default() -> Self {
        ThemeDefaults {
            foreground: "#FFF".to_string(),
            background: "#000".to_string(),
        }
    }
}

/// Fully resolved style for one scope path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub foreground: String,
    pub background: String,
    pub font_style: Option<String>,
}

/// A space-separated selector such as `source.reason entity.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSelector {
    elements: Vec<String>,
}

/// (depth, segments, ancestors); rule position breaks the final tie.
type Rank = (usize, usize, usize);

impl ScopeSelector {
    pub fn parse(selector: &str) -> Option<Self> {
        let elements: Vec<String> = selector.split_whitespace().map(str::to_string).collect();
        if elements.is_empty() {
            None
        } else {
            Some(ScopeSelector { elements })
        }
    }

    /// Rank of the best way this selector matches `path`, if it matches.
    fn rank(&self, path: &[&str]) -> Option<Rank> {
        let (last, ancestors) = self.elements.split_last()?;
        let segments = last.split('.').count();

        (0..path.len()).rev().find_map(|depth| {
            if !scope_prefix_matches(last, path[depth]) {
                return None;
            }
            // Ancestors must appear before `depth`, in order.
            let mut remaining = path[..depth].iter().rev();
            let all_found = ancestors
                .iter()
                .rev()
                .all(|ancestor| remaining.any(|scope| scope_prefix_matches(ancestor, scope)));
            all_found.then_some((depth, segments, ancestors.len()))
        })
    }
}

/// `selector` is `scope` or a dot-segment prefix of it.
fn scope_prefix_matches(selector: &str, scope: &str) -> bool {
    match scope.strip_prefix(selector) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRule {
    pub selectors: Vec<ScopeSelector>,
    pub style: StyleSettings,
}

impl ThemeRule {
    /// Build a rule from a comma-separated selector list.
    pub fn new(selectors: &str, style: StyleSettings) -> Self {
        ThemeRule {
            selectors: selectors.split(',').filter_map(ScopeSelector::parse).collect(),
            style,
        }
    }

    fn rank(&self, path: &[&str]) -> Option<Rank> {
        self.selectors.iter().filter_map(|s| s.rank(path)).max()
    }
}

// ============================================================================
// Theme file format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTheme {
    #[serde(default)]
    settings: Vec<RawThemeRule>,
    #[serde(default)]
    token_colors: Vec<RawThemeRule>,
}

#[derive(Debug, Deserialize)]
struct RawThemeRule {
    #[serde(default)]
    scope: Option<RawScope>,
    #[serde(default)]
    settings: StyleSettings,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScope {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Theme {
    rules: Vec<ThemeRule>,
    defaults: ThemeDefaults,
}

impl Theme {
    pub fn from_rules(rules: Vec<ThemeRule>, defaults: ThemeDefaults) -> Self {
        Theme { rules, defaults }
    }

    /// Load a JSON theme file. A rule without `scope` replaces the given
    /// defaults.
    pub fn load(path: &Path, defaults: ThemeDefaults) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path, defaults)
    }

    pub fn from_json_str(content: &str, defaults: ThemeDefaults) -> Result<Self, LoadError> {
        Self::parse(content, Path::new("<inline>"), defaults)
    }

    fn parse(content: &str, origin: &Path, mut defaults: ThemeDefaults) -> Result<Self, LoadError> {
        let raw: RawTheme = serde_json::from_str(content).map_err(|e| LoadError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut rules = Vec::new();
        for entry in raw.settings.into_iter().chain(raw.token_colors) {
            match entry.scope {
                None => {
                    if let Some(fg) = entry.settings.foreground {
                        defaults.foreground = fg;
                    }
                    if let Some(bg) = entry.settings.background {
                        defaults.background = bg;
                    }
                }
                Some(RawScope::One(scope)) => rules.push(ThemeRule::new(&scope, entry.settings)),
                Some(RawScope::Many(scopes)) => rules.push(ThemeRule {
                    selectors: scopes.iter().filter_map(|s| ScopeSelector::parse(s)).collect(),
                    style: entry.settings,
                }),
            }
        }

        tracing::debug!(rules = rules.len(), "loaded theme");
        Ok(Theme { rules, defaults })
    }

    #[inline]
    pub fn rules(&self) -> &[ThemeRule] {
        &self.rules
    }

    #[inline]
    pub fn defaults(&self) -> &ThemeDefaults {
        &self.defaults
    }

    /// Resolve a space-separated scope path, outermost scope first.
    pub fn resolve(&self, scope_path: &str) -> ResolvedStyle {
        let path: Vec<&str> = scope_path.split_whitespace().collect();
        let ranked: Vec<(Rank, usize, &StyleSettings)> = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| rule.rank(&path).map(|rank| (rank, i, &rule.style)))
            .collect();

        let best = |attr: fn(&StyleSettings) -> Option<&String>| -> Option<String> {
            ranked
                .iter()
                .filter_map(|(rank, i, style)| attr(style).map(|value| ((*rank, *i), value)))
                .max_by_key(|(key, _)| *key)
                .map(|(_, value)| value.clone())
        };

        ResolvedStyle {
            foreground: best(|s| s.foreground.as_ref()).unwrap_or_else(|| self.defaults.foreground.clone()),
            background: best(|s| s.background.as_ref()).unwrap_or_else(|| self.defaults.background.clone()),
            font_style: best(|s| s.font_style.as_ref()),
        }
    }
}

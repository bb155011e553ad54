//! Rewrite rules and rule sets.
//!
//! A [`Rule`] is one step of a rewrite: either a pattern [`Substitution`]
//! (literal text or regex, with a template or computed replacement) or a
//! whole-text [`Transform`]. A [`RuleSet`] is an ordered list of rules; later
//! rules see the output of earlier ones.
//!
//! Two rule sets harden bundler output:
//! - [`bootstrap::BOOTSTRAP_RULES`] for the per-module runtime helpers
//! - [`main_chunk::MAIN_RULES`] for the top-level chunk wrapper
//!
//! Rules are declared once and never mutated; patterns compile lazily on the
//! first rewrite.

pub mod bootstrap;
pub mod main_chunk;
pub mod regex_engine;

use std::borrow::Cow;

use regex_engine::LazyCompiledRegex;
pub use regex_engine::{MatchGroups, PatternKind};

use crate::engine::{MatchContext, RewriteError};

/// Computes the replacement for one match.
pub type ReplaceFn = fn(&MatchGroups<'_>, &MatchContext<'_>) -> Result<String, RewriteError>;

/// Rewrites the whole running text in one step.
pub type TransformFn = fn(&str, &MatchContext<'_>) -> Result<String, RewriteError>;

/// How many occurrences a substitution replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceScope {
    /// Every non-overlapping occurrence.
    #[default]
    All,
    /// Only the leftmost occurrence.
    First,
}

impl ReplaceScope {
    /// Replacement limit in the regex crates' convention (0 = unlimited).
    #[must_use]
    pub const fn limit(self) -> usize {
        match self {
            Self::All => 0,
            Self::First => 1,
        }
    }
}

/// What a match is replaced with.
#[derive(Clone)]
pub enum Replacement {
    /// Template text; `$1`, `$&` and `$$` are expanded per match.
    Template(Cow<'static, str>),
    /// Computed per match; the result is inserted verbatim.
    Computed(ReplaceFn),
}

impl std::fmt::Debug for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// A pattern-based rewrite step.
pub struct Substitution {
    /// Stable name used in diagnostics and `bpg rules`.
    pub name: &'static str,
    /// What to look for.
    pub pattern: LazyCompiledRegex,
    /// What to put in its place.
    pub replacement: Replacement,
    /// A mandatory rule that changes nothing aborts the rewrite.
    pub mandatory: bool,
    /// Every occurrence, or only the first.
    pub scope: ReplaceScope,
}

impl std::fmt::Debug for Substitution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Substitution")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("kind", &self.pattern.kind())
            .field("replacement", &self.replacement)
            .field("mandatory", &self.mandatory)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Substitution {
    /// Mandatory, global substitution of exact text.
    #[must_use]
    pub fn literal(
        name: &'static str,
        from: impl Into<Cow<'static, str>>,
        to: impl Into<Cow<'static, str>>,
    ) -> Self {
        let pattern = match from.into() {
            Cow::Borrowed(text) => LazyCompiledRegex::literal(text),
            Cow::Owned(text) => LazyCompiledRegex::literal_owned(text),
        };
        Self {
            name,
            pattern,
            replacement: Replacement::Template(to.into()),
            mandatory: true,
            scope: ReplaceScope::All,
        }
    }

    /// Mandatory, global substitution of a regex.
    #[must_use]
    pub fn regex(
        name: &'static str,
        pattern: impl Into<Cow<'static, str>>,
        replacement: Replacement,
    ) -> Self {
        let pattern = match pattern.into() {
            Cow::Borrowed(text) => LazyCompiledRegex::new(text),
            Cow::Owned(text) => LazyCompiledRegex::new_owned(text),
        };
        Self {
            name,
            pattern,
            replacement,
            mandatory: true,
            scope: ReplaceScope::All,
        }
    }

    /// Mark the rule as optional: no match is an expected outcome.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Only replace the leftmost occurrence.
    #[must_use]
    pub fn first_only(mut self) -> Self {
        self.scope = ReplaceScope::First;
        self
    }

    /// Apply this substitution to `text`.
    ///
    /// Returns `Ok(None)` when the text comes out byte-identical, whether
    /// because nothing matched or because every replacement equalled its
    /// match. Mandatory-ness is not checked here; see
    /// [`crate::engine::assert_matched`].
    ///
    /// # Errors
    /// Fails if the pattern does not compile, the backtracking engine aborts,
    /// or a computed replacement fails.
    pub fn substitute(
        &self,
        text: &str,
        ctx: &MatchContext<'_>,
    ) -> Result<Option<String>, RewriteError> {
        if !self.pattern.might_match(text) {
            return Ok(None);
        }
        let compiled = self
            .pattern
            .compiled()
            .map_err(|message| RewriteError::InvalidPattern {
                rule_name: self.name,
                pattern: self.pattern.as_str().to_string(),
                message: message.to_string(),
            })?;

        let mut failure = None;
        let replaced = match &self.replacement {
            Replacement::Template(template) => {
                compiled.replace_with(text, self.scope.limit(), |groups| groups.expand(template))
            }
            Replacement::Computed(compute) => {
                compiled.replace_with(text, self.scope.limit(), |groups| {
                    if failure.is_some() {
                        return groups.whole().to_string();
                    }
                    compute(groups, ctx).unwrap_or_else(|err| {
                        failure = Some(err);
                        groups.whole().to_string()
                    })
                })
            }
        }
        .map_err(|message| RewriteError::Execution {
            rule_name: self.name,
            pattern: self.pattern.as_str().to_string(),
            message,
        })?;

        if let Some(err) = failure {
            return Err(err);
        }
        Ok(match replaced {
            Cow::Owned(out) if out != text => Some(out),
            _ => None,
        })
    }
}

/// A whole-text rewrite step.
#[derive(Clone)]
pub struct Transform {
    /// Stable name used in diagnostics and `bpg rules`.
    pub name: &'static str,
    /// The rewrite itself.
    pub apply: TransformFn,
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One step of a rule set.
#[derive(Debug)]
pub enum Rule {
    Substitute(Substitution),
    Transform(Transform),
}

impl Rule {
    /// The rule's diagnostic name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Substitute(sub) => sub.name,
            Self::Transform(transform) => transform.name,
        }
    }

    /// Whether a no-op application aborts the rewrite.
    #[must_use]
    pub const fn is_mandatory(&self) -> bool {
        match self {
            Self::Substitute(sub) => sub.mandatory,
            Self::Transform(_) => false,
        }
    }
}

impl From<Substitution> for Rule {
    fn from(sub: Substitution) -> Self {
        Self::Substitute(sub)
    }
}

impl From<Transform> for Rule {
    fn from(transform: Transform) -> Self {
        Self::Transform(transform)
    }
}

/// An ordered, immutable list of rules.
#[derive(Debug)]
pub struct RuleSet {
    name: &'static str,
    rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub const fn new(name: &'static str, rules: Vec<Rule>) -> Self {
        Self { name, rules }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name() == name)
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Declare a literal substitution rule.
///
/// # Variants
///
/// - `literal_rule!("name", "from", "to")` - mandatory
/// - `literal_rule!("name", "from", "to", optional)` - no match is fine
#[macro_export]
macro_rules! literal_rule {
    ($name:literal, $from:expr, $to:expr) => {
        $crate::rules::Rule::Substitute($crate::rules::Substitution::literal($name, $from, $to))
    };
    ($name:literal, $from:expr, $to:expr, optional) => {
        $crate::rules::Rule::Substitute(
            $crate::rules::Substitution::literal($name, $from, $to).optional(),
        )
    };
}

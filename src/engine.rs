//! The rewrite engine.
//!
//! [`apply`] runs a [`RuleSet`] over a text, strictly in declared order, and
//! returns the rewritten text. A mandatory substitution that leaves the text
//! unchanged means the generator's output no longer has the shape the rules
//! were written for; the rewrite aborts with
//! [`RewriteError::StructuralMismatch`] and the unmodified text is logged.
//!
//! The engine keeps no state between calls. Recursive rewrites (a computed
//! replacement running another rule set over its match) go through
//! [`MatchContext::rewrite`].

use tracing::{debug, error, instrument, trace};

use crate::rules::{Rule, RuleSet, Substitution};

/// Chunk name shown when the caller did not supply one.
pub const DEFAULT_CHUNK_LABEL: &str = "bootstrap";

/// Prefix of every rewrite error message.
pub const ERROR_PREFIX: &str = "[ProtectBootstrap]";

/// Tracing target of the mismatch event that carries the unmodified text.
pub const SOURCE_DUMP_TARGET: &str = "bpg::source";

/// Read-only information handed to rules during a rewrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    chunk_name: Option<&'a str>,
}

impl<'a> MatchContext<'a> {
    #[must_use]
    pub const fn new(chunk_name: Option<&'a str>) -> Self {
        Self { chunk_name }
    }

    /// The chunk name, if the host supplied one.
    #[must_use]
    pub const fn chunk_name(&self) -> Option<&'a str> {
        self.chunk_name
    }

    /// Name used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> &'a str {
        self.chunk_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CHUNK_LABEL)
    }

    /// Rewrite `text` with another rule set under the same context.
    ///
    /// # Errors
    /// Same as [`apply`].
    pub fn rewrite(&self, rules: &RuleSet, text: &str) -> Result<String, RewriteError> {
        apply(rules, text, self)
    }
}

/// Why a rewrite failed.
#[derive(Debug)]
pub enum RewriteError {
    /// A mandatory rule changed nothing: the input does not have the expected shape.
    StructuralMismatch {
        /// Position of the rule in its rule set (set once known).
        rule_index: Option<usize>,
        rule_name: &'static str,
        pattern: String,
        chunk_name: String,
        /// The full text handed to the rule set that failed.
        source_text: String,
    },
    /// A rule's pattern does not compile.
    InvalidPattern {
        rule_name: &'static str,
        pattern: String,
        message: String,
    },
    /// The backtracking engine gave up while scanning.
    Execution {
        rule_name: &'static str,
        pattern: String,
        message: String,
    },
}

impl RewriteError {
    /// Build a mismatch for `rule` whose position is not yet known.
    #[must_use]
    pub fn mismatch(rule: &Substitution, ctx: &MatchContext<'_>, text: &str) -> Self {
        Self::StructuralMismatch {
            rule_index: None,
            rule_name: rule.name,
            pattern: rule.pattern.as_str().to_string(),
            chunk_name: ctx.display_name().to_string(),
            source_text: text.to_string(),
        }
    }

    /// Attach the failing rule's position and the full input text.
    ///
    /// Errors that already carry a position (raised by a nested rewrite) are
    /// returned untouched.
    #[must_use]
    pub fn at_rule(self, index: usize, source: &str) -> Self {
        match self {
            Self::StructuralMismatch {
                rule_index: None,
                rule_name,
                pattern,
                chunk_name,
                ..
            } => Self::StructuralMismatch {
                rule_index: Some(index),
                rule_name,
                pattern,
                chunk_name,
                source_text: source.to_string(),
            },
            other => other,
        }
    }

    /// Name of the rule that failed.
    #[must_use]
    pub const fn rule_name(&self) -> &'static str {
        match self {
            Self::StructuralMismatch { rule_name, .. }
            | Self::InvalidPattern { rule_name, .. }
            | Self::Execution { rule_name, .. } => rule_name,
        }
    }

    /// Pattern of the rule that failed, as written.
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::StructuralMismatch { pattern, .. }
            | Self::InvalidPattern { pattern, .. }
            | Self::Execution { pattern, .. } => pattern,
        }
    }

    /// The text that was being rewritten, for mismatches.
    #[must_use]
    pub fn source_text(&self) -> Option<&str> {
        match self {
            Self::StructuralMismatch { source_text, .. } => Some(source_text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_structural_mismatch(&self) -> bool {
        matches!(self, Self::StructuralMismatch { .. })
    }
}

impl std::fmt::Display for RewriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StructuralMismatch {
                pattern,
                chunk_name,
                ..
            } => write!(f, "{ERROR_PREFIX} \"{pattern}\" not found in {chunk_name}"),
            Self::InvalidPattern {
                rule_name,
                pattern,
                message,
            } => write!(
                f,
                "{ERROR_PREFIX} rule {rule_name} has an invalid pattern \"{pattern}\": {message}"
            ),
            Self::Execution {
                rule_name,
                pattern,
                message,
            } => write!(
                f,
                "{ERROR_PREFIX} rule {rule_name} failed on \"{pattern}\": {message}"
            ),
        }
    }
}

impl std::error::Error for RewriteError {}

/// Run `rule` on `text` and fail if it leaves the text unchanged.
///
/// This is the mandatory-match check on its own, usable outside a rule set.
///
/// # Errors
/// [`RewriteError::StructuralMismatch`] (without a rule index) when nothing
/// changed, or any error from [`Substitution::substitute`].
pub fn assert_matched(
    rule: &Substitution,
    text: &str,
    ctx: &MatchContext<'_>,
) -> Result<String, RewriteError> {
    rule.substitute(text, ctx)?
        .ok_or_else(|| RewriteError::mismatch(rule, ctx, text))
}

/// Apply every rule of `rules` to `source`, in order.
///
/// # Errors
/// Returns the first error raised by a rule. A mandatory substitution that
/// changes nothing yields [`RewriteError::StructuralMismatch`] carrying the
/// rule index, pattern, chunk name and `source`.
#[instrument(skip_all, fields(rule_set = rules.name(), chunk = ctx.display_name(), len = source.len()))]
pub fn apply(rules: &RuleSet, source: &str, ctx: &MatchContext<'_>) -> Result<String, RewriteError> {
    let mut text = source.to_string();

    for (index, rule) in rules.iter().enumerate() {
        match rule {
            Rule::Transform(transform) => {
                text = (transform.apply)(&text, ctx)?;
                trace!(rule = transform.name, "transform applied");
            }
            Rule::Substitute(sub) if sub.mandatory => {
                text = assert_matched(sub, &text, ctx).map_err(|err| {
                    // a nested rewrite that failed has already dumped its own input
                    let raised_here = matches!(
                        err,
                        RewriteError::StructuralMismatch {
                            rule_index: None,
                            ..
                        }
                    );
                    let err = err.at_rule(index, source);
                    if raised_here {
                        error!(
                            target: SOURCE_DUMP_TARGET,
                            rule = sub.name,
                            rule_index = index,
                            "{err}:\n{source}"
                        );
                    }
                    err
                })?;
                debug!(rule = sub.name, "mandatory rule applied");
            }
            Rule::Substitute(sub) => match sub.substitute(&text, ctx)? {
                Some(out) => {
                    text = out;
                    debug!(rule = sub.name, "optional rule applied");
                }
                None => trace!(rule = sub.name, "optional rule did not match"),
            },
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal_rule;
    use crate::rules::{Replacement, Transform};

    fn ctx() -> MatchContext<'static> {
        MatchContext::new(Some("main"))
    }

    fn upper(text: &str, _: &MatchContext<'_>) -> Result<String, RewriteError> {
        Ok(text.to_uppercase())
    }

    #[test]
    fn rules_apply_in_order() {
        let set = RuleSet::new(
            "chain",
            vec![literal_rule!("a-to-b", "a", "b"), literal_rule!("b-to-c", "b", "c")],
        );
        assert_eq!(apply(&set, "a", &ctx()).unwrap(), "c");
    }

    #[test]
    fn mandatory_miss_is_structural_mismatch() {
        let set = RuleSet::new(
            "demo",
            vec![literal_rule!("ok", "x", "y"), literal_rule!("missing", "zzz", "q")],
        );
        let err = apply(&set, "x", &ctx()).unwrap_err();
        match &err {
            RewriteError::StructuralMismatch {
                rule_index,
                rule_name,
                pattern,
                chunk_name,
                source_text,
            } => {
                assert_eq!(*rule_index, Some(1));
                assert_eq!(*rule_name, "missing");
                assert_eq!(pattern, "zzz");
                assert_eq!(chunk_name, "main");
                // The unmodified input, not the partially rewritten text
                assert_eq!(source_text, "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "[ProtectBootstrap] \"zzz\" not found in main");
    }

    #[test]
    fn optional_miss_is_silent() {
        let set = RuleSet::new(
            "demo",
            vec![literal_rule!("absent", "zzz", "q", optional), literal_rule!("ok", "x", "y")],
        );
        assert_eq!(apply(&set, "x", &ctx()).unwrap(), "y");
    }

    #[test]
    fn transform_rule_replaces_text() {
        let set = RuleSet::new(
            "demo",
            vec![
                Transform {
                    name: "upper",
                    apply: upper,
                }
                .into(),
                literal_rule!("ab", "AB", "ab"),
            ],
        );
        assert_eq!(apply(&set, "abc", &ctx()).unwrap(), "abC");
    }

    #[test]
    fn assert_matched_without_rule_set() {
        let rule = Substitution::literal("dp", "Object.defineProperty(", "defineProperty(");
        assert_eq!(
            assert_matched(&rule, "Object.defineProperty(x)", &ctx()).unwrap(),
            "defineProperty(x)"
        );
        let err = assert_matched(&rule, "nothing", &ctx()).unwrap_err();
        assert!(err.is_structural_mismatch());
        assert_eq!(err.rule_name(), "dp");
        assert_eq!(err.source_text(), Some("nothing"));
    }

    #[test]
    fn missing_chunk_name_falls_back() {
        let rule = Substitution::literal("dp", "Object.defineProperty(", "defineProperty(");
        let err = assert_matched(&rule, "", &MatchContext::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[ProtectBootstrap] \"Object.defineProperty(\" not found in bootstrap"
        );
        assert_eq!(MatchContext::new(Some("")).display_name(), "bootstrap");
    }

    #[test]
    fn nested_error_keeps_inner_position() {
        fn nested(_: &crate::rules::MatchGroups<'_>, ctx: &MatchContext<'_>) -> Result<String, RewriteError> {
            let inner = RuleSet::new("inner", vec![literal_rule!("inner-miss", "nope", "")]);
            ctx.rewrite(&inner, "inner text")
        }
        let outer = RuleSet::new(
            "outer",
            vec![
                literal_rule!("first", "x", "y"),
                Substitution::regex("recurse", "y", Replacement::Computed(nested)).into(),
            ],
        );
        let err = apply(&outer, "x", &ctx()).unwrap_err();
        match err {
            RewriteError::StructuralMismatch {
                rule_index,
                rule_name,
                source_text,
                ..
            } => {
                assert_eq!(rule_index, Some(0));
                assert_eq!(rule_name, "inner-miss");
                assert_eq!(source_text, "inner text");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn same_input_same_output() {
        let set = RuleSet::new("demo", vec![literal_rule!("a", "a", "b")]);
        let first = apply(&set, "aaa", &ctx()).unwrap();
        let second = apply(&set, "aaa", &ctx()).unwrap();
        assert_eq!(first, second);
    }
}

//! Hardening rules for the per-module runtime helpers.
//!
//! Applied, in order, to the span of the chunk that holds the module cache,
//! the require function and its runtime helpers:
//! - Null-prototype guard on every object literal
//! - `Symbol.toStringTag` feature test folded to `true`
//! - `Symbol.toStringTag` routed through the cached alias
//! - `Object.defineProperty(` routed through the cached alias
//! - `Object.prototype.hasOwnProperty.call(` routed through `safeCall`
//! - The definition/exports ownership double check reduced to `in`

use std::sync::LazyLock;

use crate::engine::{MatchContext, RewriteError};
use crate::literal_rule;
use crate::rules::{MatchGroups, Replacement, Rule, RuleSet, Substitution};
use crate::runtime_globals::{HAS_OWN_PROPERTY, bindings};

/// Object literal opener and the first non-blank character inside it.
///
/// Group 1 is the opener including the preceding `[`, `(`, `,`, `=` or `:`;
/// group 2 is the first non-blank character inside the braces. Openers that
/// already start with `__proto__:` also match; [`null_proto_entry`] leaves
/// them as they are. The match stops on the first `_` of `__proto__`, so a
/// nested literal in that entry's value is still reached.
pub const OBJECT_LITERAL_PATTERN: &str = r"([\[(,=:]\s*\{)\s*(.)";

/// Rewrites every matched object literal opener to start with `__proto__: null`.
///
/// Blank space between the brace and the first entry is dropped; an empty
/// literal gets no trailing comma. A literal whose first entry is already a
/// `__proto__` key comes back unchanged.
///
/// # Errors
/// Never fails; the signature matches [`crate::rules::ReplaceFn`].
pub fn null_proto_entry(
    groups: &MatchGroups<'_>,
    _ctx: &MatchContext<'_>,
) -> Result<String, RewriteError> {
    let opener = groups.get(1);
    let next = groups.get(2);
    if next == "_" && continues_proto_key(groups.after()) {
        return Ok(groups.whole().to_string());
    }
    let separator = if next == "}" { "" } else { "," };
    Ok(format!("{opener}__proto__: null{separator}{next}"))
}

/// `rest` follows a leading `_`: true if together they spell `__proto__:`
/// (blank space allowed before the colon).
fn continues_proto_key(rest: &str) -> bool {
    rest.strip_prefix("_proto__")
        .is_some_and(|tail| tail.trim_start().starts_with(':'))
}

fn object_literal_guard() -> Rule {
    Substitution::regex(
        "object-literal-guard",
        OBJECT_LITERAL_PATTERN,
        Replacement::Computed(null_proto_entry),
    )
    .into()
}

/// Only the object-literal guard.
pub static OBJECT_LITERAL_RULES: LazyLock<RuleSet> =
    LazyLock::new(|| RuleSet::new("object-literal", vec![object_literal_guard()]));

/// The full per-module hardening set.
pub static BOOTSTRAP_RULES: LazyLock<RuleSet> = LazyLock::new(|| {
    RuleSet::new(
        "bootstrap",
        vec![
            object_literal_guard(),
            literal_rule!(
                "to-string-tag-feature-test",
                "typeof Symbol !== 'undefined' && Symbol.toStringTag",
                "true"
            ),
            literal_rule!(
                "to-string-tag-alias",
                "Symbol.toStringTag",
                bindings::TO_STRING_TAG_SYM
            ),
            literal_rule!(
                "define-property-alias",
                "Object.defineProperty(",
                format!("{}(", bindings::DEFINE_PROPERTY)
            ),
            literal_rule!(
                "has-own-property-safe-call",
                "Object.prototype.hasOwnProperty.call(",
                format!("{}({}, ", bindings::SAFE_CALL, bindings::HAS_OWN_PROPERTY)
            ),
            // both objects are null-prototype by now, so `in` cannot be spoofed
            literal_rule!(
                "redundant-ownership-check",
                format!("{HAS_OWN_PROPERTY}(definition, key) && !{HAS_OWN_PROPERTY}(exports, key)"),
                "!(key in exports)"
            ),
        ],
    )
});

//! Hardening rules for the top-level chunk wrapper.
//!
//! Three steps, in order:
//! 1. `__webpack_modules__[moduleId].call(` goes through `safeCall` (optional:
//!    many builds never emit this call shape).
//! 2. The module registry span (module cache declaration up to the entry
//!    exports declaration) is rewritten. When the bundler emitted discrete
//!    modules, every runtime property read off the require function is pinned
//!    by a guard loop first and the span gets the full bootstrap rule set;
//!    a fully concatenated build only gets the object-literal guard.
//! 3. The exports getter table, the exports object and the modules table get
//!    the null-prototype guard.

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::engine::{MatchContext, RewriteError};
use crate::rules::bootstrap::{BOOTSTRAP_RULES, OBJECT_LITERAL_RULES, null_proto_entry};
use crate::rules::regex_engine::CompiledRegex;
use crate::rules::{MatchGroups, Replacement, Rule, RuleSet, Substitution};
use crate::runtime_globals::{
    DEFINE_PROPERTY_GETTERS, EXPORTS, MODULE_CACHE, MODULES, REQUIRE, bindings,
};

const REGISTRY_RULE: &str = "module-registry";

/// How the bundler laid out the modules of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeLayout {
    /// Every module was concatenated into one scope; the registry variable is
    /// the require function's own property bag.
    Concatenated,
    /// Modules are separate factories resolved through the module cache.
    Modular,
}

impl RuntimeLayout {
    /// Classify by the identifier declared as the registry (`var <id> = {};`).
    #[must_use]
    pub fn from_registry_holder(holder: &str) -> Self {
        if holder == REQUIRE {
            Self::Concatenated
        } else {
            Self::Modular
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Concatenated => "concatenated",
            Self::Modular => "modular",
        }
    }
}

fn registry_pattern() -> String {
    format!(
        r"(?s)var ({}|{}) = \{{\}};.*?var {} =",
        regex::escape(MODULE_CACHE),
        regex::escape(REQUIRE),
        regex::escape(EXPORTS),
    )
}

static REGISTRY: LazyLock<CompiledRegex> = LazyLock::new(|| {
    CompiledRegex::new(&registry_pattern()).expect("module registry regex compiles")
});

static REQUIRE_PROPERTY: LazyLock<CompiledRegex> = LazyLock::new(|| {
    CompiledRegex::new(&format!(r"\b{}\.(\w+)", regex::escape(REQUIRE)))
        .expect("require property regex compiles")
});

/// Detect the layout of a whole chunk without rewriting it.
///
/// Returns `None` when the chunk has no recognizable module registry.
#[must_use]
pub fn detect_layout(chunk: &str) -> Option<RuntimeLayout> {
    // linear pattern: the scan itself cannot fail
    let (start, end) = REGISTRY.find(chunk).ok().flatten()?;
    let holder = chunk[start..end]
        .strip_prefix("var ")
        .and_then(|rest| rest.split(' ').next())?;
    Some(RuntimeLayout::from_registry_holder(holder))
}

/// Runtime properties read off the require function in `span`, in order of
/// first appearance, without duplicates.
///
/// # Errors
/// Only if the regex engine aborts.
pub fn require_properties(span: &str) -> Result<Vec<&str>, RewriteError> {
    let found = REQUIRE_PROPERTY
        .group_values(span, 1)
        .map_err(|message| RewriteError::Execution {
            rule_name: REGISTRY_RULE,
            pattern: REQUIRE_PROPERTY.as_str().to_string(),
            message,
        })?;
    let mut seen = HashSet::with_capacity(found.len());
    Ok(found.into_iter().filter(|name| seen.insert(*name)).collect())
}

/// The loop that pins `names` on the require function as fixed,
/// non-enumerable, null-prototype-described properties.
#[must_use]
pub fn guard_loop(names: &[&str]) -> String {
    let list = serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string());
    format!(
        "for (let i = 0, props={list}; i < props.length; i++)\n  {}({REQUIRE}, props[i], {{__proto__: null, value: 0, writable: 1}});\n",
        bindings::DEFINE_PROPERTY,
    )
}

fn harden_registry(groups: &MatchGroups<'_>, ctx: &MatchContext<'_>) -> Result<String, RewriteError> {
    let span = groups.whole();
    let layout = RuntimeLayout::from_registry_holder(groups.get(1));

    let guard = match layout {
        RuntimeLayout::Concatenated => None,
        RuntimeLayout::Modular => {
            let names = require_properties(span)?;
            (!names.is_empty()).then(|| guard_loop(&names))
        }
    };
    tracing::debug!(
        layout = layout.label(),
        guarded = guard.is_some(),
        "module registry located"
    );

    let rules: &RuleSet = if guard.is_some() {
        &BOOTSTRAP_RULES
    } else {
        &OBJECT_LITERAL_RULES
    };
    let mut out = guard.unwrap_or_default();
    out.push_str(&ctx.rewrite(rules, span)?);
    Ok(out)
}

fn literal_sites_pattern() -> String {
    let sites = [
        format!(
            r"{}\({}, \{{",
            regex::escape(DEFINE_PROPERTY_GETTERS),
            regex::escape(EXPORTS)
        ),
        format!(r"var {} = \{{", regex::escape(EXPORTS)),
        format!(r"var {} = \(\{{", regex::escape(MODULES)),
    ];
    format!(r"({})\s*(.)", sites.join("|"))
}

/// The top-level chunk hardening set.
pub static MAIN_RULES: LazyLock<RuleSet> = LazyLock::new(|| {
    let rules: Vec<Rule> = vec![
        Substitution::regex(
            "safe-module-call",
            format!(r"({}\[moduleId\])\.call\(", regex::escape(MODULES)),
            Replacement::Template(format!("{}($1, ", bindings::SAFE_CALL).into()),
        )
        .optional()
        .into(),
        Substitution::regex(
            REGISTRY_RULE,
            registry_pattern(),
            Replacement::Computed(harden_registry),
        )
        .first_only()
        .into(),
        Substitution::regex(
            "exports-literal-guard",
            literal_sites_pattern(),
            Replacement::Computed(null_proto_entry),
        )
        .into(),
    ];
    RuleSet::new("main", rules)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_from_holder() {
        assert_eq!(
            RuntimeLayout::from_registry_holder("__webpack_require__"),
            RuntimeLayout::Concatenated
        );
        assert_eq!(
            RuntimeLayout::from_registry_holder("__webpack_module_cache__"),
            RuntimeLayout::Modular
        );
    }

    #[test]
    fn detect_layout_in_chunk() {
        let modular = "var __webpack_module_cache__ = {};\nfoo();\nvar __webpack_exports__ = {};";
        let concatenated = "var __webpack_require__ = {};\nvar __webpack_exports__ = {};";
        assert_eq!(detect_layout(modular), Some(RuntimeLayout::Modular));
        assert_eq!(detect_layout(concatenated), Some(RuntimeLayout::Concatenated));
        assert_eq!(detect_layout("console.log(1)"), None);
    }

    #[test]
    fn require_properties_dedupe_in_order() {
        let span = "__webpack_require__.o(a); __webpack_require__.m = x; \
                    __webpack_require__.o(b); my__webpack_require__.z; (__webpack_require__.nmd)";
        assert_eq!(require_properties(span).unwrap(), vec!["o", "m", "nmd"]);
    }

    #[test]
    fn guard_loop_text() {
        assert_eq!(
            guard_loop(&["m", "o"]),
            "for (let i = 0, props=[\"m\",\"o\"]; i < props.length; i++)\n  \
             defineProperty(__webpack_require__, props[i], {__proto__: null, value: 0, writable: 1});\n"
        );
    }

    #[test]
    fn main_rule_flags() {
        let flags: Vec<_> = MAIN_RULES
            .iter()
            .map(|rule| (rule.name(), rule.is_mandatory()))
            .collect();
        assert_eq!(
            flags,
            [
                ("safe-module-call", false),
                ("module-registry", true),
                ("exports-literal-guard", true),
            ]
        );
    }

    #[test]
    fn exports_guard_leaves_guarded_sites() {
        let Some(Rule::Substitute(sub)) = MAIN_RULES.get("exports-literal-guard") else {
            panic!("exports-literal-guard missing");
        };
        let ctx = MatchContext::new(Some("main"));
        assert_eq!(
            sub.substitute("var __webpack_exports__ = { __proto__: null, a };", &ctx).unwrap(),
            None
        );
        assert_eq!(
            sub.substitute("var __webpack_exports__ = {};", &ctx).unwrap().as_deref(),
            Some("var __webpack_exports__ = {__proto__: null};")
        );
    }

    #[test]
    fn registry_rule_only_rewrites_first_span() {
        match MAIN_RULES.get(REGISTRY_RULE) {
            Some(Rule::Substitute(sub)) => {
                assert_eq!(sub.scope, crate::rules::ReplaceScope::First);
            }
            other => panic!("unexpected rule: {other:?}"),
        }
    }
}

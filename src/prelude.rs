//! Declarations of the safe bindings referenced by rewritten code.
//!
//! The rewritten bootstrap calls `defineProperty`, `safeCall`,
//! `hasOwnProperty` and `toStringTagSym` by name. Normally a wrapper step of
//! the build declares them around the chunk; [`with_prelude`] does the same
//! for callers that have no such step.

use memchr::memmem;

use crate::runtime_globals::bindings;

/// Declaration text for all four bindings, captured before any user code runs.
pub const SAFE_BINDINGS: &str = "\
const toStringTagSym = Symbol.toStringTag;
const defineProperty = Object.defineProperty;
const hasOwnProperty = Object.prototype.hasOwnProperty;
const safeCall = Function.prototype.call.bind(Function.prototype.call);
";

/// Prepend [`SAFE_BINDINGS`] to `source`.
#[must_use]
pub fn with_prelude(source: &str) -> String {
    let mut out = String::with_capacity(SAFE_BINDINGS.len() + source.len());
    out.push_str(SAFE_BINDINGS);
    out.push_str(source);
    out
}

/// Binding names that never appear in `text`.
///
/// A rewritten chunk referencing a binding its build never declares fails at
/// load time; this lets tooling warn ahead of that. Purely advisory.
#[must_use]
pub fn missing_bindings(text: &str) -> Vec<&'static str> {
    bindings::ALL
        .into_iter()
        .filter(|name| memmem::find(text.as_bytes(), name.as_bytes()).is_none())
        .collect()
}

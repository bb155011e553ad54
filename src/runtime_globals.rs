//! Names emitted by the bundler runtime that the rewrite rules target.
//!
//! These mirror the bundler's own runtime-global table. The rules embed them
//! into their patterns, so a rename on the bundler side surfaces as a
//! structural mismatch rather than a silently skipped rewrite.

/// The module-require function (`__webpack_require__`).
pub const REQUIRE: &str = "__webpack_require__";

/// The exports object of the entry module.
pub const EXPORTS: &str = "__webpack_exports__";

/// Runtime shorthand for an own-property check (`__webpack_require__.o`).
pub const HAS_OWN_PROPERTY: &str = "__webpack_require__.o";

/// Runtime helper that installs export getters (`__webpack_require__.d`).
pub const DEFINE_PROPERTY_GETTERS: &str = "__webpack_require__.d";

/// Variable holding already-instantiated modules.
pub const MODULE_CACHE: &str = "__webpack_module_cache__";

/// Variable holding the module factory table.
pub const MODULES: &str = "__webpack_modules__";

/// Bindings the rewritten code expects to find in its enclosing scope.
///
/// They are declared by a separate code-generation step (see
/// [`crate::prelude`]); the rules only reference them by name.
pub mod bindings {
    /// Cached `Symbol.toStringTag`.
    pub const TO_STRING_TAG_SYM: &str = "toStringTagSym";
    /// Cached `Object.defineProperty`.
    pub const DEFINE_PROPERTY: &str = "defineProperty";
    /// Cached `Object.prototype.hasOwnProperty`.
    pub const HAS_OWN_PROPERTY: &str = "hasOwnProperty";
    /// `Function.prototype.call` bound to itself.
    pub const SAFE_CALL: &str = "safeCall";

    /// All four names, in declaration order.
    pub const ALL: [&str; 4] = [TO_STRING_TAG_SYM, DEFINE_PROPERTY, HAS_OWN_PROPERTY, SAFE_CALL];
}

//! Dual regex engine used by the rewrite rules.
//!
//! Rule patterns compile on the linear-time `regex` crate unless they use
//! lookaround or backreferences, which only the backtracking `fancy_regex`
//! engine supports. [`CompiledRegex`] picks the engine from the pattern syntax
//! so rule declarations never have to care. The backtracking engine gives up
//! after a fixed step budget on large inputs, so the shipped rule sets keep
//! to linear syntax and express "not followed by" checks in their computed
//! replacements (see [`MatchGroups::after`]).
//!
//! Literal rules are escaped with [`regex::escape`] and always run on the
//! linear engine; a `memchr` pre-check skips the regex entirely when the
//! literal is absent from the text.

use std::borrow::Cow;
use std::sync::OnceLock;

use memchr::memmem;
use smallvec::SmallVec;

/// A compiled regex that auto-selects between linear-time and backtracking engines.
#[derive(Debug)]
pub enum CompiledRegex {
    /// Linear-time regex (O(n) guaranteed, no backtracking).
    Linear(regex::Regex),
    /// Backtracking regex (supports lookahead/lookbehind).
    Backtracking(fancy_regex::Regex),
}

impl CompiledRegex {
    /// Compile a pattern, auto-selecting the appropriate engine.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new(pattern: &str) -> Result<Self, String> {
        if needs_backtracking_engine(pattern) {
            Self::new_backtracking(pattern)
        } else {
            Self::new_linear(pattern)
        }
    }

    /// Compile a pattern using the linear-time engine only.
    ///
    /// # Errors
    /// Returns an error if the pattern uses features not supported by the
    /// linear-time engine (lookahead, lookbehind, backreferences).
    pub fn new_linear(pattern: &str) -> Result<Self, String> {
        regex::Regex::new(pattern)
            .map(Self::Linear)
            .map_err(|e| format!("regex compile error: {e}"))
    }

    /// Compile a pattern using the backtracking engine.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new_backtracking(pattern: &str) -> Result<Self, String> {
        fancy_regex::Regex::new(pattern)
            .map(Self::Backtracking)
            .map_err(|e| format!("fancy_regex compile error: {e}"))
    }

    /// Compile a literal string so that every character matches itself.
    ///
    /// # Errors
    /// Never fails in practice; escaped input is always a valid pattern.
    pub fn literal(text: &str) -> Result<Self, String> {
        Self::new_linear(&regex::escape(text))
    }

    /// Find the first match in the text as `(start, end)` byte offsets.
    ///
    /// # Errors
    /// Returns an error if the backtracking engine aborts mid-scan.
    pub fn find(&self, text: &str) -> Result<Option<(usize, usize)>, String> {
        match self {
            Self::Linear(re) => Ok(re.find(text).map(|m| (m.start(), m.end()))),
            Self::Backtracking(re) => re
                .find(text)
                .map(|found| found.map(|m| (m.start(), m.end())))
                .map_err(|e| format!("fancy_regex execution error: {e}")),
        }
    }

    /// Get the pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Linear(re) => re.as_str(),
            Self::Backtracking(re) => re.as_str(),
        }
    }

    /// Collect capture group `group` of every non-overlapping match, in order.
    ///
    /// Matches where the group did not participate are skipped.
    ///
    /// # Errors
    /// Returns an error if the backtracking engine aborts (e.g. backtrack limit).
    pub fn group_values<'t>(&self, text: &'t str, group: usize) -> Result<Vec<&'t str>, String> {
        match self {
            Self::Linear(re) => Ok(re
                .captures_iter(text)
                .filter_map(|caps| caps.get(group).map(|m| m.as_str()))
                .collect()),
            Self::Backtracking(re) => {
                let mut values = Vec::new();
                for caps in re.captures_iter(text) {
                    let caps = caps.map_err(|e| format!("fancy_regex execution error: {e}"))?;
                    if let Some(m) = caps.get(group) {
                        values.push(m.as_str());
                    }
                }
                Ok(values)
            }
        }
    }

    /// Replace up to `limit` matches (0 = all), computing each replacement
    /// from the match's capture groups.
    ///
    /// Returns a `Cow::Borrowed` if nothing matched.
    ///
    /// # Errors
    /// Returns an error if the backtracking engine aborts mid-scan. The linear
    /// engine cannot fail.
    pub fn replace_with<'t, F>(
        &self,
        text: &'t str,
        limit: usize,
        mut replacer: F,
    ) -> Result<Cow<'t, str>, String>
    where
        F: FnMut(&MatchGroups<'_>) -> String,
    {
        match self {
            Self::Linear(re) => Ok(re.replacen(text, limit, |caps: &regex::Captures<'_>| {
                let spans = caps.iter().map(|m| m.map(|m| (m.start(), m.end())));
                replacer(&MatchGroups::from_spans(text, spans))
            })),
            Self::Backtracking(re) => re
                .try_replacen(text, limit, |caps: &fancy_regex::Captures<'_>| {
                    let spans = caps.iter().map(|m| m.map(|m| (m.start(), m.end())));
                    replacer(&MatchGroups::from_spans(text, spans))
                })
                .map_err(|e| format!("fancy_regex execution error: {e}")),
        }
    }
}

/// Check if a pattern requires the backtracking engine.
///
/// Returns `true` if the pattern contains features not supported by the
/// linear-time `regex` crate:
/// - Lookahead: `(?=...)`, `(?!...)`
/// - Lookbehind: `(?<=...)`, `(?<!...)`
/// - Atomic groups and possessive quantifiers
/// - Backreferences: `\1`, `\2`, etc.
///
/// This is a syntactic heuristic. False positives only cost speed.
#[must_use]
pub fn needs_backtracking_engine(pattern: &str) -> bool {
    const LOOKAROUND: [&str; 5] = ["(?=", "(?!", "(?<=", "(?<!", "(?>"];
    const POSSESSIVE: [&str; 4] = ["*+", "++", "?+", "}+"];

    if LOOKAROUND.iter().any(|marker| pattern.contains(marker))
        || POSSESSIVE.iter().any(|marker| pattern.contains(marker))
    {
        return true;
    }

    pattern
        .as_bytes()
        .windows(2)
        .any(|pair| pair[0] == b'\\' && pair[1].is_ascii_digit() && pair[1] != b'0')
}

// ============================================================================
// Match Groups
// ============================================================================

/// Engine-neutral view of one match's capture groups.
///
/// Index 0 is the whole match. Groups that did not participate are `None`.
/// The text following the match is kept too, for replacements that must
/// look past what the pattern consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroups<'t> {
    groups: SmallVec<[Option<&'t str>; 4]>,
    after: &'t str,
}

impl<'t> FromIterator<Option<&'t str>> for MatchGroups<'t> {
    fn from_iter<I: IntoIterator<Item = Option<&'t str>>>(groups: I) -> Self {
        Self {
            groups: groups.into_iter().collect(),
            after: "",
        }
    }
}

impl<'t> MatchGroups<'t> {
    /// Groups from `(start, end)` byte spans into `haystack`; span 0 is the
    /// whole match.
    fn from_spans<I>(haystack: &'t str, spans: I) -> Self
    where
        I: IntoIterator<Item = Option<(usize, usize)>>,
    {
        let mut end = haystack.len();
        let groups = spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                span.map(|(start, stop)| {
                    if index == 0 {
                        end = stop;
                    }
                    &haystack[start..stop]
                })
            })
            .collect();
        Self {
            groups,
            after: &haystack[end..],
        }
    }

    /// Set the text following the match.
    #[must_use]
    pub fn followed_by(mut self, after: &'t str) -> Self {
        self.after = after;
        self
    }

    /// Everything in the scanned text after the whole match.
    #[must_use]
    pub const fn after(&self) -> &'t str {
        self.after
    }

    /// The whole matched text.
    #[must_use]
    pub fn whole(&self) -> &'t str {
        self.get(0)
    }

    /// Capture group `index`, or `""` if it did not participate.
    #[must_use]
    pub fn get(&self, index: usize) -> &'t str {
        self.groups.get(index).copied().flatten().unwrap_or("")
    }

    /// Number of groups including the whole match.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True if there are no groups at all (never the case for a real match).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Expand a replacement template.
    ///
    /// Follows the JavaScript `String.prototype.replace` conventions the
    /// rules were written against: `$$` is a literal `$`, `$&` is the whole
    /// match, `$1`..`$99` are capture groups (two digits win when that group
    /// exists). Anything else after `$` is kept verbatim.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + self.whole().len());
        let mut rest = template;

        while let Some(pos) = memchr::memchr(b'$', rest.as_bytes()) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            let (expansion, consumed) = self.expand_token(tail);
            match expansion {
                Some(text) => out.push_str(text),
                None => out.push('$'),
            }
            rest = &tail[consumed..];
        }
        out.push_str(rest);
        out
    }

    /// Resolve the token following a `$`. Returns the expansion (or `None`
    /// for a literal `$`) and the number of bytes consumed after the `$`.
    fn expand_token(&self, tail: &str) -> (Option<&'t str>, usize) {
        let bytes = tail.as_bytes();
        match bytes.first() {
            Some(b'$') => (Some("$"), 1),
            Some(b'&') => (Some(self.whole()), 1),
            Some(d) if d.is_ascii_digit() => {
                let first = usize::from(d - b'0');
                if let Some(d2) = bytes.get(1).filter(|b| b.is_ascii_digit()) {
                    let two = first * 10 + usize::from(d2 - b'0');
                    if two > 0 && two < self.len() {
                        return (Some(self.get(two)), 2);
                    }
                }
                if first > 0 && first < self.len() {
                    (Some(self.get(first)), 1)
                } else {
                    (None, 0)
                }
            }
            _ => (None, 0),
        }
    }
}

// ============================================================================
// Lazy Regex Primitive
// ============================================================================

/// A lazily-compiled rule pattern.
///
/// Rule sets are declared once at start-up; compilation is deferred to the
/// first rewrite and then shared by every later one. Unlike a fail-open
/// matcher, a compile error is kept and reported on every use: a rule that
/// cannot run must stop the build.
#[derive(Debug)]
pub struct LazyCompiledRegex {
    pattern: PatternText,
    kind: PatternKind,
    compiled: OnceLock<Result<CompiledRegex, String>>,
}

#[derive(Debug)]
enum PatternText {
    Static(&'static str),
    Owned(String),
}

impl PatternText {
    fn as_str(&self) -> &str {
        match self {
            Self::Static(pattern) => pattern,
            Self::Owned(pattern) => pattern.as_str(),
        }
    }
}

/// How the stored text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Regular expression syntax.
    Regex,
    /// Exact text; every character is escaped before compilation.
    Literal,
}

impl LazyCompiledRegex {
    /// Create a lazy regex from a static pattern. Performs no compilation.
    #[must_use]
    pub const fn new(pattern: &'static str) -> Self {
        Self {
            pattern: PatternText::Static(pattern),
            kind: PatternKind::Regex,
            compiled: OnceLock::new(),
        }
    }

    /// Create a lazy regex from a pattern assembled at runtime.
    #[must_use]
    pub fn new_owned(pattern: String) -> Self {
        Self {
            pattern: PatternText::Owned(pattern),
            kind: PatternKind::Regex,
            compiled: OnceLock::new(),
        }
    }

    /// Create a lazy matcher for exact static text.
    #[must_use]
    pub const fn literal(text: &'static str) -> Self {
        Self {
            pattern: PatternText::Static(text),
            kind: PatternKind::Literal,
            compiled: OnceLock::new(),
        }
    }

    /// Create a lazy matcher for exact text assembled at runtime.
    #[must_use]
    pub fn literal_owned(text: String) -> Self {
        Self {
            pattern: PatternText::Owned(text),
            kind: PatternKind::Literal,
            compiled: OnceLock::new(),
        }
    }

    /// Get or compile the regex.
    ///
    /// # Errors
    /// Returns the compile error message (the same one on every call).
    pub fn compiled(&self) -> Result<&CompiledRegex, &str> {
        self.compiled
            .get_or_init(|| match self.kind {
                PatternKind::Regex => CompiledRegex::new(self.pattern.as_str()),
                PatternKind::Literal => CompiledRegex::literal(self.pattern.as_str()),
            })
            .as_ref()
            .map_err(String::as_str)
    }

    /// Cheap pre-check: `false` means the pattern certainly cannot match.
    ///
    /// Only literal patterns can be rejected without running the regex.
    #[must_use]
    pub fn might_match(&self, haystack: &str) -> bool {
        match self.kind {
            PatternKind::Literal => {
                memmem::find(haystack.as_bytes(), self.pattern.as_str().as_bytes()).is_some()
            }
            PatternKind::Regex => true,
        }
    }

    /// The pattern as written in the rule (unescaped for literals).
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Whether the pattern is literal text or a regex.
    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        self.kind
    }
}

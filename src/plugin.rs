//! Attaches the rewrite engine to a build tool's "render main chunk" event.
//!
//! The host side is modelled by [`RenderMainHook`]: something that accepts
//! named callbacks and, when a chunk is rendered, threads the generated source
//! through them. [`RenderMainHooks`] is a synchronous waterfall implementation
//! of that surface, used by the CLI and the stdin hook protocol.
//!
//! [`ProtectBootstrapPlugin`] registers one callback that runs
//! [`MAIN_RULES`](crate::rules::main_chunk::MAIN_RULES). Any error aborts the
//! render unchanged: an un-hardened bootstrap must never be emitted.

use std::time::Instant;

use tracing::{debug, instrument};

use crate::engine::{self, MatchContext, RewriteError};
use crate::prelude;
use crate::rules::main_chunk::MAIN_RULES;

/// Metadata the host supplies with each chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Display name of the chunk (e.g. `main`), if it has one.
    pub name: Option<String>,
}

impl ChunkInfo {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// Context handed to the rules for this chunk.
    #[must_use]
    pub fn context(&self) -> MatchContext<'_> {
        MatchContext::new(self.name.as_deref())
    }
}

/// A render-main callback: takes the current source, returns the source to emit.
pub type RenderMainFn = Box<dyn Fn(&str, &ChunkInfo) -> Result<String, RewriteError> + Send + Sync>;

/// Host-side registration surface for the render-main event.
pub trait RenderMainHook {
    /// Register `callback` under `name`.
    fn tap(&mut self, name: &'static str, callback: RenderMainFn);
}

/// Synchronous waterfall hook: each tap receives the previous tap's output.
#[derive(Default)]
pub struct RenderMainHooks {
    taps: Vec<(&'static str, RenderMainFn)>,
}

impl std::fmt::Debug for RenderMainHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderMainHooks")
            .field("taps", &self.tap_names())
            .finish()
    }
}

impl RenderMainHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the registered taps, in call order.
    #[must_use]
    pub fn tap_names(&self) -> Vec<&'static str> {
        self.taps.iter().map(|(name, _)| *name).collect()
    }

    /// Fire the event for one chunk.
    ///
    /// # Errors
    /// The first tap error, unchanged; later taps do not run.
    pub fn call(&self, source: &str, chunk: &ChunkInfo) -> Result<String, RewriteError> {
        let mut current = source.to_string();
        for (name, callback) in &self.taps {
            debug!(tap = name, "render main");
            current = callback(&current, chunk)?;
        }
        Ok(current)
    }
}

impl RenderMainHook for RenderMainHooks {
    fn tap(&mut self, name: &'static str, callback: RenderMainFn) {
        self.taps.push((name, callback));
    }
}

/// Result details of one successful chunk rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub elapsed_us: u64,
}

impl RewriteReport {
    /// Run `rewrite` over `source` and record sizes and wall time.
    ///
    /// # Errors
    /// Whatever `rewrite` returns.
    pub fn measure<F>(source: &str, rewrite: F) -> Result<(String, Self), RewriteError>
    where
        F: FnOnce(&str) -> Result<String, RewriteError>,
    {
        let started = Instant::now();
        let output = rewrite(source)?;
        let report = Self {
            input_bytes: source.len(),
            output_bytes: output.len(),
            elapsed_us: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        };
        Ok((output, report))
    }
}

/// Hardens the main chunk's bootstrap against prototype pollution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectBootstrapPlugin {
    prelude: bool,
}

impl ProtectBootstrapPlugin {
    pub const NAME: &'static str = "ProtectBootstrapPlugin";

    #[must_use]
    pub const fn new() -> Self {
        Self { prelude: false }
    }

    /// Also prepend the safe-binding declarations to each rewritten chunk.
    #[must_use]
    pub const fn with_prelude(mut self, prelude: bool) -> Self {
        self.prelude = prelude;
        self
    }

    /// Register on the host's render-main event.
    pub fn apply<H: RenderMainHook + ?Sized>(&self, hooks: &mut H) {
        let plugin = *self;
        hooks.tap(
            Self::NAME,
            Box::new(move |source: &str, chunk: &ChunkInfo| plugin.render_main(source, chunk)),
        );
    }

    /// Rewrite one main chunk.
    ///
    /// Empty input is returned as is.
    ///
    /// # Errors
    /// Whatever the rewrite engine raises.
    #[instrument(skip(self, source), fields(chunk = chunk.context().display_name(), len = source.len()))]
    pub fn render_main(&self, source: &str, chunk: &ChunkInfo) -> Result<String, RewriteError> {
        if source.is_empty() {
            return Ok(String::new());
        }
        let rewritten = engine::apply(&MAIN_RULES, source, &chunk.context())?;
        Ok(if self.prelude {
            prelude::with_prelude(&rewritten)
        } else {
            rewritten
        })
    }

    /// [`Self::render_main`] plus size and timing figures.
    ///
    /// # Errors
    /// Whatever the rewrite engine raises.
    pub fn render_main_timed(
        &self,
        source: &str,
        chunk: &ChunkInfo,
    ) -> Result<(String, RewriteReport), RewriteError> {
        RewriteReport::measure(source, |source| self.render_main(source, chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(source: &str, _chunk: &ChunkInfo) -> Result<String, RewriteError> {
        Ok(format!("{source}/*stamped*/"))
    }

    #[test]
    fn waterfall_threads_output() {
        let mut hooks = RenderMainHooks::new();
        hooks.tap("one", Box::new(stamp));
        hooks.tap(
            "two",
            Box::new(|source: &str, _: &ChunkInfo| -> Result<String, RewriteError> {
                Ok(source.replace("stamped", "twice"))
            }),
        );
        assert_eq!(hooks.tap_names(), ["one", "two"]);
        assert_eq!(
            hooks.call("x", &ChunkInfo::default()).unwrap(),
            "x/*twice*/"
        );
    }

    #[test]
    fn waterfall_stops_on_error() {
        let mut hooks = RenderMainHooks::new();
        ProtectBootstrapPlugin::new().apply(&mut hooks);
        hooks.tap(
            "never",
            Box::new(|_: &str, _: &ChunkInfo| -> Result<String, RewriteError> {
                panic!("must not run after a failure")
            }),
        );
        let err = hooks
            .call("console.log('no runtime here')", &ChunkInfo::named("app"))
            .unwrap_err();
        assert!(err.is_structural_mismatch());
        assert!(err.to_string().ends_with("not found in app"));
    }

    #[test]
    fn measure_reports_sizes() {
        let (output, report) =
            RewriteReport::measure("abc", |text| stamp(text, &ChunkInfo::default())).unwrap();
        assert_eq!(output, "abc/*stamped*/");
        assert_eq!(report.input_bytes, 3);
        assert_eq!(report.output_bytes, output.len());
    }

    #[test]
    fn timed_render_keeps_render_errors() {
        let plugin = ProtectBootstrapPlugin::new();
        let err = plugin
            .render_main_timed("var __webpack_exports__ = {};", &ChunkInfo::named("main"))
            .unwrap_err();
        assert!(err.is_structural_mismatch());
        assert_eq!(err.rule_name(), "module-registry");
    }

    #[test]
    fn empty_source_passes_through() {
        let plugin = ProtectBootstrapPlugin::new();
        assert_eq!(plugin.render_main("", &ChunkInfo::default()).unwrap(), "");
    }

    #[test]
    fn chunk_context_name() {
        assert_eq!(ChunkInfo::named("main").context().display_name(), "main");
        assert_eq!(ChunkInfo::default().context().display_name(), "bootstrap");
    }
}

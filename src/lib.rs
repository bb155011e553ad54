#![forbid(unsafe_code)]
//! Bootstrap pollution guard (bpg) library.
//!
//! Hardens the runtime ("bootstrap") code a module bundler writes into its
//! main chunk against prototype pollution, by rewriting the generated text
//! before it is emitted. Rewriting is pattern based: an ordered list of
//! literal, regex and computed rules, some of which must match. A chunk that
//! does not have the expected shape is refused rather than emitted half
//! hardened.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Configuration                             │
//! │  (env vars → --config → project → user → system → defaults)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Hook protocol (stdin JSON) / CLI (rewrite, check)         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │             Plugin: render-main waterfall hook                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Rewrite engine                              │
//! │   MAIN rules ──(module registry span)──▶ BOOTSTRAP rules         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bootstrap_pollution_guard::plugin::{ChunkInfo, ProtectBootstrapPlugin};
//!
//! let plugin = ProtectBootstrapPlugin::new();
//! match plugin.render_main(&bundle, &ChunkInfo::named("main")) {
//!     Ok(hardened) => emit(hardened),
//!     Err(err) => fail_build(err),
//! }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod hook;
pub mod logging;
pub mod plugin;
pub mod prelude;
pub mod rules;
pub mod runtime_globals;

// Re-export commonly used types
pub use config::Config;
pub use engine::{MatchContext, RewriteError, apply, assert_matched};
pub use plugin::{ChunkInfo, ProtectBootstrapPlugin, RenderMainHook, RenderMainHooks};
pub use rules::bootstrap::BOOTSTRAP_RULES;
pub use rules::main_chunk::MAIN_RULES;
pub use rules::{Replacement, Rule, RuleSet, Substitution, Transform};

// Re-export dual regex engine abstraction
pub use rules::regex_engine::{CompiledRegex, needs_backtracking_engine};

#![forbid(unsafe_code)]
//! bpg: bootstrap pollution guard.
//!
//! Rewrites webpack's main-chunk runtime so it cannot be subverted through a
//! polluted `Object.prototype`.
//!
//! Exit behavior:
//!   - Exit 0 with `{"source": ...}` on stdout = chunk hardened
//!   - Exit 1 with `{"error": ...}` on stdout = chunk refused, build must stop
//!   - Exit 2 = unreadable input or bad invocation

use bootstrap_pollution_guard::cli::{self, Cli};
use bootstrap_pollution_guard::config::Config;
use bootstrap_pollution_guard::engine::SOURCE_DUMP_TARGET;
use bootstrap_pollution_guard::hook;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Build metadata from vergen (set by build.rs)
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");
const GIT_SHA: Option<&str> = option_env!("VERGEN_GIT_SHA");
const RUSTC_SEMVER: Option<&str> = option_env!("VERGEN_RUSTC_SEMVER");
const CARGO_TARGET: Option<&str> = option_env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Print version information.
fn print_version() {
    eprintln!("{} {}", "bpg".cyan().bold(), format!("v{PKG_VERSION}").white().bold());
    eprintln!("{}", "Bootstrap pollution guard for webpack output".bright_black());

    let details = [
        ("Built:", BUILD_TIMESTAMP.map(|ts| ts.split('T').next().unwrap_or(ts))),
        ("Commit:", GIT_SHA.map(|sha| sha.get(..12).unwrap_or(sha))),
        ("Rustc:", RUSTC_SEMVER),
        ("Target:", CARGO_TARGET),
    ];
    for (label, value) in details {
        if let Some(value) = value {
            eprintln!("  {} {}", label.bright_black(), value.white());
        }
    }
}

/// Diagnostics go to stderr; stdout carries the hook protocol.
fn init_tracing(config: &Config) {
    let default_level = if config.general.verbose { "debug" } else { "warn" };
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if !config.rewrite.dump_source {
        if let Ok(directive) = format!("{SOURCE_DUMP_TARGET}=off").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() {
    // --version before clap so the build metadata is shown
    let args: Vec<String> = std::env::args().collect();
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-V") {
        hook::configure_colors();
        print_version();
        return;
    }

    // Parse failures exit instead of falling into hook mode and blocking on stdin.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let config = match cli::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    hook::apply_color_mode(&config.general.color);
    init_tracing(&config);

    if cli.command.is_some() {
        if let Err(e) = cli::run_command(cli, &config) {
            eprintln!("{} {e}", "Error:".red().bold());
            std::process::exit(1);
        }
        return;
    }

    std::process::exit(hook::run(&config));
}

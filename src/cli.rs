//! CLI argument parsing and command handling.
//!
//! Without a subcommand `bpg` speaks the stdin hook protocol (see
//! [`crate::hook`]); the subcommands work on bundle files directly.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::config::Config;
use crate::logging::RewriteLogger;
use crate::plugin::{ChunkInfo, ProtectBootstrapPlugin};
use crate::prelude;
use crate::rules::bootstrap::BOOTSTRAP_RULES;
use crate::rules::main_chunk::{MAIN_RULES, detect_layout};
use crate::rules::{PatternKind, Replacement, Rule, RuleSet};

/// Hardens webpack bootstrap output against prototype pollution.
///
/// bpg rewrites the runtime code webpack emits into the main chunk so that
/// module registries, export tables and runtime helpers cannot be reached
/// through a polluted `Object.prototype`. It refuses to emit a chunk whose
/// shape it does not recognize.
#[derive(Parser, Debug)]
#[command(name = "bpg")]
#[command(version, about, long_about = None)]
#[command(after_help = "Run 'bpg check <bundle.js>' to verify a bundle can be hardened.")]
pub struct Cli {
    /// Config file layered over the implicit ones
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite a generated main chunk
    #[command(name = "rewrite")]
    Rewrite {
        /// Bundle file to harden
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(long, short, conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the input file
        #[arg(long)]
        in_place: bool,

        /// Chunk name used in diagnostics
        #[arg(long)]
        chunk_name: Option<String>,

        /// Prepend declarations of the safe bindings
        #[arg(long)]
        prelude: bool,
    },

    /// Dry-run the main rule set over bundle files
    #[command(name = "check")]
    Check {
        /// Bundle files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Chunk name used in diagnostics
        #[arg(long)]
        chunk_name: Option<String>,

        /// Output format (pretty or json)
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// List the rules in application order
    #[command(name = "rules")]
    Rules {
        /// Which rule set to show
        #[arg(long, value_enum, default_value_t = RuleSetChoice::All)]
        set: RuleSetChoice,

        /// Show patterns and replacements
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate a sample configuration file
    #[command(name = "init")]
    Init {
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    #[command(name = "config")]
    ShowConfig,
}

/// Output format for `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Rule set selector for `rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleSetChoice {
    Bootstrap,
    Main,
    All,
}

impl RuleSetChoice {
    fn sets(self) -> Vec<&'static RuleSet> {
        match self {
            Self::Bootstrap => vec![&*BOOTSTRAP_RULES],
            Self::Main => vec![&*MAIN_RULES],
            Self::All => vec![&*MAIN_RULES, &*BOOTSTRAP_RULES],
        }
    }
}

/// Load the configuration, honouring `--config`.
///
/// # Errors
/// Returns an error if an explicit config file cannot be read or parsed.
pub fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    match cli.config {
        Some(ref path) => Ok(Config::load_with_explicit(path)?),
        None => Ok(Config::load()),
    }
}

/// Run a subcommand.
///
/// # Errors
/// Returns an error if the command fails; `check` fails when any file fails.
pub fn run_command(cli: Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Some(Command::Rewrite {
            file,
            output,
            in_place,
            chunk_name,
            prelude,
        }) => {
            let target = if in_place { Some(file.clone()) } else { output };
            rewrite_file(config, &file, target.as_deref(), chunk_name, prelude)?;
        }
        Some(Command::Check {
            files,
            chunk_name,
            format,
        }) => {
            check_files(config, &files, chunk_name, format)?;
        }
        Some(Command::Rules { set, verbose }) => {
            list_rules(set, verbose);
        }
        Some(Command::Init { output, force }) => {
            init_config(output, force)?;
        }
        Some(Command::ShowConfig) => {
            show_config(config);
        }
        None => {}
    }
    Ok(())
}

fn chunk_for(config: &Config, chunk_name: Option<String>) -> ChunkInfo {
    ChunkInfo::named(chunk_name.unwrap_or_else(|| config.rewrite.default_chunk_name.clone()))
}

fn rewrite_file(
    config: &Config,
    file: &Path,
    target: Option<&Path>,
    chunk_name: Option<String>,
    prelude: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(file)
        .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
    let chunk = chunk_for(config, chunk_name);
    let label = chunk.context().display_name();
    let plugin = ProtectBootstrapPlugin::new().with_prelude(prelude || config.rewrite.prelude);
    let logger = RewriteLogger::new(&config.logging);

    let (output, report) = match plugin.render_main_timed(&source, &chunk) {
        Ok(done) => done,
        Err(err) => {
            if let Some(ref logger) = logger {
                logger.log_failure(label, source.len(), &err);
            }
            return Err(err.into());
        }
    };
    if let Some(ref logger) = logger {
        logger.log_success(label, &report);
    }

    match target {
        Some(path) => {
            fs::write(path, &output)?;
            eprintln!(
                "{} {} ({} -> {} bytes, {}us)",
                "Hardened".green(),
                path.display(),
                report.input_bytes,
                report.output_bytes,
                report.elapsed_us
            );
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(output.as_bytes())?;
            handle.flush()?;
        }
    }
    Ok(())
}

/// Outcome of checking one file.
#[derive(Debug, serde::Serialize)]
struct CheckReport {
    file: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    undeclared_bindings: Vec<&'static str>,
}

fn check_one(file: &Path, chunk: &ChunkInfo) -> CheckReport {
    let mut report = CheckReport {
        file: file.display().to_string(),
        ok: false,
        layout: None,
        rule: None,
        error: None,
        undeclared_bindings: Vec::new(),
    };
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            report.error = Some(format!("cannot read: {e}"));
            return report;
        }
    };
    report.layout = detect_layout(&source).map(|layout| layout.label());
    match ProtectBootstrapPlugin::new().render_main(&source, chunk) {
        Ok(_) => {
            report.ok = true;
            report.undeclared_bindings = prelude::missing_bindings(&source);
        }
        Err(err) => {
            report.rule = Some(err.rule_name());
            report.error = Some(err.to_string());
        }
    }
    report
}

fn check_files(
    config: &Config,
    files: &[PathBuf],
    chunk_name: Option<String>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let chunk = chunk_for(config, chunk_name);
    let reports: Vec<CheckReport> = files.iter().map(|file| check_one(file, &chunk)).collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Pretty => {
            for report in &reports {
                print_check_report(report);
            }
        }
    }

    let failed = reports.iter().filter(|report| !report.ok).count();
    if failed > 0 {
        return Err(format!("{failed} of {} file(s) cannot be hardened", reports.len()).into());
    }
    Ok(())
}

fn print_check_report(report: &CheckReport) {
    let layout = report.layout.unwrap_or("no registry");
    if report.ok {
        println!("{} {} ({layout})", "OK  ".green().bold(), report.file);
        if !report.undeclared_bindings.is_empty() {
            println!(
                "     {} bundle never mentions {}; declare them around the chunk or use --prelude",
                "note:".yellow(),
                report.undeclared_bindings.join(", ")
            );
        }
    } else {
        println!("{} {} ({layout})", "FAIL".red().bold(), report.file);
        if let Some(rule) = report.rule {
            println!("     rule:  {}", rule.yellow());
        }
        if let Some(ref error) = report.error {
            println!("     error: {error}");
        }
    }
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::Substitute(sub) => {
            let kind = match sub.pattern.kind() {
                PatternKind::Literal => "literal",
                PatternKind::Regex => "regex",
            };
            let replacement = match &sub.replacement {
                Replacement::Template(template) => format!("{template:?}"),
                Replacement::Computed(_) => "<computed>".to_string(),
            };
            format!("{kind} {:?} -> {replacement}", sub.pattern.as_str())
        }
        Rule::Transform(_) => "whole-text transform".to_string(),
    }
}

fn list_rules(choice: RuleSetChoice, verbose: bool) {
    for set in choice.sets() {
        println!("{} ({} rules):", set.name().bold(), set.len());
        for (index, rule) in set.iter().enumerate() {
            let flag = if rule.is_mandatory() {
                "mandatory".red()
            } else {
                "optional ".bright_black()
            };
            println!("  {:>2}. [{flag}] {}", index + 1, rule.name());
            if verbose {
                println!("      {}", describe_rule(rule).bright_black());
            }
        }
        println!();
    }
    println!("Rules apply top to bottom; a mandatory rule that matches nothing refuses the chunk.");
}

fn init_config(output: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sample = Config::generate_sample_config();

    match output {
        Some(path) => {
            let path = Path::new(&path);
            if path.exists() && !force {
                return Err(
                    format!("File exists: {}. Use --force to overwrite.", path.display()).into(),
                );
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, sample)?;
            println!("Configuration written to: {}", path.display());
        }
        None => {
            println!("{sample}");
        }
    }

    Ok(())
}

fn show_config(config: &Config) {
    println!("Current configuration:");
    println!();
    println!("Config sources (lowest → highest priority):");
    let system_cfg = PathBuf::from("/etc/bpg").join("config.toml");
    if system_cfg.exists() {
        println!("  - system: {}", system_cfg.display());
    }
    if let Some(user_cfg) = Config::user_config_path().filter(|path| path.exists()) {
        println!("  - user: {}", user_cfg.display());
    }
    if let Some(project_cfg) = std::env::current_dir()
        .ok()
        .and_then(|cwd| Config::find_project_config(&cwd))
    {
        println!("  - project: {}", project_cfg.display());
    }
    println!();
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("cannot render configuration: {e}"),
    }
}

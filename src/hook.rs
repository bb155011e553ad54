//! Stdin/stdout hook protocol.
//!
//! A build step pipes one JSON object per chunk to `bpg` (no subcommand):
//!
//! ```json
//! {"source": "...generated main chunk...", "chunk": {"name": "main"}}
//! ```
//!
//! On success the hardened chunk is written back as `{"source": "..."}`.
//! On failure a `{"error", "rule", "pattern", "chunk"}` object is written
//! instead, a diagnostic box goes to stderr and the process exits non-zero.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, IsTerminal, Read, Write};

use crate::config::Config;
use crate::engine::RewriteError;
use crate::logging::RewriteLogger;
use crate::plugin::{ChunkInfo, ProtectBootstrapPlugin, RenderMainHooks, RewriteReport};

/// Input structure for one chunk.
#[derive(Debug, Deserialize)]
pub struct HookInput {
    /// The generated chunk source.
    pub source: Option<String>,

    /// Chunk metadata.
    #[serde(default)]
    pub chunk: Option<ChunkInput>,
}

/// Chunk metadata as sent by the build step.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkInput {
    pub name: Option<String>,
}

/// Output structure for a hardened chunk.
#[derive(Debug, Serialize)]
pub struct HookOutput<'a> {
    pub source: Cow<'a, str>,
}

/// Output structure for a refused chunk.
#[derive(Debug, Serialize)]
pub struct HookFailure<'a> {
    /// Human-readable error, `[ProtectBootstrap] "<pattern>" not found in <chunk>`.
    pub error: String,
    /// Name of the rule that failed.
    pub rule: &'static str,
    /// The rule's pattern as written.
    pub pattern: &'a str,
    /// Chunk label used in the error.
    pub chunk: &'a str,
}

/// Error type for reading and parsing hook input.
#[derive(Debug)]
pub enum HookReadError {
    /// Failed to read from stdin.
    Io(io::Error),
    /// Input exceeded the configured size limit.
    InputTooLarge(usize),
    /// Failed to parse JSON input.
    Json(serde_json::Error),
    /// The object has no `source` string.
    MissingSource,
}

impl std::fmt::Display for HookReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read hook input: {e}"),
            Self::InputTooLarge(len) => write!(f, "hook input too large ({len} bytes)"),
            Self::Json(e) => write!(f, "invalid hook JSON: {e}"),
            Self::MissingSource => f.write_str("hook input has no \"source\" string"),
        }
    }
}

impl std::error::Error for HookReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::InputTooLarge(_) | Self::MissingSource => None,
        }
    }
}

/// Read and parse hook input from stdin.
///
/// # Errors
///
/// See [`read_hook_input_from`].
pub fn read_hook_input(max_bytes: usize) -> Result<HookInput, HookReadError> {
    let stdin = io::stdin();
    let handle = stdin.lock();
    read_hook_input_from(handle, max_bytes)
}

/// Read and parse hook input from any reader.
///
/// # Errors
///
/// Returns [`HookReadError::Io`] if the reader fails, [`HookReadError::Json`]
/// if the input is not valid hook JSON, or [`HookReadError::InputTooLarge`] if
/// the input exceeds `max_bytes`.
pub fn read_hook_input_from<R: Read>(reader: R, max_bytes: usize) -> Result<HookInput, HookReadError> {
    let mut input = String::with_capacity(4096);
    // Read up to limit + 1 to detect overflow
    let mut handle = reader.take(max_bytes as u64 + 1);
    handle
        .read_to_string(&mut input)
        .map_err(HookReadError::Io)?;

    if input.len() > max_bytes {
        return Err(HookReadError::InputTooLarge(input.len()));
    }

    serde_json::from_str(&input).map_err(HookReadError::Json)
}

/// Chunk metadata for `input`, falling back to `default_name` when unnamed.
#[must_use]
pub fn chunk_info(input: &HookInput, default_name: &str) -> ChunkInfo {
    let name = input
        .chunk
        .as_ref()
        .and_then(|chunk| chunk.name.clone())
        .unwrap_or_else(|| default_name.to_string());
    ChunkInfo { name: Some(name) }
}

/// Run the render-main hooks over one chunk.
///
/// # Errors
///
/// The first error raised by a registered tap.
pub fn process(
    hooks: &RenderMainHooks,
    source: &str,
    chunk: &ChunkInfo,
) -> Result<(String, RewriteReport), RewriteError> {
    RewriteReport::measure(source, |source| hooks.call(source, chunk))
}

/// Hook-mode entry point. Returns the process exit code.
#[must_use]
pub fn run(config: &Config) -> i32 {
    let input = match read_hook_input(config.hook.max_input_bytes) {
        Ok(input) => input,
        Err(err) => {
            tracing::error!(error = %err, "cannot read hook input");
            let _ = writeln!(io::stderr(), "bpg: {err}");
            return 2;
        }
    };
    let Some(source) = input.source.as_deref() else {
        let _ = writeln!(io::stderr(), "bpg: {}", HookReadError::MissingSource);
        return 2;
    };

    let chunk = chunk_info(&input, &config.rewrite.default_chunk_name);
    let chunk_label = chunk.context().display_name();
    let logger = RewriteLogger::new(&config.logging);

    let mut hooks = RenderMainHooks::new();
    ProtectBootstrapPlugin::new()
        .with_prelude(config.rewrite.prelude)
        .apply(&mut hooks);

    match process(&hooks, source, &chunk) {
        Ok((output, report)) => {
            tracing::info!(
                chunk = chunk_label,
                input_bytes = report.input_bytes,
                output_bytes = report.output_bytes,
                elapsed_us = report.elapsed_us,
                "chunk hardened"
            );
            if let Some(ref logger) = logger {
                logger.log_success(chunk_label, &report);
            }
            output_success(&output);
            0
        }
        Err(err) => {
            if let Some(ref logger) = logger {
                logger.log_failure(chunk_label, source.len(), &err);
            }
            output_failure(&err, chunk_label);
            print_failure_box(&err, chunk_label);
            1
        }
    }
}

/// Write the hardened chunk to stdout.
pub fn output_success(source: &str) {
    let output = HookOutput {
        source: Cow::Borrowed(source),
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = serde_json::to_writer(&mut handle, &output);
    let _ = writeln!(handle);
}

/// Write the failure object to stdout.
pub fn output_failure(err: &RewriteError, chunk: &str) {
    let failure = HookFailure {
        error: err.to_string(),
        rule: err.rule_name(),
        pattern: err.pattern(),
        chunk,
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = serde_json::to_writer(&mut handle, &failure);
    let _ = writeln!(handle);
}

/// Configure colored output based on TTY detection.
pub fn configure_colors() {
    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Apply the configured color mode ("auto", "always", "never").
pub fn apply_color_mode(mode: &str) {
    match mode {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => configure_colors(),
    }
}

/// Print a diagnostic box to stderr for human visibility.
pub fn print_failure_box(err: &RewriteError, chunk: &str) {
    // Box width (content area, excluding border characters)
    const WIDTH: usize = 70;

    let stderr = io::stderr();
    let mut handle = stderr.lock();

    let _ = writeln!(handle);
    let _ = writeln!(
        handle,
        "{}{}{}",
        "╭".red(),
        "─".repeat(WIDTH).red(),
        "╮".red()
    );

    let _ = writeln!(
        handle,
        "{}  {}  {}{}",
        "│".red(),
        "REFUSED".white().on_red().bold(),
        " ".repeat(WIDTH - 11),
        "│".red()
    );

    let title = "   Bootstrap pollution guard (bpg)";
    let _ = writeln!(
        handle,
        "{}{}{}{}",
        "│".red(),
        title.bright_black(),
        " ".repeat(WIDTH - title.len()),
        "│".red()
    );

    let _ = writeln!(
        handle,
        "{}{}{}",
        "├".red(),
        "─".repeat(WIDTH).red().dimmed(),
        "┤".red()
    );

    labelled_line(&mut handle, "Chunk:", chunk, WIDTH);
    labelled_line(&mut handle, "Rule:", err.rule_name(), WIDTH);

    let _ = writeln!(handle, "{}{}{}", "│".red(), " ".repeat(WIDTH), "│".red());

    let label = "  Pattern: ";
    for (i, line) in wrap_text(err.pattern(), WIDTH - label.len() - 1)
        .iter()
        .enumerate()
    {
        let _ = write!(handle, "{}", "│".red());
        if i == 0 {
            let _ = write!(handle, "  {} ", "Pattern:".yellow().bold());
        } else {
            let _ = write!(handle, "{}", " ".repeat(label.len()));
        }
        let _ = write!(handle, "{}", line.bright_white());
        let padding = WIDTH.saturating_sub(label.len() + line.chars().count());
        let _ = writeln!(handle, "{}{}", " ".repeat(padding), "│".red());
    }

    let _ = writeln!(
        handle,
        "{}{}{}",
        "├".red(),
        "─".repeat(WIDTH).red().dimmed(),
        "┤".red()
    );

    for line in [
        "  The chunk does not have the expected webpack runtime shape.",
        "  Nothing was emitted. Check the bundler version and output",
        "  settings, then run: bpg check <bundle.js>",
    ] {
        let _ = write!(handle, "{}", "│".red());
        let _ = write!(handle, "{}", line.bright_black());
        let _ = writeln!(
            handle,
            "{}{}",
            " ".repeat(WIDTH.saturating_sub(line.len())),
            "│".red()
        );
    }

    let _ = writeln!(
        handle,
        "{}{}{}",
        "╰".red(),
        "─".repeat(WIDTH).red(),
        "╯".red()
    );
    let _ = writeln!(handle);
}

fn labelled_line(handle: &mut io::StderrLock<'_>, label: &str, value: &str, width: usize) {
    let value = truncate_for_display(value, width.saturating_sub(label.len() + 4));
    let _ = write!(handle, "{}", "│".red());
    let _ = write!(handle, "  {} ", label.bright_black());
    let _ = write!(handle, "{}", value.cyan());
    let used = 3 + label.len() + value.chars().count();
    let _ = writeln!(handle, "{}{}", " ".repeat(width.saturating_sub(used)), "│".red());
}

fn truncate_for_display(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{truncated}...")
}

/// Split `text` into chunks of at most `width` characters.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatchContext;
    use crate::rules::Substitution;

    #[test]
    fn parse_full_input() {
        let json = r#"{"source": "var x = 1;", "chunk": {"name": "runtime"}}"#;
        let input = read_hook_input_from(json.as_bytes(), 1024).unwrap();
        assert_eq!(input.source.as_deref(), Some("var x = 1;"));
        assert_eq!(chunk_info(&input, "main").name.as_deref(), Some("runtime"));
    }

    #[test]
    fn missing_chunk_uses_default_name() {
        let input = read_hook_input_from(r#"{"source": ""}"#.as_bytes(), 1024).unwrap();
        assert_eq!(chunk_info(&input, "main").name.as_deref(), Some("main"));
        let input =
            read_hook_input_from(r#"{"source": "", "chunk": {}}"#.as_bytes(), 1024).unwrap();
        assert_eq!(chunk_info(&input, "app").name.as_deref(), Some("app"));
    }

    #[test]
    fn oversized_input_rejected() {
        let json = format!(r#"{{"source": "{}"}}"#, "a".repeat(64));
        let err = read_hook_input_from(json.as_bytes(), 16).unwrap_err();
        assert!(matches!(err, HookReadError::InputTooLarge(17)));
    }

    #[test]
    fn invalid_json_rejected() {
        let err = read_hook_input_from("not json".as_bytes(), 1024).unwrap_err();
        assert!(matches!(err, HookReadError::Json(_)));
        assert!(err.to_string().starts_with("invalid hook JSON"));
    }

    #[test]
    fn output_serialization() {
        let output = HookOutput {
            source: Cow::Borrowed("a\"b"),
        };
        assert_eq!(serde_json::to_string(&output).unwrap(), r#"{"source":"a\"b"}"#);
    }

    #[test]
    fn failure_serialization() {
        let sub = Substitution::literal("alias", "Object.defineProperty(", "defineProperty(");
        let err = RewriteError::mismatch(&sub, &MatchContext::new(Some("main")), "x");
        let failure = HookFailure {
            error: err.to_string(),
            rule: err.rule_name(),
            pattern: err.pattern(),
            chunk: "main",
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            value["error"],
            "[ProtectBootstrap] \"Object.defineProperty(\" not found in main"
        );
        assert_eq!(value["rule"], "alias");
        assert_eq!(value["chunk"], "main");
    }

    #[test]
    fn process_reports_sizes() {
        let hooks = RenderMainHooks::new();
        let (output, report) = process(&hooks, "abc", &ChunkInfo::default()).unwrap();
        assert_eq!(output, "abc");
        assert_eq!(report.input_bytes, 3);
        assert_eq!(report.output_bytes, 3);
    }

    #[test]
    fn wrap_and_truncate_are_char_safe() {
        assert_eq!(wrap_text("ééééé", 2), ["éé", "éé", "é"]);
        assert_eq!(wrap_text("", 10), [""]);
        assert_eq!(truncate_for_display("ééééééé", 5), "éé...");
        assert_eq!(truncate_for_display("short", 10), "short");
    }

    #[test]
    fn failure_box_does_not_panic_on_long_patterns() {
        let sub = Substitution::regex(
            "long",
            "x".repeat(300),
            crate::rules::Replacement::Template("y".into()),
        );
        let err = RewriteError::mismatch(&sub, &MatchContext::default(), "");
        print_failure_box(&err, &"c".repeat(200));
    }
}

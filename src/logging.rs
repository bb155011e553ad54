//! Rewrite event log.
//!
//! One line per chunk handled by the hook protocol or the `rewrite` command,
//! as text or JSON. Diagnostics go through `tracing`; this file is the audit
//! trail of what was rewritten and what was refused.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

use crate::engine::RewriteError;
use crate::plugin::RewriteReport;

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the rewrite log is written.
    pub enabled: bool,
    /// Path to log file. Supports ~ expansion.
    pub file: Option<String>,
    /// Output format: "text" or "json".
    pub format: LogFormat,
    /// Events to log.
    pub events: LogEventFilter,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter for which events to log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEventFilter {
    pub success: bool,
    pub failure: bool,
}

impl Default for LogEventFilter {
    fn default() -> Self {
        Self {
            success: false,
            failure: true,
        }
    }
}

/// Outcome of one chunk rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteOutcome {
    Rewritten,
    Refused,
}

impl RewriteOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Rewritten => "REWRITTEN",
            Self::Refused => "REFUSED",
        }
    }
}

/// A structured log entry for one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteLogEntry {
    pub timestamp: String,
    pub outcome: RewriteOutcome,
    pub chunk: String,
    pub input_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RewriteLogEntry {
    #[must_use]
    pub fn success(chunk: &str, report: &RewriteReport) -> Self {
        Self {
            timestamp: now_rfc3339(),
            outcome: RewriteOutcome::Rewritten,
            chunk: chunk.to_string(),
            input_bytes: report.input_bytes,
            output_bytes: Some(report.output_bytes),
            elapsed_us: Some(report.elapsed_us),
            rule: None,
            pattern: None,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(chunk: &str, input_bytes: usize, err: &RewriteError) -> Self {
        Self {
            timestamp: now_rfc3339(),
            outcome: RewriteOutcome::Refused,
            chunk: chunk.to_string(),
            input_bytes,
            output_bytes: None,
            elapsed_us: None,
            rule: Some(err.rule_name().to_string()),
            pattern: Some(err.pattern().to_string()),
            error: Some(err.to_string()),
        }
    }

    /// Format as text log line.
    #[must_use]
    pub fn format_text(&self) -> String {
        let mut parts = Vec::with_capacity(6);
        parts.push(format!("[{}]", self.timestamp));
        parts.push(self.outcome.label().to_string());
        parts.push(self.chunk.clone());
        match self.output_bytes {
            Some(out) => parts.push(format!("{}B -> {out}B", self.input_bytes)),
            None => parts.push(format!("{}B", self.input_bytes)),
        }
        if let Some(ref rule) = self.rule {
            parts.push(rule.clone());
        }
        if let Some(ref error) = self.error {
            parts.push(format!("-- {error}"));
        }
        if let Some(us) = self.elapsed_us {
            parts.push(format!("({us}us)"));
        }
        parts.join(" ")
    }

    /// Format as JSON line.
    #[must_use]
    pub fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Appends [`RewriteLogEntry`] lines to the configured file.
pub struct RewriteLogger {
    config: LoggingConfig,
    writer: Option<Mutex<BufWriter<File>>>,
}

impl std::fmt::Debug for RewriteLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteLogger")
            .field("file", &self.config.file)
            .field("format", &self.config.format)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl RewriteLogger {
    /// Create a logger from configuration; `None` when logging is disabled.
    ///
    /// An unopenable file leaves the logger without a writer rather than
    /// failing the rewrite.
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let writer = config.file.as_ref().and_then(|path| {
            let expanded = expand_tilde(path);
            match open_log_file(&expanded) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(err) => {
                    tracing::warn!(path = %expanded, error = %err, "cannot open rewrite log");
                    None
                }
            }
        });
        Some(Self {
            config: config.clone(),
            writer,
        })
    }

    /// Log a successful rewrite.
    pub fn log_success(&self, chunk: &str, report: &RewriteReport) {
        if self.config.events.success {
            self.write(&RewriteLogEntry::success(chunk, report));
        }
    }

    /// Log a refused chunk.
    pub fn log_failure(&self, chunk: &str, input_bytes: usize, err: &RewriteError) {
        if self.config.events.failure {
            self.write(&RewriteLogEntry::failure(chunk, input_bytes, err));
        }
    }

    fn write(&self, entry: &RewriteLogEntry) {
        let line = match self.config.format {
            LogFormat::Text => entry.format_text(),
            LogFormat::Json => entry.format_json(),
        };
        if let Some(ref writer) = self.writer {
            if let Ok(mut w) = writer.lock() {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

fn open_log_file(path: &str) -> std::io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

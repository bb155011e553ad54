//! Configuration system for bpg.
//!
//! Supports layered configuration from multiple sources:
//! 1. Environment variables (highest priority)
//! 2. Explicit `--config` file
//! 3. Project config (.bpg.toml in repo root)
//! 4. User config (~/.config/bpg/config.toml)
//! 5. System config (/etc/bpg/config.toml)
//! 6. Compiled defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LoggingConfig;

/// Environment variable prefix for all config options.
const ENV_PREFIX: &str = "BPG";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
const PROJECT_CONFIG_NAME: &str = ".bpg.toml";

/// Default chunk name used when the caller does not name the chunk.
pub const DEFAULT_CHUNK_NAME: &str = "main";

/// Default cap on hook-protocol input (64 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024 * 1024;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,

    /// Rewrite behaviour.
    pub rewrite: RewriteConfig,

    /// Hook protocol limits.
    pub hook: HookConfig,

    /// Rewrite event log.
    pub logging: LoggingConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Color output mode: "auto", "always", "never".
    pub color: String,

    /// Whether to show debug diagnostics.
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            color: "auto".to_string(),
            verbose: false,
        }
    }
}

/// Rewrite behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Prepend the safe-binding declarations to every rewritten chunk.
    pub prelude: bool,

    /// Print the unmodified chunk to stderr when a mandatory rule misses.
    pub dump_source: bool,

    /// Chunk name used in diagnostics when none is supplied.
    pub default_chunk_name: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            prelude: false,
            dump_source: true,
            default_chunk_name: DEFAULT_CHUNK_NAME.to_string(),
        }
    }
}

/// Hook protocol limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Maximum accepted stdin size in bytes.
    pub max_input_bytes: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// Why a config file could not be used.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Parse { path, source } => write!(f, "invalid config {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

impl Config {
    /// Load configuration from all sources, merging them in priority order.
    ///
    /// Missing or unparsable implicit config files are skipped.
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::load_file_layers();
        config.apply_env_overrides();
        config
    }

    /// Like [`Config::load`], with an explicit config file layered on top of
    /// the implicit files (but below the environment).
    ///
    /// # Errors
    /// Returns an error if the explicit file cannot be read or parsed.
    pub fn load_with_explicit(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file_layers();
        config.merge(Self::read_file(path)?);
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_layers() -> Self {
        let mut config = Self::default();

        if let Some(system_config) = Self::load_system_config() {
            config.merge(system_config);
        }
        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }
        if let Some(project_config) = Self::load_project_config() {
            config.merge(project_config);
        }

        config
    }

    /// Load configuration from a specific file, ignoring errors.
    #[must_use]
    pub fn load_from_file(path: &Path) -> Option<Self> {
        Self::read_file(path).ok()
    }

    /// Read and parse a specific file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid config TOML.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn load_system_config() -> Option<Self> {
        let path = PathBuf::from("/etc/bpg").join(CONFIG_FILE_NAME);
        Self::load_from_file(&path)
    }

    fn load_user_config() -> Option<Self> {
        Self::load_from_file(&Self::user_config_path()?)
    }

    /// Find `.bpg.toml` in the current directory or a parent, stopping at the
    /// repository root.
    fn load_project_config() -> Option<Self> {
        let current = env::current_dir().ok()?;
        Self::find_project_config(&current).and_then(|path| Self::load_from_file(&path))
    }

    /// Locate the project config file starting from `start`.
    #[must_use]
    pub fn find_project_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
            if current.join(".git").exists() || !current.pop() {
                return None;
            }
        }
    }

    /// Merge another config into this one (other takes priority where it
    /// differs from the defaults).
    fn merge(&mut self, other: Self) {
        let defaults = Self::default();

        if other.general.color != defaults.general.color {
            self.general.color = other.general.color;
        }
        if other.general.verbose {
            self.general.verbose = true;
        }

        if other.rewrite.prelude {
            self.rewrite.prelude = true;
        }
        if !other.rewrite.dump_source {
            self.rewrite.dump_source = false;
        }
        if other.rewrite.default_chunk_name != defaults.rewrite.default_chunk_name {
            self.rewrite.default_chunk_name = other.rewrite.default_chunk_name;
        }

        if other.hook.max_input_bytes != defaults.hook.max_input_bytes {
            self.hook.max_input_bytes = other.hook.max_input_bytes;
        }

        if other.logging.enabled {
            self.logging = other.logging;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // BPG_VERBOSE=1
        if env::var(format!("{ENV_PREFIX}_VERBOSE")).is_ok() {
            self.general.verbose = true;
        }

        // BPG_COLOR=never
        if let Ok(color) = env::var(format!("{ENV_PREFIX}_COLOR")) {
            self.general.color = color;
        }

        // BPG_PRELUDE=1 / BPG_PRELUDE=0
        if let Ok(prelude) = env::var(format!("{ENV_PREFIX}_PRELUDE")) {
            self.rewrite.prelude = parse_env_bool(&prelude);
        }

        // BPG_LOG_FILE=/tmp/bpg.log
        if let Ok(file) = env::var(format!("{ENV_PREFIX}_LOG_FILE")) {
            self.logging.enabled = true;
            self.logging.file = Some(file);
        }
    }

    /// Path of the user config file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        let config_dir = dirs::config_dir()?;
        Some(config_dir.join("bpg").join(CONFIG_FILE_NAME))
    }

    /// Render the sample config written by `bpg init`.
    #[must_use]
    pub fn generate_sample_config() -> String {
        format!(
            r#"# bpg configuration
#
# Layers, lowest to highest priority: /etc/bpg/config.toml,
# ~/.config/bpg/config.toml, .bpg.toml (project), --config, BPG_* env vars.

[general]
# Color output: "auto", "always", "never"
color = "auto"
# Debug diagnostics on stderr (RUST_LOG overrides)
verbose = false

[rewrite]
# Prepend declarations of defineProperty, safeCall, hasOwnProperty and
# toStringTagSym. Leave off when the build already declares them.
prelude = false
# Print the unmodified chunk when a mandatory rule does not match
dump_source = true
# Chunk name used in diagnostics when none is given
default_chunk_name = "{DEFAULT_CHUNK_NAME}"

[hook]
# Maximum stdin size accepted in hook mode
max_input_bytes = {DEFAULT_MAX_INPUT_BYTES}

[logging]
enabled = false
# file = "~/.local/share/bpg/rewrites.log"
format = "text"

[logging.events]
success = false
failure = true
"#
        )
    }
}

fn parse_env_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.general.color, "auto");
        assert!(!config.general.verbose);
        assert!(!config.rewrite.prelude);
        assert!(config.rewrite.dump_source);
        assert_eq!(config.rewrite.default_chunk_name, "main");
        assert_eq!(config.hook.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn sample_config_parses_to_defaults() {
        let sample = Config::generate_sample_config();
        let parsed: Config = toml::from_str(&sample).expect("sample config parses");
        assert_eq!(parsed.rewrite.default_chunk_name, "main");
        assert!(parsed.rewrite.dump_source);
        assert_eq!(parsed.logging.format, LogFormat::Text);
        assert!(parsed.logging.events.failure);
        assert!(!parsed.logging.events.success);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str("[rewrite]\nprelude = true\n").unwrap();
        assert!(parsed.rewrite.prelude);
        assert!(parsed.rewrite.dump_source);
        assert_eq!(parsed.general.color, "auto");
    }

    #[test]
    fn merge_prefers_non_default_values() {
        let mut base = Config::default();
        let other: Config = toml::from_str(
            r#"
[general]
color = "never"

[rewrite]
dump_source = false
default_chunk_name = "runtime"

[hook]
max_input_bytes = 1024

[logging]
enabled = true
file = "/tmp/bpg.log"
format = "json"
"#,
        )
        .unwrap();
        base.merge(other);
        assert_eq!(base.general.color, "never");
        assert!(!base.rewrite.dump_source);
        assert_eq!(base.rewrite.default_chunk_name, "runtime");
        assert_eq!(base.hook.max_input_bytes, 1024);
        assert!(base.logging.enabled);
        assert_eq!(base.logging.format, LogFormat::Json);
    }

    #[test]
    fn merge_default_layer_changes_nothing() {
        let mut base: Config = toml::from_str("[rewrite]\nprelude = true\n").unwrap();
        base.merge(Config::default());
        assert!(base.rewrite.prelude);
    }

    #[test]
    fn read_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[rewrite\nprelude = ").unwrap();
        let err = Config::read_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
        assert!(Config::load_from_file(&path).is_none());
    }

    #[test]
    fn find_project_config_walks_up_to_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let nested = repo.join("packages").join("app");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        assert_eq!(Config::find_project_config(&nested), None);

        fs::write(repo.join(PROJECT_CONFIG_NAME), "").unwrap();
        assert_eq!(
            Config::find_project_config(&nested),
            Some(repo.join(PROJECT_CONFIG_NAME))
        );
    }

    #[test]
    fn env_bool_parsing() {
        assert!(parse_env_bool("1"));
        assert!(parse_env_bool("TRUE"));
        assert!(parse_env_bool("yes"));
        assert!(!parse_env_bool("0"));
        assert!(!parse_env_bool("false"));
        assert!(!parse_env_bool(" off "));
    }
}

//! Configuration Module
//!
//! Provides TOML-based configuration for jsonkv with support for:
//! - Logging level for the demo binary
//! - Database location, idle timeout and flush throttling
//! - Environment variable overrides (JSONKV__* prefix)
//!
//! Raw options are all optional; [`DbConfig::resolve`] fills the gaps with
//! defaults and produces the immutable record the store runs on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

/// Idle timeout applied when none is configured (5 minutes)
pub const DEFAULT_IDLE_TIMEOUT_MS: i64 = 300_000;

/// Flush interval applied when none is configured (no limit)
pub const DEFAULT_FLUSH_INTERVAL_MS: i64 = -1;

/// Extension appended to every database name to form its filename
pub const FILE_EXTENSION: &str = ".db.json";

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Database options (unresolved)
    pub db: DbOptions,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How `read` decides that a stored value should be replaced by the
/// caller's default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Missing keys and falsy values (`null`, `false`, `0`, `""`) yield the default
    #[default]
    Falsy,
    /// Only missing keys yield the default
    Absent,
}

/// Database options as supplied by the user. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbOptions {
    /// Directory holding the `.db.json` files
    pub location: Option<PathBuf>,
    /// Milliseconds of inactivity before a database is closed (-1 = never).
    /// An explicit `0` is honored as "close as soon as the timer fires"; it
    /// is not replaced by the 5 minute default.
    pub idle_timeout_ms: Option<i64>,
    /// Minimum milliseconds between two flushes of one database (<= 0 = no limit)
    pub flush_interval_ms: Option<i64>,
    /// Default substitution rule for reads
    pub fallback: Option<Fallback>,
}

/// Resolved, immutable database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Directory holding the `.db.json` files
    pub location: PathBuf,
    /// Inactivity period before auto-close; `None` disables auto-close
    pub idle_timeout: Option<Duration>,
    /// Throttle window after each flush; `None` means unlimited flushing
    pub flush_interval: Option<Duration>,
    /// Default substitution rule for reads
    pub fallback: Fallback,
}

/// `<directory of the running executable>/databases`
fn default_location() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("databases")
}

impl DbConfig {
    /// Fill every missing option with its default. Never fails and never
    /// touches the caller's options.
    pub fn resolve(options: Option<&DbOptions>) -> Self {
        let empty = DbOptions::default();
        let options = options.unwrap_or(&empty);

        let idle_timeout_ms = options.idle_timeout_ms.unwrap_or(DEFAULT_IDLE_TIMEOUT_MS);
        let flush_interval_ms = options
            .flush_interval_ms
            .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS);

        Self {
            location: options.location.clone().unwrap_or_else(default_location),
            idle_timeout: u64::try_from(idle_timeout_ms)
                .ok()
                .map(Duration::from_millis),
            flush_interval: u64::try_from(flush_interval_ms)
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            fallback: options.fallback.unwrap_or_default(),
        }
    }

    /// Path of the file backing `name`
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.location.join(format!("{}{}", name, FILE_EXTENSION))
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::resolve(None)
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `JSONKV__` prefix with double underscores for nesting:
    ///    - `JSONKV__DB__LOCATION=/var/lib/jsonkv` overrides `db.location`
    ///    - `JSONKV__DB__IDLE_TIMEOUT_MS=-1` overrides `db.idle_timeout_ms`
    ///    - `JSONKV__LOG__LEVEL=debug` overrides `log.level`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().set_default("log.level", "info")?;

        // Load from file with env var substitution
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("JSONKV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides only (no file).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.db.idle_timeout_ms {
            if timeout < -1 {
                return Err(ConfigError::Validation(format!(
                    "db.idle_timeout_ms must be -1 or greater, got {}",
                    timeout
                )));
            }
        }

        if let Some(location) = &self.db.location {
            if location.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "db.location must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve the database section into the record the store runs on
    pub fn database(&self) -> DbConfig {
        DbConfig::resolve(Some(&self.db))
    }
}

use crate::core::db::{ArgumentBinding, OpenOptions};
use crate::dispatcher::BridgeOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub logging: Option<LoggingConfig>,
    pub sqlite: Option<SqliteConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: Option<String>,
    /// Start with verbose statement tracing enabled
    pub debug_mode: Option<bool>,
}

/// SQLite-related configuration.
#[derive(Debug, Deserialize)]
pub struct SqliteConfig {
    pub busy_timeout_ms: Option<u64>,
    /// Statements run on every newly opened connection
    pub pragmas: Option<Vec<String>>,
    pub argument_binding: Option<ArgumentBinding>,
}

impl Config {
    /// Log level name, `info` when unset.
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    /// Builds the bridge settings described by this configuration.
    pub fn bridge_options(&self) -> BridgeOptions {
        let sqlite = self.sqlite.as_ref();
        BridgeOptions {
            open: OpenOptions {
                busy_timeout: sqlite
                    .and_then(|s| s.busy_timeout_ms)
                    .map(Duration::from_millis),
                pragmas: sqlite.and_then(|s| s.pragmas.clone()).unwrap_or_default(),
                read_only: false,
            },
            binding: sqlite.and_then(|s| s.argument_binding).unwrap_or_default(),
            debug_mode: self
                .logging
                .as_ref()
                .and_then(|l| l.debug_mode)
                .unwrap_or(false),
        }
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = sqlbridge::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    toml::from_str(&content).map_err(|e| e.to_string())
}

/// Default configuration location, e.g. `~/.config/sqlbridge/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlbridge").join("config.toml"))
}

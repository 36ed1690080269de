use crate::core::db::ConnectionOptions;
use crate::core::{DoError, Result};
use crate::logger::Level;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub logger: Option<LoggerConfig>,
    pub connection: Option<ConnectionConfig>,
}

/// Statement logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggerConfig {
    /// Level name ("debug", "info", ...) or its integer form
    pub level: Option<String>,
}

/// Connection defaults.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub foreign_keys: Option<bool>,
    pub read_only: Option<bool>,
}

impl Config {
    /// The configured logger level, if any.
    pub fn logger_level(&self) -> Result<Option<Level>> {
        let raw = match self.logger.as_ref().and_then(|l| l.level.as_deref()) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Level::parse(raw)
            .map(Some)
            .ok_or_else(|| DoError::Config(format!("Unknown logger level '{}'", raw)))
    }

    /// Connection options for `path`, falling back to the configured path.
    pub fn connection_options(&self, path: Option<&str>) -> Result<ConnectionOptions> {
        let section = self.connection.as_ref();
        let path = path
            .map(str::to_string)
            .or_else(|| section.and_then(|c| c.path.clone()))
            .ok_or_else(|| DoError::Config("No database path given".to_string()))?;

        let defaults = ConnectionOptions::default();
        Ok(ConnectionOptions {
            path,
            busy_timeout_ms: section
                .and_then(|c| c.busy_timeout_ms)
                .unwrap_or(defaults.busy_timeout_ms),
            foreign_keys: section
                .and_then(|c| c.foreign_keys)
                .unwrap_or(defaults.foreign_keys),
            read_only: section.and_then(|c| c.read_only).unwrap_or(defaults.read_only),
        })
    }
}

/// Default configuration file location (`<config dir>/dosql/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dosql").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = dosql::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| DoError::Config(e.to_string()))
}

//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;
use crate::runner::RunOptions;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Connection handling settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Timeout settings in milliseconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Bound on each connect attempt
    #[serde(default = "default_connect")]
    pub connect_ms: u64,

    /// Inactivity timeout while reading a response
    #[serde(default = "default_read")]
    pub read_ms: u64,

    /// Bound on writing one full payload
    #[serde(default = "default_write")]
    pub write_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: default_connect(),
            read_ms: default_read(),
            write_ms: default_write(),
        }
    }
}

impl Timeouts {
    /// Every timeout must be at least one millisecond
    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("connect_ms", self.connect_ms),
            ("read_ms", self.read_ms),
            ("write_ms", self.write_ms),
        ] {
            if value == 0 {
                return Err(super::Error::ConfigParse(format!(
                    "timeouts.{key} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

fn default_connect() -> u64 {
    5_000
}
fn default_read() -> u64 {
    2_000
}
fn default_write() -> u64 {
    5_000
}

/// Connection handling
#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    /// Open a fresh connection for each payload
    #[serde(default = "default_per_payload_connection")]
    pub per_payload_connection: bool,

    /// Shut down the write side after sending each payload
    #[serde(default)]
    pub half_close: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            per_payload_connection: default_per_payload_connection(),
            half_close: false,
        }
    }
}

fn default_per_payload_connection() -> bool {
    true
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| super::Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.timeouts.validate()?;
        Ok(config)
    }

    /// Runner options described by this configuration
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            connect_timeout: Duration::from_millis(self.timeouts.connect_ms),
            read_timeout: Duration::from_millis(self.timeouts.read_ms),
            write_timeout: Duration::from_millis(self.timeouts.write_ms),
            per_payload_connection: self.runner.per_payload_connection,
            half_close: self.runner.half_close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        let opts = config.run_options();
        assert_eq!(opts, RunOptions::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            [timeouts]
            read_ms = 250

            [runner]
            per_payload_connection = false
            "#,
        )
        .unwrap();

        let opts = config.run_options();
        assert_eq!(opts.read_timeout, Duration::from_millis(250));
        assert_eq!(opts.connect_timeout, Duration::from_secs(5));
        assert!(!opts.per_payload_connection);
        assert!(!opts.half_close);
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::parse("[timeouts]\nread_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigParse(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::parse("[timeouts]\nread_ms = 0").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigParse(ref msg) if msg.contains("read_ms")));
    }
}

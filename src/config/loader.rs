use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::types::{Config, RecordSetting};
use crate::server::{RecordFile, ServerOptions, ValidationError};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/switch-harness/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("switch-harness").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// A missing file yields `Config::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Loads and validates configuration from `path`, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that the server section describes a launchable server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_options().map(|_| ())
    }

    /// Validated server options from the `[server]` section.
    pub fn server_options(&self) -> Result<ServerOptions, ConfigError> {
        let server = &self.server;
        let record_file = match &server.record {
            RecordSetting::Flag(false) => RecordFile::Off,
            RecordSetting::Flag(true) => RecordFile::Default,
            RecordSetting::Name(name) => RecordFile::named(name)?,
        };

        let mut options = ServerOptions::default()
            .with_video_port(server.video_port)?
            .with_audio_port(server.audio_port)?
            .with_controller_address(&server.controller_address)?
            .with_record_file(record_file);
        if let Some(path) = &server.path {
            options = options.with_path(path);
        }
        if let Some(format) = &server.video_format {
            options = options.with_video_format(format.as_str());
        }
        Ok(options)
    }

    /// Pattern announcing that the server is ready for controllers.
    pub fn startup_pattern(&self) -> &str {
        self.harness
            .startup_pattern
            .as_deref()
            .unwrap_or(&self.server.controller_address)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.harness.startup_timeout_secs)
    }

    /// Log file for server output, `None` when mirroring to stderr.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.harness
            .log_to_file
            .then(|| self.harness.log_file.clone())
    }
}

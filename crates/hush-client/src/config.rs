//! Configuration management for hush-client
//!
//! Configuration is read from an optional TOML file and then overridden by
//! command line flags.
//!
//! # Example TOML
//!
//! ```toml
//! relay_url = "ws://localhost:4040/ws"
//! iv_mode = "fixed"          # "fixed" | "random"
//! malformed_frames = "skip"  # "skip" | "fatal"
//!
//! [logging]
//! level = "warn"
//! ```

use std::path::Path;

use hush_crypto::IvMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// What the inbound loop does with a frame that is not a valid envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedFramePolicy {
    /// Log the frame and keep reading
    #[default]
    Skip,
    /// End the session
    Fatal,
}

impl std::str::FromStr for MalformedFramePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(MalformedFramePolicy::Skip),
            "fatal" => Ok(MalformedFramePolicy::Fatal),
            other => Err(format!(
                "unknown malformed frame policy: {other} (expected skip or fatal)"
            )),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the relay
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// IV handling for message bodies; every client talking to each other
    /// must use the same mode
    #[serde(default)]
    pub iv_mode: IvMode,

    #[serde(default)]
    pub malformed_frames: MalformedFramePolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_relay_url() -> String {
    "ws://localhost:4040/ws".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            iv_mode: IvMode::default(),
            malformed_frames: MalformedFramePolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// CLI overrides for configuration values
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub relay_url: Option<String>,
    pub iv_mode: Option<IvMode>,
    pub malformed_frames: Option<MalformedFramePolicy>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
}

impl ClientConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a custom path, or defaults when none is given
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        match custom_path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply CLI overrides; flags take precedence over file values.
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref url) = overrides.relay_url {
            self.relay_url = url.clone();
        }
        if let Some(mode) = overrides.iv_mode {
            self.iv_mode = mode;
        }
        if let Some(policy) = overrides.malformed_frames {
            self.malformed_frames = policy;
        }
        if overrides.verbose == Some(true) {
            self.logging.level = "info".to_string();
        }
        if overrides.debug == Some(true) {
            self.logging.level = "debug".to_string();
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.relay_url.starts_with("ws://") && !self.relay_url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid relay URL '{}': must start with ws:// or wss://",
                self.relay_url
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

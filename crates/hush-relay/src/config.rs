//! Configuration management
//!
//! Values are layered: built-in defaults, then a TOML file, then
//! `HUSH_RELAY_*` environment variables, then command line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mailbox::DEFAULT_MAILBOX_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Command line flags for the relay binary
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hush-relay")]
#[command(version, about = "hush relay - routes encrypted envelopes between clients")]
pub struct RelayArgs {
    /// TOML config file
    #[arg(short = 'f', long, env = "HUSH_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on for WebSocket clients
    #[arg(short, long)]
    pub listen_addr: Option<SocketAddr>,

    /// WebSocket upgrade path
    #[arg(long)]
    pub ws_path: Option<String>,

    /// Frames queued per client before it is evicted
    #[arg(long)]
    pub mailbox_capacity: Option<usize>,

    /// Largest inbound WebSocket message in bytes
    #[arg(long)]
    pub max_message_size: Option<usize>,

    /// Address for /health, /ready and /metrics
    #[arg(long)]
    pub admin_addr: Option<SocketAddr>,
}

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    pub ws_path: String,
    pub mailbox_capacity: usize,
    pub max_message_size: usize,
    pub admin_addr: Option<SocketAddr>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 4040)),
            ws_path: "/ws".to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            max_message_size: 512,
            admin_addr: None,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the process arguments and environment
    pub fn load() -> Result<Self, ConfigError> {
        let args = RelayArgs::parse();
        Self::load_with(&args, |key| std::env::var(key).ok())
    }

    /// Load configuration from explicit flags and an environment lookup
    pub fn load_with<F>(args: &RelayArgs, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &args.config {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = env("HUSH_RELAY_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid listen_addr: {}", e)))?;
        }

        if let Some(path) = env("HUSH_RELAY_WS_PATH") {
            self.ws_path = path;
        }

        if let Some(cap) = env("HUSH_RELAY_MAILBOX_CAPACITY") {
            self.mailbox_capacity = cap
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid mailbox_capacity: {}", e)))?;
        }

        if let Some(size) = env("HUSH_RELAY_MAX_MESSAGE_SIZE") {
            self.max_message_size = size
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid max_message_size: {}", e)))?;
        }

        if let Some(addr) = env("HUSH_RELAY_ADMIN_ADDR") {
            self.admin_addr = Some(
                addr.parse()
                    .map_err(|e| ConfigError::Invalid(format!("Invalid admin_addr: {}", e)))?,
            );
        }

        Ok(())
    }

    fn apply_args(&mut self, args: &RelayArgs) {
        if let Some(addr) = args.listen_addr {
            self.listen_addr = addr;
        }
        if let Some(path) = &args.ws_path {
            self.ws_path = path.clone();
        }
        if let Some(cap) = args.mailbox_capacity {
            self.mailbox_capacity = cap;
        }
        if let Some(size) = args.max_message_size {
            self.max_message_size = size;
        }
        if let Some(addr) = args.admin_addr {
            self.admin_addr = Some(addr);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be > 0".to_string()));
        }

        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("max_message_size must be > 0".to_string()));
        }

        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "ws_path must start with '/': {:?}",
                self.ws_path
            )));
        }

        // Port 0 asks the OS for a fresh port, so equal addresses cannot collide
        if Some(self.listen_addr) == self.admin_addr && self.listen_addr.port() != 0 {
            return Err(ConfigError::Invalid(
                "admin_addr must differ from listen_addr".to_string(),
            ));
        }

        Ok(())
    }
}

//! Configuration loading for the hub service
//!
//! Resolution follows the usual priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CAMPUS_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_event_buffer() -> usize {
    64
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_code_digits() -> u32 {
    4
}

fn default_ttl_secs() -> u64 {
    60
}

/// Hub service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Bind address for the HTTP server
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port for the HTTP server
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-connection event buffer; a consumer lagging past this drops frames
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Heartbeat cadence for the hub's scheduled status frames
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Digits in generated attendance codes
    #[serde(default = "default_code_digits")]
    pub code_digits: u32,
    /// TTL applied when a create-token request does not specify one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_buffer: default_event_buffer(),
            heartbeat_secs: default_heartbeat_secs(),
            code_digits: default_code_digits(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl HubConfig {
    /// Parse configuration from a TOML file; missing keys take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve configuration from CLI arguments, environment, and file
    pub fn resolve(cli_config: Option<&Path>, cli_host: Option<&str>, cli_port: Option<u16>) -> Result<Self> {
        // Priority 3: TOML config file (explicit path, then CAMPUS_CONFIG)
        let mut config = match cli_config {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var("CAMPUS_CONFIG") {
                Ok(path) if Path::new(&path).exists() => Self::from_file(Path::new(&path))?,
                _ => Self::default(),
            },
        };

        // Priority 2: environment variables
        if let Ok(host) = std::env::var("CAMPUS_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("CAMPUS_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid CAMPUS_PORT: {port}")))?;
        }

        // Priority 1: command-line arguments
        if let Some(host) = cli_host {
            config.host = host.to_string();
        }
        if let Some(port) = cli_port {
            config.port = port;
        }

        Ok(config)
    }
}

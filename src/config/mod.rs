//! Configuration module for socks5d
//!
//! This module provides configuration types and TOML parsing for the server.

mod server;

pub use server::{AuthConfig, Config, ServerConfig, UserEntry};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config
        .server
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| "Invalid configuration")?;
    Ok(config)
}

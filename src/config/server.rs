//! Server configuration types
//!
//! Defines the configuration structures for the SOCKS5 server.

use crate::socks::{AuthMethod, AuthRegistry, CommandOptions, StaticUserStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default listen address
fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

/// Default handshake deadline in seconds
fn default_handshake_timeout() -> u64 {
    30
}

/// Default CONNECT dial timeout in seconds
fn default_connect_timeout() -> u64 {
    crate::socks::CONNECT_TIMEOUT_SECS
}

/// Default UDP reply timeout in seconds
fn default_udp_reply_timeout() -> u64 {
    crate::socks::UDP_REPLY_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

fn default_methods() -> Vec<AuthMethod> {
    vec![AuthMethod::NoAuth]
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to accept control connections on (e.g., "0.0.0.0:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Deadline for authentication plus request parsing, in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// CONNECT dial timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// How long the UDP relay waits for a target's reply, in seconds
    #[serde(default = "default_udp_reply_timeout")]
    pub udp_reply_timeout: u64,

    /// Allow UDP associate command
    #[serde(default = "default_true")]
    pub allow_udp: bool,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            handshake_timeout: default_handshake_timeout(),
            connect_timeout: default_connect_timeout(),
            udp_reply_timeout: default_udp_reply_timeout(),
            allow_udp: true,
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.handshake_timeout == 0 {
            return Err("handshake_timeout must be greater than zero".to_string());
        }
        if self.connect_timeout == 0 {
            return Err("connect_timeout must be greater than zero".to_string());
        }
        self.auth.validate()
    }

    /// Handshake deadline
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    /// Per-command settings for the dispatcher
    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            udp_reply_timeout: Duration::from_secs(self.udp_reply_timeout),
            allow_udp: self.allow_udp,
        }
    }
}

/// A configured username/password pair
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserEntry {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

/// Authentication configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// Methods the server accepts
    #[serde(default = "default_methods")]
    pub methods: Vec<AuthMethod>,

    /// Users for the username/password method
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            methods: default_methods(),
            users: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.methods.is_empty() {
            return Err("at least one authentication method must be enabled".to_string());
        }
        if self.methods.contains(&AuthMethod::UsernamePassword) && self.users.is_empty() {
            return Err("username_password enabled but no users configured".to_string());
        }
        Ok(())
    }

    /// Build the user store from the configured users
    pub fn user_store(&self) -> StaticUserStore {
        StaticUserStore::from_pairs(
            self.users
                .iter()
                .map(|u| (u.username.clone(), u.password.clone())),
        )
    }

    /// Build the method registry
    pub fn registry(&self) -> AuthRegistry {
        AuthRegistry::new(&self.methods, Arc::new(self.user_store()))
    }
}

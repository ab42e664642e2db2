//! SOCKS5 authentication module
//!
//! Handles method negotiation and runs the selected method's sub-protocol.
//! Each method routine writes its own selection reply.

mod gssapi;
mod none;
mod password;

pub use gssapi::GssapiAuth;
pub use none::NoAuth;
pub use password::{PasswordAuth, StaticUserStore, UserStore};

use super::consts::*;
use crate::error::Socks5Error;
use crate::helper::{read_exact_n, reply_to};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Authentication method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// No authentication required
    NoAuth,
    /// GSSAPI, registered only as a rejecting placeholder
    Gssapi,
    /// Username/password authentication
    UsernamePassword,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Gssapi => SOCKS5_AUTH_METHOD_GSSAPI,
            AuthMethod::UsernamePassword => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }

    /// Parse from SOCKS5 method byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => Some(AuthMethod::NoAuth),
            SOCKS5_AUTH_METHOD_GSSAPI => Some(AuthMethod::Gssapi),
            SOCKS5_AUTH_METHOD_PASSWORD => Some(AuthMethod::UsernamePassword),
            _ => None,
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::NoAuth => write!(f, "no-auth"),
            AuthMethod::Gssapi => write!(f, "gssapi"),
            AuthMethod::UsernamePassword => write!(f, "username/password"),
        }
    }
}

/// The set of methods this server accepts
///
/// Built once at startup and shared read-only by every connection task.
#[derive(Clone)]
pub struct AuthRegistry {
    methods: Vec<AuthMethod>,
    users: Arc<dyn UserStore>,
}

impl AuthRegistry {
    /// Create a registry from the enabled methods and the credential store
    ///
    /// Duplicate methods are ignored.
    pub fn new(methods: &[AuthMethod], users: Arc<dyn UserStore>) -> Self {
        let mut unique = Vec::with_capacity(methods.len());
        for method in methods {
            if !unique.contains(method) {
                unique.push(*method);
            }
        }
        AuthRegistry {
            methods: unique,
            users,
        }
    }

    /// Registry accepting only [`AuthMethod::NoAuth`]
    pub fn no_auth() -> Self {
        Self::new(&[AuthMethod::NoAuth], Arc::new(StaticUserStore::default()))
    }

    /// Look up a method byte
    pub fn lookup(&self, byte: u8) -> Option<AuthMethod> {
        AuthMethod::from_byte(byte).filter(|m| self.methods.contains(m))
    }

    /// Methods in this registry
    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods
    }

    /// Pick the first offered method that is registered
    pub fn select(&self, offered: &[u8]) -> Option<AuthMethod> {
        offered.iter().find_map(|&byte| self.lookup(byte))
    }

    /// Run the sub-protocol of a selected method
    async fn negotiate<S>(&self, method: AuthMethod, stream: &mut S) -> Result<(), Socks5Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match method {
            AuthMethod::NoAuth => NoAuth::authenticate(stream).await,
            AuthMethod::Gssapi => GssapiAuth::authenticate(stream).await,
            AuthMethod::UsernamePassword => {
                PasswordAuth::authenticate(stream, self.users.as_ref()).await
            }
        }
    }
}

impl fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRegistry")
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Perform method negotiation and authentication
///
/// # Protocol
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
///
/// A bad version or an empty method list fails without any reply. When none
/// of the offered methods is registered, `[0x05, 0xFF]` is written and the
/// call fails with [`Socks5Error::NoAcceptableMethod`].
pub async fn authenticate<S>(
    stream: &mut S,
    registry: &AuthRegistry,
) -> Result<AuthMethod, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header = read_exact_n(stream, 2, "method selection header").await?;
    let version = header[0];
    let num_methods = header[1];

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version));
    }

    if num_methods == 0 {
        return Err(Socks5Error::Format(
            "no authentication methods provided".to_string(),
        ));
    }

    let methods = read_exact_n(stream, num_methods as usize, "method list").await?;

    let method = match registry.select(&methods) {
        Some(method) => method,
        None => {
            reply_to(stream, &[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE]).await?;
            return Err(Socks5Error::NoAcceptableMethod);
        }
    };

    registry.negotiate(method, stream).await?;
    Ok(method)
}

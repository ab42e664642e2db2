//! Username/password authentication handler
//!
//! Implements RFC 1929 username/password authentication for SOCKS5.

use crate::error::Socks5Error;
use crate::helper::{read_exact_n, read_u8, reply_to};
use crate::socks::consts::*;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Credential check consulted by the username/password method
///
/// Implementations are shared by every connection task, so they must be
/// safe to call concurrently.
pub trait UserStore: Send + Sync {
    /// Whether the username/password pair is valid
    fn has_user(&self, username: &str, password: &str) -> bool;
}

/// Fixed in-memory user table
#[derive(Debug, Clone, Default)]
pub struct StaticUserStore {
    users: HashMap<String, String>,
}

impl StaticUserStore {
    /// Build a store from username/password pairs
    pub fn from_pairs<I, U, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        StaticUserStore {
            users: pairs
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }

    /// Number of users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the store has no users
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for StaticUserStore {
    fn has_user(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

/// Username/password authentication handler
pub struct PasswordAuth;

impl PasswordAuth {
    /// Select the method and perform username/password authentication
    ///
    /// # Protocol
    ///
    /// Client sends:
    /// ```text
    /// +----+------+----------+------+----------+
    /// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    /// +----+------+----------+------+----------+
    /// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    /// +----+------+----------+------+----------+
    /// ```
    ///
    /// Server responds:
    /// ```text
    /// +----+--------+
    /// |VER | STATUS |
    /// +----+--------+
    /// | 1  |   1    |
    /// +----+--------+
    /// ```
    ///
    /// Malformed requests fail with [`Socks5Error::Format`] and no status
    /// reply. Rejected credentials, including ones that are not UTF-8, get a
    /// failure status and [`Socks5Error::AuthFailed`].
    pub async fn authenticate<S>(stream: &mut S, users: &dyn UserStore) -> Result<(), Socks5Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        reply_to(stream, &[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD]).await?;

        let header = read_exact_n(stream, 2, "auth header").await?;
        let version = header[0];
        let username_len = header[1] as usize;

        if version != SOCKS5_AUTH_VERSION {
            return Err(Socks5Error::Format(format!(
                "invalid auth version: {version}"
            )));
        }

        if username_len == 0 {
            return Err(Socks5Error::Format("empty username".to_string()));
        }

        let username = read_exact_n(stream, username_len, "username").await?;

        let password_len = read_u8(stream, "password length").await? as usize;
        if password_len == 0 {
            return Err(Socks5Error::Format("empty password".to_string()));
        }

        let password = read_exact_n(stream, password_len, "password").await?;

        let accepted = match (std::str::from_utf8(&username), std::str::from_utf8(&password)) {
            (Ok(username), Ok(password)) => users.has_user(username, password),
            _ => false,
        };
        let username = String::from_utf8_lossy(&username);

        if accepted {
            send_auth_result(stream, SOCKS5_AUTH_SUCCESS).await?;
            debug!(user = %username, "authentication successful");
            Ok(())
        } else {
            send_auth_result(stream, SOCKS5_AUTH_FAILURE).await?;
            warn!(user = %username, "authentication failed");
            Err(Socks5Error::AuthFailed)
        }
    }
}

/// Send authentication result to client
async fn send_auth_result<S: AsyncWrite + Unpin>(
    stream: &mut S,
    status: u8,
) -> Result<(), Socks5Error> {
    reply_to(stream, &[SOCKS5_AUTH_VERSION, status]).await
}

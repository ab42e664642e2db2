//! No authentication handler
//!
//! Handles the case when no authentication is required.

use crate::error::Socks5Error;
use crate::helper::reply_to;
use crate::socks::consts::{SOCKS5_AUTH_METHOD_NONE, SOCKS5_VERSION};
use tokio::io::{AsyncRead, AsyncWrite};

/// No authentication handler
///
/// Selecting the method is the whole negotiation.
pub struct NoAuth;

impl NoAuth {
    /// Reply `[0x05, 0x00]`
    pub async fn authenticate<S>(stream: &mut S) -> Result<(), Socks5Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        reply_to(stream, &[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE]).await
    }
}

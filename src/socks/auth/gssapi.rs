//! GSSAPI placeholder
//!
//! GSSAPI can be registered so that clients offering it get an explicit
//! rejection, but the exchange itself is not supported.

use crate::error::Socks5Error;
use crate::helper::reply_to;
use crate::socks::consts::{SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE, SOCKS5_VERSION};
use tokio::io::{AsyncRead, AsyncWrite};

/// GSSAPI handler that always rejects
pub struct GssapiAuth;

impl GssapiAuth {
    /// Reply `[0x05, 0xFF]` and fail
    pub async fn authenticate<S>(stream: &mut S) -> Result<(), Socks5Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        reply_to(stream, &[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE]).await?;
        Err(Socks5Error::NoAcceptableMethod)
    }
}

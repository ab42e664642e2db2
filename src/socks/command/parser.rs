//! SOCKS5 request parser
//!
//! Parses the client's command request. No reply is sent on failure; the
//! caller closes the connection.

use crate::error::Socks5Error;
use crate::helper::read_exact_n;
use crate::socks::consts::*;
use crate::socks::types::{Address, Request};
use tokio::io::AsyncRead;

/// Parse a SOCKS5 request from the stream
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// The command byte is kept as sent; mapping it to a handler is the
/// dispatcher's job.
pub async fn parse_request<S>(stream: &mut S) -> Result<Request, Socks5Error>
where
    S: AsyncRead + Unpin,
{
    let header = read_exact_n(stream, 4, "request header").await?;
    let version = header[0];
    let command = header[1];
    let reserved = header[2];
    let addr_type = header[3];

    if version != SOCKS5_VERSION || reserved != SOCKS5_RESERVED {
        tracing::debug!(version, reserved, "bad request header");
        return Err(Socks5Error::UnsupportedVersion(version));
    }

    let address = Address::read_from(stream, addr_type).await?;

    tracing::debug!(command, %address, "parsed SOCKS5 request");

    Ok(Request::new(command, address))
}

//! SOCKS5 reply builder
//!
//! Constructs SOCKS5 reply messages.

use crate::error::{Socks5Error, Socks5ReplyCode};
use crate::helper::reply_to;
use crate::socks::consts::*;
use crate::socks::types::Address;
use tokio::io::AsyncWrite;

/// A server reply
///
/// Owns its bound address; built fresh for every reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    reply_code: Socks5ReplyCode,
    bound: Address,
}

impl Response {
    /// Create a reply carrying `bound` as BND.ADDR/BND.PORT
    pub fn new(reply_code: Socks5ReplyCode, bound: Address) -> Self {
        Response { reply_code, bound }
    }

    /// Reply code
    pub fn reply_code(&self) -> Socks5ReplyCode {
        self.reply_code
    }

    /// Bound address
    pub fn bound(&self) -> &Address {
        &self.bound
    }

    /// Encode the reply
    ///
    /// # SOCKS5 Reply Format
    ///
    /// ```text
    /// +----+-----+-------+------+----------+----------+
    /// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    /// +----+-----+-------+------+----------+----------+
    /// | 1  |  1  | X'00' |  1   | Variable |    2     |
    /// +----+-----+-------+------+----------+----------+
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut reply = Vec::with_capacity(4 + self.bound.wire_len());
        reply.push(SOCKS5_VERSION);
        reply.push(self.reply_code.into());
        reply.push(SOCKS5_RESERVED);
        reply.push(self.bound.atyp());
        reply.extend_from_slice(&self.bound.to_wire_bytes());
        reply
    }
}

/// Build reply bytes for `reply_code` and `bound`
pub fn build_reply(reply_code: Socks5ReplyCode, bound: &Address) -> Vec<u8> {
    Response::new(reply_code, bound.clone()).to_bytes()
}

/// Build and send a SOCKS5 reply
pub async fn send_reply<S>(
    stream: &mut S,
    reply_code: Socks5ReplyCode,
    bound: &Address,
) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    reply_to(stream, &build_reply(reply_code, bound)).await
}

/// Send a success reply
pub async fn send_success<S>(stream: &mut S, bound: &Address) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, Socks5ReplyCode::Succeeded, bound).await
}

/// Send a "host unreachable" reply with the zero address
pub async fn send_host_unreachable<S>(stream: &mut S) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, Socks5ReplyCode::HostUnreachable, &Address::zero()).await
}

/// Send a "command not supported" reply with the zero address
pub async fn send_command_not_supported<S>(stream: &mut S) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, Socks5ReplyCode::CommandNotSupported, &Address::zero()).await
}

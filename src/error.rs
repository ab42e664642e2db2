//! Error types for socks5d
//!
//! The protocol engine reports failures through [`Socks5Error`]. Whether a
//! failure gets a wire reply is decided where it is raised; the supervisor
//! only logs it and closes the connection.

use std::io;
use thiserror::Error;

/// SOCKS5 protocol engine errors
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// IO error on the underlying stream or socket
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream before a complete field arrived
    #[error("Truncated read: expected {expected} bytes of {context}")]
    Truncated {
        /// Number of bytes the field needed
        expected: usize,
        /// Which field was being read
        context: &'static str,
    },

    /// The stream accepted fewer bytes than the message length
    #[error("Short write: stream closed while writing reply")]
    ShortWrite,

    /// Unsupported SOCKS version or non-zero reserved byte
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Malformed message
    #[error("Unsupported format: {0}")]
    Format(String),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Authentication failed
    #[error("Authentication failed")]
    AuthFailed,

    /// Command byte outside CONNECT/BIND/UDP ASSOCIATE
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u8),

    /// Address type not supported
    #[error("Unsupported address type: {0}")]
    UnsupportedAddressType(u8),

    /// Invalid address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Recognised but unimplemented feature
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Deadline expired
    #[error("Timeout: {0}")]
    Timeout(&'static str),
}

impl Socks5Error {
    /// Whether the error came from the transport rather than the peer's bytes
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Socks5Error::Io(_)
                | Socks5Error::Truncated { .. }
                | Socks5Error::ShortWrite
                | Socks5Error::Timeout(_)
        )
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = Socks5Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            _ => Err(Socks5Error::Format(format!("unknown reply code {value}"))),
        }
    }
}

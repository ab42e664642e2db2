//! SOCKS5 type definitions
//!
//! The address model shared by requests, replies and UDP datagrams, plus the
//! parsed client request.

use super::consts::*;
use crate::error::Socks5Error;
use crate::helper::{read_exact_n, read_u8};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (not implemented)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// SOCKS5 address
///
/// One of the three wire variants. The ATYP byte is derived from the variant
/// and the domain length prefix is re-added on encode, so the in-memory value
/// only ever holds the name itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IPv4 address with port
    Ipv4(Ipv4Addr, u16),
    /// Domain name (1 to 255 bytes, no length prefix) with port
    Domain(String, u16),
    /// IPv6 address with port
    Ipv6(Ipv6Addr, u16),
}

impl Address {
    /// The IPv4 zero address `0.0.0.0:0`
    pub const fn zero() -> Self {
        Address::Ipv4(Ipv4Addr::UNSPECIFIED, 0)
    }

    /// Create a domain address, checking the length fits the wire prefix
    pub fn domain(name: impl Into<String>, port: u16) -> Result<Self, Socks5Error> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
            return Err(Socks5Error::InvalidAddress(format!(
                "domain length {} outside 1..={}",
                name.len(),
                MAX_DOMAIN_LEN
            )));
        }
        Ok(Address::Domain(name, port))
    }

    /// Parse a `host:port` string where host is an IPv4 or IPv6 literal
    ///
    /// Never performs DNS resolution. IPv6 hosts use the bracketed form
    /// `[::1]:80`.
    pub fn parse_host_port(text: &str) -> Result<Self, Socks5Error> {
        text.parse::<SocketAddr>()
            .map(Address::from)
            .map_err(|e| Socks5Error::InvalidAddress(format!("{text}: {e}")))
    }

    /// Decode the DST.ADDR/DST.PORT bytes that follow an ATYP byte
    ///
    /// `raw` must hold exactly one address: 6 bytes for IPv4, 18 for IPv6,
    /// and for domains a length prefix followed by `length + 2` bytes.
    pub fn decode_from_wire(atyp: u8, raw: &[u8]) -> Result<Self, Socks5Error> {
        let (addr, consumed) = Self::decode_prefix(atyp, raw)?;
        if consumed != raw.len() {
            return Err(Socks5Error::InvalidAddress(format!(
                "{} trailing bytes after address",
                raw.len() - consumed
            )));
        }
        Ok(addr)
    }

    /// Decode an address from the front of `buf`, returning it with the
    /// number of bytes consumed
    pub fn decode_prefix(atyp: u8, buf: &[u8]) -> Result<(Self, usize), Socks5Error> {
        match atyp {
            SOCKS5_ADDR_TYPE_IPV4 => {
                let raw = take(buf, 6, "IPv4 address")?;
                let ip = Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]);
                Ok((Address::Ipv4(ip, port_from(&raw[4..6])), 6))
            }
            SOCKS5_ADDR_TYPE_DOMAIN => {
                let (&len, rest) = buf.split_first().ok_or(Socks5Error::Truncated {
                    expected: 1,
                    context: "domain length",
                })?;
                let len = len as usize;
                let raw = take(rest, len + 2, "domain address")?;
                let name = std::str::from_utf8(&raw[..len])
                    .map_err(|e| Socks5Error::InvalidAddress(format!("domain not UTF-8: {e}")))?;
                let addr = Address::domain(name, port_from(&raw[len..len + 2]))?;
                Ok((addr, 1 + len + 2))
            }
            SOCKS5_ADDR_TYPE_IPV6 => {
                let raw = take(buf, 18, "IPv6 address")?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&raw[..16]);
                Ok((
                    Address::Ipv6(Ipv6Addr::from(octets), port_from(&raw[16..18])),
                    18,
                ))
            }
            other => Err(Socks5Error::UnsupportedAddressType(other)),
        }
    }

    /// Read an address of type `atyp` from a stream
    ///
    /// Reads exactly as many bytes as the address type needs, including the
    /// extra length byte for domains.
    pub async fn read_from<S>(stream: &mut S, atyp: u8) -> Result<Self, Socks5Error>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        let raw = match atyp {
            SOCKS5_ADDR_TYPE_IPV4 => read_exact_n(stream, 4 + 2, "IPv4 address").await?,
            SOCKS5_ADDR_TYPE_IPV6 => read_exact_n(stream, 16 + 2, "IPv6 address").await?,
            SOCKS5_ADDR_TYPE_DOMAIN => {
                let len = read_u8(stream, "domain length").await?;
                let mut raw = Vec::with_capacity(len as usize + 3);
                raw.push(len);
                let rest = read_exact_n(stream, len as usize + 2, "domain address").await?;
                raw.extend_from_slice(&rest);
                raw
            }
            other => return Err(Socks5Error::UnsupportedAddressType(other)),
        };
        Self::decode_from_wire(atyp, &raw)
    }

    /// ATYP byte for this variant
    pub fn atyp(&self) -> u8 {
        match self {
            Address::Ipv4(..) => SOCKS5_ADDR_TYPE_IPV4,
            Address::Domain(..) => SOCKS5_ADDR_TYPE_DOMAIN,
            Address::Ipv6(..) => SOCKS5_ADDR_TYPE_IPV6,
        }
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            Address::Ipv4(_, port) | Address::Domain(_, port) | Address::Ipv6(_, port) => *port,
        }
    }

    /// Encode DST.ADDR/DST.PORT (without the ATYP byte)
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        match self {
            Address::Ipv4(ip, port) => {
                bytes.extend_from_slice(&ip.octets());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
            Address::Domain(name, port) => {
                bytes.push(name.len() as u8);
                bytes.extend_from_slice(name.as_bytes());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
            Address::Ipv6(ip, port) => {
                bytes.extend_from_slice(&ip.octets());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
        }
        bytes
    }

    /// Encode ATYP followed by DST.ADDR/DST.PORT
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.wire_len());
        bytes.push(self.atyp());
        bytes.extend_from_slice(&self.to_wire_bytes());
        bytes
    }

    /// Length of [`Address::to_wire_bytes`]
    pub fn wire_len(&self) -> usize {
        match self {
            Address::Ipv4(..) => 4 + 2,
            Address::Domain(name, _) => 1 + name.len() + 2,
            Address::Ipv6(..) => 16 + 2,
        }
    }

    /// Whether this is an all-zero IP address with port 0
    pub fn is_unspecified(&self) -> bool {
        match self {
            Address::Ipv4(ip, port) => ip.is_unspecified() && *port == 0,
            Address::Ipv6(ip, port) => ip.is_unspecified() && *port == 0,
            Address::Domain(..) => false,
        }
    }

    /// The socket address for IP variants, `None` for domains
    pub fn as_socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Address::Ipv4(ip, port) => Some(SocketAddr::V4(SocketAddrV4::new(*ip, *port))),
            Address::Ipv6(ip, port) => Some(SocketAddr::V6(SocketAddrV6::new(*ip, *port, 0, 0))),
            Address::Domain(..) => None,
        }
    }

    /// Resolve the address to a SocketAddr
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this performs DNS resolution.
    pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
        match self {
            Address::Ipv4(ip, port) => Ok(SocketAddr::from((*ip, *port))),
            Address::Ipv6(ip, port) => Ok(SocketAddr::from((*ip, *port))),
            Address::Domain(name, port) => tokio::net::lookup_host((name.as_str(), *port))
                .await?
                .next()
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no addresses found for domain: {name}"),
                    )
                }),
        }
    }
}

/// Slice `n` bytes off the front of `buf` or report truncation
fn take<'a>(buf: &'a [u8], n: usize, context: &'static str) -> Result<&'a [u8], Socks5Error> {
    buf.get(..n)
        .ok_or(Socks5Error::Truncated { expected: n, context })
}

fn port_from(raw: &[u8]) -> u16 {
    u16::from_be_bytes([raw[0], raw[1]])
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            Address::Domain(name, port) => write!(f, "{}:{}", name, port),
            Address::Ipv6(ip, port) => write!(f, "[{}]:{}", ip, port),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Address::Ipv4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Address::Ipv6(*v6.ip(), v6.port()),
        }
    }
}

impl From<(IpAddr, u16)> for Address {
    fn from((ip, port): (IpAddr, u16)) -> Self {
        Address::from(SocketAddr::new(ip, port))
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::zero()
    }
}

/// Parsed client request
///
/// Immutable once parsed. The optional cancellation token is tied to the
/// control connection and stops any UDP relay started for this request.
#[derive(Debug, Clone)]
pub struct Request {
    command: u8,
    address: Address,
    cancel: Option<CancellationToken>,
}

impl Request {
    /// Create a request from a raw command byte and target address
    pub fn new(command: u8, address: Address) -> Self {
        Request {
            command,
            address,
            cancel: None,
        }
    }

    /// Attach the control connection's cancellation token
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Raw command byte as sent by the client
    pub fn command_byte(&self) -> u8 {
        self.command
    }

    /// Command, if the byte is one of the known commands
    pub fn command(&self) -> Option<SocksCommand> {
        SocksCommand::from_byte(self.command)
    }

    /// DST.ADDR/DST.PORT of the request
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Token cancelled when the control connection ends
    ///
    /// Requests built without one get a fresh token that is never cancelled
    /// from outside.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone().unwrap_or_else(CancellationToken::new)
    }
}

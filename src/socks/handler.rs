//! Command dispatcher
//!
//! Runs the handshake (method negotiation, then the request) and routes the
//! parsed request to its command handler.

use crate::error::Socks5Error;
use crate::socks::auth::{authenticate, AuthRegistry};
use crate::socks::command::{parse_request, send_command_not_supported};
use crate::socks::consts::SOCKS5_CMD_UDP_ASSOCIATE;
use crate::socks::tcp_relay::handle_tcp_connect;
use crate::socks::types::{Request, SocksCommand};
use crate::socks::udp::{handle_udp_associate, UDP_REPLY_TIMEOUT_SECS};
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Default CONNECT dial timeout in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Per-command settings
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Bound on dialing a CONNECT target
    pub connect_timeout: Duration,
    /// Bound on waiting for a UDP target's reply
    pub udp_reply_timeout: Duration,
    /// Whether UDP ASSOCIATE is served
    pub allow_udp: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        CommandOptions {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            udp_reply_timeout: Duration::from_secs(UDP_REPLY_TIMEOUT_SECS),
            allow_udp: true,
        }
    }
}

/// Authenticate the client and read its request
///
/// # Protocol Flow
///
/// 1. Method negotiation
/// 2. Method sub-negotiation (if the selected method has one)
/// 3. Request parsing
///
/// Authentication always completes before the request is read.
pub async fn handshake<S>(stream: &mut S, registry: &AuthRegistry) -> Result<Request, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let method = authenticate(stream, registry).await?;
    debug!(%method, "authentication completed");

    let request = parse_request(stream).await?;
    Ok(request)
}

/// Route a parsed request to its handler
///
/// Unknown commands and BIND are answered with `commandNotSupported` and the
/// zero address before failing. `local_ip` is the control connection's local
/// address, used to bind the UDP relay socket.
pub async fn dispatch<S>(
    stream: &mut S,
    request: &Request,
    local_ip: IpAddr,
    options: &CommandOptions,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let command = match request.command() {
        Some(command) => command,
        None => {
            warn!(command = request.command_byte(), "unsupported SOCKS5 command");
            send_command_not_supported(stream).await?;
            return Err(Socks5Error::UnsupportedCommand(request.command_byte()));
        }
    };

    info!(%command, target = %request.address(), "SOCKS5 request");

    match command {
        SocksCommand::Connect => {
            handle_tcp_connect(stream, request.address(), options.connect_timeout).await
        }
        SocksCommand::UdpAssociate if options.allow_udp => {
            handle_udp_associate(stream, request, local_ip, options.udp_reply_timeout).await
        }
        SocksCommand::UdpAssociate => {
            warn!("UDP ASSOCIATE not allowed by configuration");
            send_command_not_supported(stream).await?;
            Err(Socks5Error::UnsupportedCommand(SOCKS5_CMD_UDP_ASSOCIATE))
        }
        SocksCommand::Bind => {
            warn!("BIND command not supported");
            send_command_not_supported(stream).await?;
            Err(Socks5Error::NotImplemented("BIND"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::consts::*;
    use crate::socks::types::Address;
    use std::net::Ipv4Addr;
    use tokio_test::io::Builder;

    const NOT_SUPPORTED_REPLY: [u8; 10] = [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

    fn localhost() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    // Helper to create a mock SOCKS5 handshake
    fn create_socks5_handshake(auth_method: u8, command: u8, addr: &[u8]) -> Vec<u8> {
        let mut data = vec![SOCKS5_VERSION, 1, auth_method];
        data.extend_from_slice(&[SOCKS5_VERSION, command, SOCKS5_RESERVED]);
        data.extend_from_slice(addr);
        data
    }

    #[tokio::test]
    async fn test_handshake_no_auth() {
        let target = Address::Ipv4(Ipv4Addr::new(127, 0, 0, 1), 8080);
        let bytes = create_socks5_handshake(
            SOCKS5_AUTH_METHOD_NONE,
            SOCKS5_CMD_TCP_CONNECT,
            &target.to_bytes(),
        );
        let mut stream = Builder::new()
            .read(&bytes[..3])
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .read(&bytes[3..])
            .build();

        let request = handshake(&mut stream, &AuthRegistry::no_auth())
            .await
            .unwrap();
        assert_eq!(request.command(), Some(SocksCommand::Connect));
        assert_eq!(request.address(), &target);
    }

    #[tokio::test]
    async fn test_handshake_stops_after_rejected_method() {
        // the request bytes are never read
        let mut stream = Builder::new()
            .read(&[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_PASSWORD])
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE])
            .build();

        let err = handshake(&mut stream, &AuthRegistry::no_auth())
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::NoAcceptableMethod));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_command() {
        let mut stream = Builder::new().write(&NOT_SUPPORTED_REPLY).build();
        let request = Request::new(0x09, Address::zero());

        let err = dispatch(&mut stream, &request, localhost(), &CommandOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::UnsupportedCommand(0x09)));
    }

    #[tokio::test]
    async fn test_dispatch_bind_not_implemented() {
        let mut stream = Builder::new().write(&NOT_SUPPORTED_REPLY).build();
        let request = Request::new(SOCKS5_CMD_TCP_BIND, Address::zero());

        let err = dispatch(&mut stream, &request, localhost(), &CommandOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Socks5Error::NotImplemented("BIND")));
    }

    #[tokio::test]
    async fn test_dispatch_udp_disabled() {
        let mut stream = Builder::new().write(&NOT_SUPPORTED_REPLY).build();
        let request = Request::new(SOCKS5_CMD_UDP_ASSOCIATE, Address::zero());
        let options = CommandOptions {
            allow_udp: false,
            ..CommandOptions::default()
        };

        let err = dispatch(&mut stream, &request, localhost(), &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Socks5Error::UnsupportedCommand(SOCKS5_CMD_UDP_ASSOCIATE)
        ));
    }

    #[test]
    fn test_command_options_default() {
        let options = CommandOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.udp_reply_timeout, Duration::from_secs(120));
        assert!(options.allow_udp);
    }
}

//! UDP relay for SOCKS5 UDP ASSOCIATE
//!
//! One bound UDP socket per association. Client datagrams are unwrapped and
//! forwarded to their target, and the target's reply is wrapped and sent
//! back. The loop ends only when its cancellation token fires.

use super::Datagram;
use crate::error::Socks5Error;
use crate::socks::command::send_success;
use crate::socks::consts::MAX_UDP_PACKET;
use crate::socks::tcp_relay::wait_for_close;
use crate::socks::types::{Address, Request};
use bytes::Bytes;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default bound on waiting for a target's reply, in seconds
pub const UDP_REPLY_TIMEOUT_SECS: u64 = 120;

/// What happened to one received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketOutcome {
    Relayed,
    NoReply,
    Dropped,
}

/// Relay state for one UDP association
pub struct UdpRelay {
    socket: UdpSocket,
    /// Client address declared in the request; zero fields match anything
    client: Address,
    reply_timeout: Duration,
    cancel: CancellationToken,
}

impl UdpRelay {
    /// Create a relay over an already bound socket
    pub fn new(socket: UdpSocket, client: Address, cancel: CancellationToken) -> Self {
        UdpRelay {
            socket,
            client,
            reply_timeout: Duration::from_secs(UDP_REPLY_TIMEOUT_SECS),
            cancel,
        }
    }

    /// Set the bound on waiting for a target's reply
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Local address of the relay socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the relay loop until cancelled
    ///
    /// # Protocol
    ///
    /// 1. Receive a packet from the client
    /// 2. Drop it if it does not come from the declared client address
    /// 3. Parse the SOCKS5 UDP header, dropping malformed or fragmented packets
    /// 4. Send the payload to the target
    /// 5. Wait for one reply from the target
    /// 6. Wrap the reply with the original target address and send it to the
    ///    client
    ///
    /// Per-packet failures are logged and the loop continues. The socket is
    /// released when this returns.
    pub async fn run(self) -> Result<(), Socks5Error> {
        let mut buf = vec![0u8; MAX_UDP_PACKET];
        let mut reply_buf = vec![0u8; MAX_UDP_PACKET];

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, source) = match received {
                Ok(received) => received,
                Err(e) => {
                    warn!(err = %e, "UDP receive failed");
                    continue;
                }
            };

            match self.relay_packet(&buf[..len], source, &mut reply_buf).await {
                Ok(outcome) => debug!(%source, ?outcome, "UDP packet handled"),
                Err(e) => warn!(%source, err = %e, "UDP relay error"),
            }
        }

        debug!("UDP relay cancelled");
        Ok(())
    }

    async fn relay_packet(
        &self,
        packet: &[u8],
        source: SocketAddr,
        reply_buf: &mut [u8],
    ) -> Result<PacketOutcome, Socks5Error> {
        if !self.accepts_source(source) {
            warn!(%source, client = %self.client, "dropping UDP packet from unexpected source");
            return Ok(PacketOutcome::Dropped);
        }

        let datagram = match Datagram::parse(packet) {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!(%source, err = %e, "dropping invalid SOCKS5 UDP packet");
                return Ok(PacketOutcome::Dropped);
            }
        };

        let target = datagram.address.resolve().await?;
        self.socket.send_to(&datagram.payload, target).await?;
        debug!(%target, bytes = datagram.payload.len(), "UDP relay: sent");

        let reply_len = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(PacketOutcome::NoReply),
            reply = tokio::time::timeout(
                self.reply_timeout,
                self.recv_reply(reply_buf, target),
            ) => match reply {
                Ok(reply) => reply?,
                Err(_) => {
                    debug!(%target, "UDP response timeout");
                    return Ok(PacketOutcome::NoReply);
                }
            },
        };

        let reply = Datagram::new(
            datagram.address,
            Bytes::copy_from_slice(&reply_buf[..reply_len]),
        );
        self.socket.send_to(&reply.encode(), source).await?;
        Ok(PacketOutcome::Relayed)
    }

    /// Receive the next datagram sent by `target`
    async fn recv_reply(&self, buf: &mut [u8], target: SocketAddr) -> io::Result<usize> {
        loop {
            let (len, from) = self.socket.recv_from(buf).await?;
            if from == target {
                return Ok(len);
            }
            debug!(%from, %target, "ignoring datagram while awaiting reply");
        }
    }

    /// Whether a packet source matches the declared client address
    ///
    /// An unspecified IP or a zero port in the declared address matches any
    /// value. A domain name never matches a socket address, so only its port
    /// is compared.
    fn accepts_source(&self, source: SocketAddr) -> bool {
        if self.client.is_unspecified() {
            return true;
        }
        let ip_matches = match self.client.as_socket_addr() {
            Some(declared) => declared.ip().is_unspecified() || declared.ip() == source.ip(),
            None => true,
        };
        let port = self.client.port();
        ip_matches && (port == 0 || port == source.port())
    }
}

/// Bind a relay socket on the wildcard address of `local_ip`'s family
///
/// Returns the socket with the address to advertise: `local_ip` and the
/// socket's ephemeral port. Binding the wildcard lets the socket reach
/// targets off the control connection's interface.
async fn bind_relay_socket(local_ip: IpAddr) -> io::Result<(UdpSocket, Address)> {
    let wildcard = match local_ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let socket = UdpSocket::bind(SocketAddr::new(wildcard, 0)).await?;
    let port = socket.local_addr()?.port();
    Ok((socket, Address::from((local_ip, port))))
}

/// Handle UDP ASSOCIATE command
///
/// Binds a UDP relay socket, replies with `local_ip` and its port, and
/// relays until the control stream closes or the request's
/// cancellation token fires, whichever comes first.
pub async fn handle_udp_associate<S>(
    control: &mut S,
    request: &Request,
    local_ip: IpAddr,
    reply_timeout: Duration,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (socket, bound) = bind_relay_socket(local_ip).await?;
    let cancel = request.cancel_token();
    let relay = UdpRelay::new(socket, request.address().clone(), cancel.clone())
        .with_reply_timeout(reply_timeout);

    send_success(control, &bound).await?;

    info!(%bound, client = %request.address(), "UDP association established");

    let watcher = async {
        let result = tokio::select! {
            result = wait_for_close(control) => result,
            _ = cancel.cancelled() => Ok(()),
        };
        debug!("control connection closed");
        cancel.cancel();
        result
    };

    let (relay_result, watch_result) = tokio::join!(relay.run(), watcher);
    relay_result?;
    watch_result?;
    Ok(())
}

//! TCP relay for SOCKS5 CONNECT command
//!
//! Dials the target, answers the client, then pumps bytes both ways until
//! both directions are done.

use crate::error::Socks5Error;
use crate::helper::DEFAULT_BUFFER_SIZE;
use crate::socks::command::{send_host_unreachable, send_success};
use crate::socks::types::Address;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle TCP CONNECT command
///
/// A failed or timed-out dial is answered with `hostUnreachable` and the
/// zero address before the error is returned. On success the client gets
/// the outbound socket's local address and the relay runs to completion.
pub async fn handle_tcp_connect<S>(
    client_stream: &mut S,
    target: &Address,
    connect_timeout: Duration,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(%target, "connecting to target");

    let target_stream = match tokio::time::timeout(connect_timeout, dial(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(%target, err = %e, "failed to connect to target");
            send_host_unreachable(client_stream).await?;
            return Err(e.into());
        }
        Err(_) => {
            warn!(%target, "connection timeout");
            send_host_unreachable(client_stream).await?;
            return Err(Socks5Error::Timeout("connect"));
        }
    };

    let bound = Address::from(target_stream.local_addr()?);
    send_success(client_stream, &bound).await?;

    info!(%target, %bound, "SOCKS5 tunnel established");

    let (sent, received) = relay_tcp(client_stream, target_stream).await?;
    debug!(%target, sent, received, "tunnel closed");
    Ok(())
}

async fn dial(target: &Address) -> io::Result<TcpStream> {
    match target {
        Address::Domain(name, port) => TcpStream::connect((name.as_str(), *port)).await,
        Address::Ipv4(ip, port) => TcpStream::connect((*ip, *port)).await,
        Address::Ipv6(ip, port) => TcpStream::connect((*ip, *port)).await,
    }
}

/// Relay data bidirectionally between two streams
///
/// Each direction copies until end-of-stream, then shuts down its writer so
/// the peer sees the half-close. An error in one direction aborts the
/// other, and the aborted direction ends without an error, so the error
/// returned is the one that triggered the abort. If both directions fail on
/// their own, the `a -> b` error is returned. Returns the byte counts
/// `(a -> b, b -> a)`.
pub async fn relay_tcp<A, B>(a: A, b: B) -> Result<(u64, u64), Socks5Error>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    let abort = CancellationToken::new();

    let (a_to_b, b_to_a) = tokio::join!(
        copy_half(&mut a_read, &mut b_write, &abort, "a->b"),
        copy_half(&mut b_read, &mut a_write, &abort, "b->a"),
    );

    Ok((a_to_b?, b_to_a?))
}

async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    abort: &CancellationToken,
    direction: &'static str,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = tokio::select! {
        result = tokio::io::copy(reader, writer) => result,
        _ = abort.cancelled() => {
            debug!(direction, "aborted");
            return Ok(0);
        }
    };

    match result {
        Ok(bytes) => {
            debug!(direction, bytes, "finished");
            if let Err(e) = writer.shutdown().await {
                debug!(direction, err = %e, "shutdown failed");
            }
            Ok(bytes)
        }
        Err(e) => {
            debug!(direction, err = %e, "error");
            abort.cancel();
            Err(e)
        }
    }
}

/// Drain a stream until end-of-stream or error
///
/// Used to watch a control connection whose only remaining job is to stay
/// open.
pub async fn wait_for_close<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; DEFAULT_BUFFER_SIZE];
    loop {
        if stream.read(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}

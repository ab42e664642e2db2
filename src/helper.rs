//! Wire I/O helpers
//!
//! Exact-length reads and single-shot writes over a byte stream. A peer that
//! closes mid-field surfaces as [`Socks5Error::Truncated`], a stream that
//! stops accepting bytes as [`Socks5Error::ShortWrite`], so callers can tell
//! them apart from other IO failures.

use crate::error::Socks5Error;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default buffer size for IO operations
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Read exactly `n` bytes into a fresh buffer
///
/// `context` names the field being read and ends up in the truncation error.
pub async fn read_exact_n<S>(
    stream: &mut S,
    n: usize,
    context: &'static str,
) -> Result<Vec<u8>, Socks5Error>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; n];
    read_into(stream, &mut buf, context).await?;
    Ok(buf)
}

/// Read exactly one byte
pub async fn read_u8<S>(stream: &mut S, context: &'static str) -> Result<u8, Socks5Error>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; 1];
    read_into(stream, &mut buf, context).await?;
    Ok(buf[0])
}

/// Fill `buf` completely from the stream
pub async fn read_into<S>(
    stream: &mut S,
    buf: &mut [u8],
    context: &'static str,
) -> Result<(), Socks5Error>
where
    S: AsyncRead + Unpin + ?Sized,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Socks5Error::Truncated {
            expected: buf.len(),
            context,
        }),
        Err(e) => Err(e.into()),
    }
}

/// Write a complete message and flush it
pub async fn reply_to<S>(stream: &mut S, message: &[u8]) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    match stream.write_all(message).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::WriteZero => return Err(Socks5Error::ShortWrite),
        Err(e) => return Err(e.into()),
    }
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_read_exact_n() {
        let mut cursor = Cursor::new(vec![1, 2, 3, 4]);
        let buf = read_exact_n(&mut cursor, 3, "test").await.unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
        assert_eq!(read_u8(&mut cursor, "test").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_read_exact_n_truncated() {
        let mut cursor = Cursor::new(vec![1, 2]);
        let err = read_exact_n(&mut cursor, 6, "IPv4 address")
            .await
            .unwrap_err();
        match err {
            Socks5Error::Truncated { expected, context } => {
                assert_eq!(expected, 6);
                assert_eq!(context, "IPv4 address");
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_u8_empty_stream() {
        let mut cursor = Cursor::new(Vec::new());
        let err = read_u8(&mut cursor, "length").await.unwrap_err();
        assert!(matches!(err, Socks5Error::Truncated { expected: 1, .. }));
    }

    #[tokio::test]
    async fn test_reply_to() {
        let mut buffer = Vec::new();
        reply_to(&mut buffer, &[0x05, 0x00]).await.unwrap();
        assert_eq!(buffer, vec![0x05, 0x00]);
    }

    #[tokio::test]
    async fn test_reply_to_full_buffer_is_short_write() {
        let mut storage = [0u8; 1];
        let mut cursor = Cursor::new(&mut storage[..]);
        let err = reply_to(&mut cursor, &[0x05, 0x00]).await.unwrap_err();
        assert!(matches!(err, Socks5Error::ShortWrite));
    }
}

//! UDP packet encoding/decoding for SOCKS5
//!
//! Handles the encapsulation header carried by every relayed datagram.

use crate::error::Socks5Error;
use crate::socks::consts::*;
use crate::socks::types::Address;
use bytes::{BufMut, Bytes, BytesMut};

/// Fixed part of the header: RSV (2) + FRAG (1) + ATYP (1)
const HEADER_LEN: usize = 4;

/// A SOCKS5 UDP relay datagram
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
///
/// Fragmentation is not supported, so FRAG is not represented: decoding
/// rejects anything but `0x00` and encoding always writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Target address (client to relay) or addressed sender (relay to client)
    pub address: Address,
    /// Packet data
    pub payload: Bytes,
}

impl Datagram {
    /// Create a new datagram
    pub fn new(address: Address, payload: impl Into<Bytes>) -> Self {
        Datagram {
            address,
            payload: payload.into(),
        }
    }

    /// Parse a datagram from a received packet
    ///
    /// The address and payload are copied out of `data`, so the receive
    /// buffer can be reused immediately.
    pub fn parse(data: &[u8]) -> Result<Self, Socks5Error> {
        if data.len() < HEADER_LEN {
            return Err(Socks5Error::Truncated {
                expected: HEADER_LEN,
                context: "UDP header",
            });
        }

        let rsv = u16::from_be_bytes([data[0], data[1]]);
        if rsv != 0 {
            return Err(Socks5Error::Format(format!("invalid RSV field: {rsv}")));
        }

        let frag = data[2];
        if frag != SOCKS5_UDP_FRAG_NONE {
            return Err(Socks5Error::NotImplemented("UDP fragmentation"));
        }

        let atyp = data[3];
        let (address, consumed) = Address::decode_prefix(atyp, &data[HEADER_LEN..])?;
        let payload = Bytes::copy_from_slice(&data[HEADER_LEN + consumed..]);

        Ok(Datagram { address, payload })
    }

    /// Encode the datagram
    pub fn encode(&self) -> Bytes {
        let capacity = HEADER_LEN + self.address.wire_len() + self.payload.len();
        let mut buf = BytesMut::with_capacity(capacity);
        buf.put_u16(0);
        buf.put_u8(SOCKS5_UDP_FRAG_NONE);
        buf.put_u8(self.address.atyp());
        buf.put_slice(&self.address.to_wire_bytes());
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

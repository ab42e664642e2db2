//! UDP ASSOCIATE module for SOCKS5
//!
//! Handles UDP ASSOCIATE requests by relaying datagrams through a locally
//! bound UDP socket.

mod packet;
mod relay;

pub use packet::Datagram;
pub use relay::{handle_udp_associate, UdpRelay, UDP_REPLY_TIMEOUT_SECS};

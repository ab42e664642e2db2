//! SOCKS5 protocol engine
//!
//! Method negotiation, request framing and the CONNECT and UDP ASSOCIATE
//! relays. Everything here works on a generic byte stream; accepting
//! connections is the server's job.

mod auth;
mod command;
mod consts;
mod handler;
mod tcp_relay;
mod types;
mod udp;

pub use auth::{
    authenticate, AuthMethod, AuthRegistry, GssapiAuth, NoAuth, PasswordAuth, StaticUserStore,
    UserStore,
};
pub use command::{build_reply, parse_request, send_reply, Response};
pub use consts::*;
pub use handler::{dispatch, handshake, CommandOptions, CONNECT_TIMEOUT_SECS};
pub use tcp_relay::{handle_tcp_connect, relay_tcp};
pub use types::{Address, Request, SocksCommand};
pub use udp::{handle_udp_associate, Datagram, UdpRelay, UDP_REPLY_TIMEOUT_SECS};

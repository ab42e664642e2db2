//! # socks5d - SOCKS5 Proxy Server
//!
//! socks5d is a SOCKS5 server (RFC 1928) with username/password
//! authentication (RFC 1929). It relays TCP streams for CONNECT and
//! datagrams for UDP ASSOCIATE.
//!
//! ## Features
//!
//! - **Method Negotiation**: no-auth and username/password, picked in the
//!   client's preference order; GSSAPI is advertised as rejected
//! - **CONNECT**: bidirectional stream relay with half-close propagation
//! - **UDP ASSOCIATE**: per-association UDP relay whose lifetime is bound to
//!   the control connection
//! - **Handshake Deadline**: slow clients are dropped before they can pin a
//!   connection task
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socks5d::config::load_config;
//! use socks5d::server::Server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     Server::bind(&config.server).await?.run(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Server -> handshake (auth, request) -> dispatch -> CONNECT relay
//!                                                 -> UDP relay
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{Socks5Error, Socks5ReplyCode};
pub use server::Server;

/// Version of the socks5d library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Test utilities for socks5d
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use socks5d::config::{AuthConfig, ServerConfig, UserEntry};
use socks5d::socks::{Address, AuthMethod};
use socks5d::Server;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;

/// Username accepted by servers built with [`TestServerBuilder::with_password`]
pub const TEST_USER: &str = "admin";
/// Password accepted by servers built with [`TestServerBuilder::with_password`]
pub const TEST_PASSWORD: &str = "password";

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Spawn a TCP echo server, returning its address
pub async fn spawn_tcp_echo() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Spawn a UDP echo server, returning its address
pub async fn spawn_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..len], from).await;
        }
    });
    addr
}

/// A running server; dropping it shuts the server down
pub struct TestServer {
    /// Listener address
    pub addr: SocketAddr,
    _shutdown_tx: broadcast::Sender<bool>,
}

impl TestServer {
    /// Open a control connection
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

/// Test server builder
pub struct TestServerBuilder {
    config: ServerConfig,
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        TestServerBuilder {
            config: ServerConfig {
                listen_addr: "127.0.0.1:0".to_string(),
                connect_timeout: 2,
                udp_reply_timeout: 2,
                ..Default::default()
            },
        }
    }
}

impl TestServerBuilder {
    /// Create a new test server builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enabled authentication methods
    pub fn methods(mut self, methods: &[AuthMethod]) -> Self {
        self.config.auth.methods = methods.to_vec();
        self
    }

    /// Require username/password with the test credentials
    pub fn with_password(mut self) -> Self {
        self.config.auth = AuthConfig {
            methods: vec![AuthMethod::UsernamePassword],
            users: vec![UserEntry {
                username: TEST_USER.to_string(),
                password: TEST_PASSWORD.to_string(),
            }],
        };
        self
    }

    /// Allow UDP
    pub fn allow_udp(mut self, allow: bool) -> Self {
        self.config.allow_udp = allow;
        self
    }

    /// Set the handshake deadline in seconds
    pub fn handshake_timeout(mut self, secs: u64) -> Self {
        self.config.handshake_timeout = secs;
        self
    }

    /// Bind and start the server
    pub async fn start(self) -> TestServer {
        let server = Server::bind(&self.config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(server.run(shutdown_rx));
        TestServer {
            addr,
            _shutdown_tx: shutdown_tx,
        }
    }
}

/// Read a server reply, returning the reply code and bound address
pub async fn read_reply(stream: &mut TcpStream) -> (u8, Address) {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(header[0], 0x05, "reply version");
    assert_eq!(header[2], 0x00, "reply reserved byte");
    let bound = Address::read_from(stream, header[3]).await.unwrap();
    (header[1], bound)
}

/// Whether the server closed the stream without sending anything more
pub async fn closed_without_reply(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    matches!(
        tokio::time::timeout(std::time::Duration::from_secs(3), stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

/// Complete a no-auth negotiation
pub async fn negotiate_no_auth(stream: &mut TcpStream) {
    stream
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00]);
}

/// Send a request and read the reply
pub async fn request(stream: &mut TcpStream, command: u8, target: &Address) -> (u8, Address) {
    stream
        .write_all(&socks5_mock::create_request(command, target))
        .await
        .unwrap();
    read_reply(stream).await
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use socks5d::socks::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a method selection request offering `methods`
    pub fn create_auth_request(methods: &[u8]) -> Vec<u8> {
        let mut request = vec![SOCKS5_VERSION, methods.len() as u8];
        request.extend_from_slice(methods);
        request
    }

    /// Create a username/password sub-negotiation request
    pub fn create_credentials(username: &str, password: &str) -> Vec<u8> {
        let mut request = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        request.extend_from_slice(username.as_bytes());
        request.push(password.len() as u8);
        request.extend_from_slice(password.as_bytes());
        request
    }

    /// Create a command request
    pub fn create_request(command: u8, target: &Address) -> Vec<u8> {
        let mut request = vec![SOCKS5_VERSION, command, SOCKS5_RESERVED];
        request.extend_from_slice(&target.to_bytes());
        request
    }
}

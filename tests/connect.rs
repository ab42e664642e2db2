//! End-to-end CONNECT tests against a running server

mod common;

use common::*;
use socks5d::socks::{Address, SOCKS5_CMD_TCP_BIND, SOCKS5_CMD_TCP_CONNECT};
use std::net::Ipv4Addr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn test_connect_relays_both_ways() {
    let echo_addr = spawn_tcp_echo().await;
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    let target = Address::from(echo_addr);
    let (rep, bound) = request(&mut client, SOCKS5_CMD_TCP_CONNECT, &target).await;
    assert_eq!(rep, 0x00);
    match bound {
        Address::Ipv4(ip, port) => {
            assert_eq!(ip, Ipv4Addr::LOCALHOST);
            assert_ne!(port, 0);
        }
        other => panic!("unexpected bound address {other}"),
    }

    client.write_all(b"hello through the proxy").await.unwrap();
    let mut buf = [0u8; 23];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello through the proxy");

    // half-close propagates through the echo server and back
    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_connect_bound_address_is_outbound_socket() {
    let (listener, target_addr) = create_test_listener().await;
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    let target = Address::from(target_addr);
    let (rep, bound) = request(&mut client, SOCKS5_CMD_TCP_CONNECT, &target).await;
    assert_eq!(rep, 0x00);

    let (_socket, peer) = listener.accept().await.unwrap();
    assert_eq!(bound, Address::from(peer));
}

#[tokio::test]
async fn test_connect_domain_target() {
    let echo_addr = spawn_tcp_echo().await;
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    let target = Address::domain("localhost", echo_addr.port()).unwrap();
    let (rep, _) = request(&mut client, SOCKS5_CMD_TCP_CONNECT, &target).await;
    // localhost may resolve to ::1 first, where nothing listens
    assert!(rep == 0x00 || rep == 0x04);
}

#[tokio::test]
async fn test_connect_closed_port_replies_host_unreachable() {
    let (listener, target_addr) = create_test_listener().await;
    drop(listener);
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    client
        .write_all(&socks5_mock::create_request(
            SOCKS5_CMD_TCP_CONNECT,
            &Address::from(target_addr),
        ))
        .await
        .unwrap();

    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x04, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    assert!(closed_without_reply(&mut client).await);
}

#[tokio::test]
async fn test_bind_replies_command_not_supported() {
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    let (rep, bound) = request(&mut client, SOCKS5_CMD_TCP_BIND, &Address::zero()).await;
    assert_eq!(rep, 0x07);
    assert_eq!(bound, Address::zero());
    assert!(closed_without_reply(&mut client).await);
}

#[tokio::test]
async fn test_unknown_command_replies_command_not_supported() {
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    let (rep, _) = request(&mut client, 0x7F, &Address::zero()).await;
    assert_eq!(rep, 0x07);
}

#[tokio::test]
async fn test_bad_version_is_dropped_silently() {
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    client.write_all(&[0x04, 1, 0x00]).await.unwrap();

    assert!(closed_without_reply(&mut client).await);
}

#[tokio::test]
async fn test_truncated_request_is_dropped_silently() {
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    // IPv4 request with only 3 of 6 address bytes
    client
        .write_all(&[0x05, SOCKS5_CMD_TCP_CONNECT, 0x00, 0x01, 127, 0, 0])
        .await
        .unwrap();
    client.shutdown().await.unwrap();

    assert!(closed_without_reply(&mut client).await);
}

#[tokio::test]
async fn test_bad_request_reserved_byte_is_dropped_silently() {
    let server = TestServerBuilder::new().start().await;

    let mut client = server.connect().await;
    negotiate_no_auth(&mut client).await;

    let mut request = socks5_mock::create_request(SOCKS5_CMD_TCP_CONNECT, &Address::zero());
    request[2] = 0x01;
    client.write_all(&request).await.unwrap();

    assert!(closed_without_reply(&mut client).await);
}

#[tokio::test]
async fn test_idle_client_hits_handshake_deadline() {
    let server = TestServerBuilder::new().handshake_timeout(1).start().await;

    let mut client = server.connect().await;
    // negotiate, then never send the request
    negotiate_no_auth(&mut client).await;

    assert!(closed_without_reply(&mut client).await);
}

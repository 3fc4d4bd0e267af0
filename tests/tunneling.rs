//! End-to-end tests for CONNECT tunneling.

use std::time::Duration;

use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use forward_proxy::config::ProxyConfig;

mod common;

#[tokio::test]
async fn tunnel_roundtrip_random_payload() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, _shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let (stream, extra) = common::connect_through(proxy, &upstream.to_string()).await;
    assert!(extra.is_empty());

    let mut payload = vec![0u8; 128 * 1024];
    rand::thread_rng().fill_bytes(&mut payload);
    let expected = payload.clone();

    let (mut read_half, mut write_half) = stream.into_split();
    let writer = tokio::spawn(async move {
        write_half.write_all(&payload).await.unwrap();
        write_half.shutdown().await.unwrap();
    });

    let mut got = Vec::new();
    read_half.read_to_end(&mut got).await.unwrap();
    writer.await.unwrap();

    assert_eq!(got, expected);
}

#[tokio::test]
async fn half_close_keeps_the_other_direction_flowing() {
    let payload: &[u8] = b"late bytes that must still arrive after the client stops sending";
    let upstream = common::start_drain_then_send_upstream(payload).await;
    let (proxy, _shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let (mut stream, extra) = common::connect_through(proxy, &upstream.to_string()).await;
    assert!(extra.is_empty());

    stream.write_all(b"some request bytes").await.unwrap();
    // Close only our write side; the upstream answers afterwards.
    stream.shutdown().await.unwrap();

    let got = common::read_until_eof(&mut stream).await;
    assert_eq!(got, payload);
}

#[tokio::test]
async fn connect_refused_yields_502_and_no_tunnel() {
    let gone = common::refused_addr().await;
    let (proxy, _shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(format!("CONNECT {gone} HTTP/1.1\r\nHost: {gone}\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let got = common::read_until_eof(&mut client).await;
    let got = String::from_utf8_lossy(&got);
    assert!(got.starts_with("HTTP/1.1 502 Bad Gateway"), "got: {}", got);
    assert!(!got.contains("Connection Established"));
}

#[tokio::test]
async fn connect_without_port_yields_400() {
    let (proxy, _shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(b"CONNECT example.com HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .await
        .unwrap();

    let got = common::read_until_eof(&mut client).await;
    assert!(got.starts_with(b"HTTP/1.1 400 Bad Request"));
}

#[tokio::test]
async fn concurrent_tunnels_do_not_cross_deliver() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, _shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let session = |seed: u8| {
        let target = upstream.to_string();
        async move {
            let (stream, extra) = common::connect_through(proxy, &target).await;
            assert!(extra.is_empty());

            let payload: Vec<u8> = (0..32 * 1024).map(|i| (i as u8) ^ seed).collect();
            let expected = payload.clone();

            let (mut read_half, mut write_half) = stream.into_split();
            let writer = tokio::spawn(async move {
                write_half.write_all(&payload).await.unwrap();
                write_half.shutdown().await.unwrap();
            });

            let mut got = Vec::new();
            read_half.read_to_end(&mut got).await.unwrap();
            writer.await.unwrap();
            assert_eq!(got, expected, "tunnel with seed {seed} got foreign bytes");
        }
    };

    tokio::join!(session(0xAA), session(0x55));
}

#[tokio::test]
async fn payload_sent_with_connect_head_reaches_upstream() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, _shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    let mut bytes = format!("CONNECT {upstream} HTTP/1.1\r\n\r\n").into_bytes();
    bytes.extend_from_slice(b"early-bytes");
    client.write_all(&bytes).await.unwrap();
    client.shutdown().await.unwrap();

    let got = common::read_until_eof(&mut client).await;
    let got = String::from_utf8_lossy(&got);
    assert!(got.starts_with("HTTP/1.1 200"), "got: {}", got);
    assert!(got.ends_with("early-bytes"));
}

#[tokio::test]
async fn idle_timeout_tears_the_tunnel_down() {
    let upstream = common::start_echo_upstream().await;

    let mut config = ProxyConfig::default();
    config.timeouts.tunnel_idle_secs = Some(1);
    let (proxy, _shutdown) = common::start_proxy(config).await;

    let (mut stream, _extra) = common::connect_through(proxy, &upstream.to_string()).await;

    // Send nothing: both directions go idle and the proxy closes the
    // session once the timer fires.
    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest)).await;
    assert!(closed.is_ok(), "tunnel was not closed by the idle timeout");
}

//! CONNECT tunneling.
//!
//! # Responsibilities
//! - Establish the upstream leg and acknowledge the tunnel to the client
//! - Relay opaque bytes in both directions until both sides have closed
//! - Propagate half-closes; cancel the peer loop on I/O errors
//!
//! # Design Decisions
//! - One task per direction, each parked on a read; nothing polls
//! - EOF shuts down only the destination's write side; the opposite
//!   direction keeps flowing until it ends on its own
//! - Payload bytes are never inspected after the acknowledgment, which is
//!   what lets TLS and arbitrary binary protocols pass through

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinError;

use crate::config::ProxyConfig;
use crate::error::SessionError;
use crate::http::request::ProxyRequest;
use crate::http::response;
use crate::upstream::{Connector, HostPort};

/// Run a CONNECT session to completion.
///
/// States: Connecting → Established → Relaying → Closing → Closed. A
/// connect failure answers `502` and goes straight to Closed; after the
/// acknowledgment the payload is opaque and only I/O outcomes drive the
/// session.
pub async fn run(
    mut client: TcpStream,
    request: ProxyRequest,
    target: HostPort,
    connector: &Connector,
    config: &ProxyConfig,
) -> Result<(), SessionError> {
    // Connecting
    let mut upstream = match connector.connect(&target).await {
        Ok(upstream) => upstream,
        Err(error) => {
            if let Some(status) = error.status_line() {
                let _ = response::write_status(&mut client, status).await;
            }
            let _ = client.shutdown().await;
            return Err(error);
        }
    };

    // Established
    client
        .write_all(response::CONNECTION_ESTABLISHED)
        .await
        .map_err(SessionError::Client)?;

    // A client may push payload together with the CONNECT head; those
    // bytes belong to the tunnel.
    let early = request.into_leftover();
    if !early.is_empty() {
        upstream
            .write_all(&early)
            .await
            .map_err(SessionError::RelayIo)?;
    }

    tracing::debug!(target = %target, "Tunnel established");

    // Relaying: one loop per direction.
    let chunk = config.limits.relay_chunk_bytes;
    let idle = config.timeouts.tunnel_idle_secs.map(Duration::from_secs);

    let (client_read, client_write) = client.into_split();
    let (upstream_read, upstream_write) = upstream.into_split();

    let mut outbound = tokio::spawn(relay_direction(client_read, upstream_write, chunk, idle));
    let mut inbound = tokio::spawn(relay_direction(upstream_read, client_write, chunk, idle));

    // Closing: wait for both loops; the first error cancels the peer.
    let mut first_error: Option<io::Error> = None;
    let (mut outbound_done, mut inbound_done) = (false, false);
    let (mut bytes_out, mut bytes_in) = (0u64, 0u64);

    while !(outbound_done && inbound_done) {
        tokio::select! {
            joined = &mut outbound, if !outbound_done => {
                outbound_done = true;
                match flatten(joined) {
                    Ok(count) => bytes_out = count,
                    Err(error) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                        if !inbound_done {
                            inbound.abort();
                        }
                    }
                }
            }
            joined = &mut inbound, if !inbound_done => {
                inbound_done = true;
                match flatten(joined) {
                    Ok(count) => bytes_in = count,
                    Err(error) => {
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                        if !outbound_done {
                            outbound.abort();
                        }
                    }
                }
            }
        }
    }

    // Closed: both halves of both connections are dropped at this point.
    tracing::debug!(
        target = %target,
        bytes_out = bytes_out,
        bytes_in = bytes_in,
        "Tunnel closed"
    );

    match first_error {
        Some(error) => Err(SessionError::RelayIo(error)),
        None => Ok(()),
    }
}

/// Relay one direction until EOF or error.
///
/// On EOF, only the destination's write side is shut down; the peer loop
/// decides the rest of the session.
async fn relay_direction(
    mut from: OwnedReadHalf,
    mut to: OwnedWriteHalf,
    chunk: usize,
    idle: Option<Duration>,
) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk];
    let mut total = 0u64;
    loop {
        let read = match idle {
            Some(limit) => match tokio::time::timeout(limit, from.read(&mut buf)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "tunnel idle timeout"))
                }
            },
            None => from.read(&mut buf).await?,
        };
        if read == 0 {
            // Half-close: the peer may already be fully gone, which is fine.
            let _ = to.shutdown().await;
            return Ok(total);
        }
        to.write_all(&buf[..read]).await?;
        total += read as u64;
    }
}

/// Collapse a join result; a loop cancelled by its peer is not an error in
/// its own right.
fn flatten(joined: Result<io::Result<u64>, JoinError>) -> io::Result<u64> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(0),
        Err(e) => Err(io::Error::other(e)),
    }
}

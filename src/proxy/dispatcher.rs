//! Connection dispatch.
//!
//! # Responsibilities
//! - Accept clients and spawn one session task per connection
//! - Read and parse each request head
//! - Route by method: CONNECT → tunnel, everything else → forwarder
//! - Translate session errors into status responses while still possible
//! - Survive every per-connection failure; only shutdown stops the loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::error::SessionError;
use crate::http::request::RequestHeadReader;
use crate::http::response;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::Listener;
use crate::proxy::{forwarder, tunnel};
use crate::upstream::{Connector, HostPort};

/// Where a parsed request is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Plain HTTP request, re-issued upstream by the forwarder.
    Forward,
    /// CONNECT tunnel to the given target.
    Tunnel(HostPort),
}

/// Decide where a request goes based on its method and target.
///
/// CONNECT targets must carry an explicit port; everything that is not
/// CONNECT is forwarded as plain HTTP.
pub fn route(method: &str, target: &str) -> Result<RouteDecision, SessionError> {
    if method == "CONNECT" {
        let host_port = target
            .parse::<HostPort>()
            .map_err(|reason| SessionError::MalformedTarget {
                target: target.to_string(),
                reason,
            })?;
        Ok(RouteDecision::Tunnel(host_port))
    } else {
        Ok(RouteDecision::Forward)
    }
}

/// Accepts client connections and runs one session per connection.
pub struct Dispatcher {
    config: Arc<ProxyConfig>,
    tracker: ConnectionTracker,
}

impl Dispatcher {
    /// Create a dispatcher for the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config: Arc::new(config),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle on the session tracker, for drain waits at shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept until the shutdown signal fires.
    ///
    /// Accept errors are logged and do not stop the loop; session errors
    /// never reach it at all.
    pub async fn run(&self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            upstream = ?self.config.upstream.address,
            max_connections = listener.max_connections(),
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => {
                            let config = Arc::clone(&self.config);
                            let guard = self.tracker.track();
                            tokio::spawn(async move {
                                let id = guard.id();
                                if let Err(error) = handle_connection(stream, peer, config).await {
                                    match error {
                                        SessionError::UpstreamUnreachable { .. }
                                        | SessionError::UpstreamFailed(_)
                                        | SessionError::RelayIo(_) => tracing::warn!(
                                            connection_id = %id,
                                            peer_addr = %peer,
                                            error = %error,
                                            "Session aborted"
                                        ),
                                        _ => tracing::debug!(
                                            connection_id = %id,
                                            peer_addr = %peer,
                                            error = %error,
                                            "Session rejected"
                                        ),
                                    }
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }
    }
}

/// Serve one client connection: parse, route, relay, translate errors.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ProxyConfig>,
) -> Result<(), SessionError> {
    let head_reader = RequestHeadReader::new(config.limits.max_header_bytes);
    let connector = Connector::new(Duration::from_secs(config.timeouts.connect_secs));

    let request = match head_reader.read(&mut stream).await {
        Ok(request) => request,
        Err(error) => return reject(&mut stream, error).await,
    };

    tracing::info!(
        peer_addr = %peer,
        method = %request.method,
        target = %request.target,
        version = request.version.as_str(),
        "Request received"
    );

    let decision = match route(&request.method, &request.target) {
        Ok(decision) => decision,
        Err(error) => return reject(&mut stream, error).await,
    };

    match decision {
        RouteDecision::Tunnel(target) => {
            // The tunnel owns the client from here; its state machine
            // handles the 502-on-connect-failure emission itself.
            tunnel::run(stream, request, target, &connector, &config).await
        }
        RouteDecision::Forward => {
            let result = forwarder::run(&mut stream, request, &connector, &config).await;
            match result {
                Ok(_) => {
                    let _ = stream.shutdown().await;
                    Ok(())
                }
                Err(error) => reject(&mut stream, error).await,
            }
        }
    }
}

/// Send the matching status response if one is still possible, close the
/// connection, and report the error to the session task.
async fn reject(stream: &mut TcpStream, error: SessionError) -> Result<(), SessionError> {
    if let Some(status) = error.status_line() {
        let _ = response::write_status(stream, status).await;
        let _ = stream.shutdown().await;
        // Lingering close: drain whatever the client was still sending so
        // the status response is not lost to a reset.
        let mut scratch = [0u8; 1024];
        let drain = async {
            while let Ok(read) = stream.read(&mut scratch).await {
                if read == 0 {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(Duration::from_secs(2), drain).await;
    } else {
        let _ = stream.shutdown().await;
    }
    Err(error)
}

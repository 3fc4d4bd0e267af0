//! Upstream connection establishment.
//!
//! # Responsibilities
//! - Open a fresh TCP connection per client exchange (no pooling, no reuse)
//! - Bound connect attempts with the configured timeout
//! - Collapse DNS failure, refusal, and timeout into one error kind

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::SessionError;

/// A connect target in `host:port` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for HostPort {
    type Err = &'static str;

    /// Accepts `example.com:443`, `10.0.0.1:8080`, and `[::1]:8080`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or("missing port")?;
        let port: u16 = port.parse().map_err(|_| "invalid port")?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err("empty host");
        }
        Ok(Self::new(host, port))
    }
}

/// Opens upstream connections with a bounded connect timeout.
///
/// Every call dials a fresh connection; nothing is shared or reused across
/// client exchanges.
#[derive(Debug, Clone)]
pub struct Connector {
    connect_timeout: Duration,
}

impl Connector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Connect to `target`. DNS errors, refusal, and timeout all collapse
    /// into `UpstreamUnreachable`; the caller never needs to distinguish
    /// them.
    pub async fn connect(&self, target: &HostPort) -> Result<TcpStream, SessionError> {
        match timeout(
            self.connect_timeout,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(SessionError::UpstreamUnreachable {
                target: target.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(SessionError::UpstreamUnreachable {
                target: target.to_string(),
                reason: format!("no connection within {:?}", self.connect_timeout),
            }),
        }
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a minimal (or absent) file works.

use serde::{Deserialize, Serialize};

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Next-hop proxy configuration.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Wire-level limits.
    pub limits: LimitConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 1_024,
        }
    }
}

/// Next-hop proxy configuration.
///
/// When `address` is set, plain HTTP requests are re-issued to that proxy
/// with their request line intact. When unset, the proxy connects straight
/// to the host named in each request's target. CONNECT tunnels always go
/// straight to the requested `host:port`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Next-hop proxy as `host:port`, if any.
    pub address: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connect timeout in seconds.
    pub connect_secs: u64,

    /// Optional idle timeout for established tunnels, in seconds. When
    /// set, a tunnel is torn down once either direction has gone this long
    /// without traffic. Unset means idle tunnels are never killed.
    pub tunnel_idle_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            tunnel_idle_secs: None,
        }
    }
}

/// Wire-level limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum size of a request head (request line + headers) in bytes.
    pub max_header_bytes: usize,

    /// Relay buffer size for tunnel and body streaming, in bytes.
    pub relay_chunk_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            relay_chunk_bytes: 8 * 1024,
        }
    }
}

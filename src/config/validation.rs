//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (ports valid, limits non-zero)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before a config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::upstream::HostPort;

/// A single semantic problem found in a configuration.
#[derive(Debug)]
pub enum ValidationError {
    /// The listener bind address is not a valid socket address.
    InvalidBindAddress(String),
    /// The upstream proxy address is not `host:port`.
    InvalidUpstreamAddress(String),
    /// A value that must be non-zero was zero.
    ZeroValue(&'static str),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener.bind_address {:?} is not a socket address", addr)
            }
            ValidationError::InvalidUpstreamAddress(addr) => {
                write!(f, "upstream.address {:?} is not host:port", addr)
            }
            ValidationError::ZeroValue(field) => write!(f, "{} must be non-zero", field),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(addr) = &config.upstream.address {
        if addr.parse::<HostPort>().is_err() {
            errors.push(ValidationError::InvalidUpstreamAddress(addr.clone()));
        }
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_connections"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.connect_secs"));
    }
    if config.limits.max_header_bytes == 0 {
        errors.push(ValidationError::ZeroValue("limits.max_header_bytes"));
    }
    if config.limits.relay_chunk_bytes == 0 {
        errors.push(ValidationError::ZeroValue("limits.relay_chunk_bytes"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Session error taxonomy.
//!
//! One `thiserror`-derived enum for everything that can go wrong handling a
//! single client exchange. Each variant carries enough context to log, and
//! [`SessionError::status_line`] centralizes the mapping to a client-visible
//! canned response — `None` once streaming has started and no status can be
//! sent anymore.

use std::io;

use thiserror::Error;

/// Everything that can go wrong while servicing one client exchange.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The request head could not be parsed or violated HTTP/1.1 framing.
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    /// The request target was not a usable absolute URL or `host:port`.
    #[error("malformed target {target:?}: {reason}")]
    MalformedTarget {
        target: String,
        reason: &'static str,
    },

    /// The accumulated request head exceeded the configured byte limit.
    #[error("request header exceeded limit of {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// The upstream could not be reached (DNS failure, refusal, or timeout).
    #[error("upstream {target} unreachable: {reason}")]
    UpstreamUnreachable { target: String, reason: String },

    /// The upstream leg died or garbled its head before any client-visible
    /// bytes were produced.
    #[error("upstream exchange failed: {0}")]
    UpstreamFailed(String),

    /// An I/O error while relaying opaque bytes after streaming had begun.
    #[error("relay I/O error: {0}")]
    RelayIo(io::Error),

    /// An I/O error on the client side.
    #[error("client I/O error: {0}")]
    Client(io::Error),
}

impl SessionError {
    /// The status line for the canned response this error should produce,
    /// or `None` when no response can be sent (the client side is gone, or
    /// relaying has already started streaming bytes).
    ///
    /// The returned string is the portion after `HTTP/1.1 `, ready to pass
    /// to [`crate::http::response::write_status`].
    pub fn status_line(&self) -> Option<&'static str> {
        match self {
            SessionError::MalformedRequest(_) | SessionError::MalformedTarget { .. } => {
                Some("400 Bad Request")
            }
            SessionError::HeaderTooLarge { .. } => Some("431 Request Header Fields Too Large"),
            SessionError::UpstreamUnreachable { .. } | SessionError::UpstreamFailed(_) => {
                Some("502 Bad Gateway")
            }
            SessionError::RelayIo(_) | SessionError::Client(_) => None,
        }
    }
}

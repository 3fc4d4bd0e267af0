//! HTTP/1.1 wire framing subsystem.
//!
//! # Data Flow
//! ```text
//! Client bytes
//!     → request.rs (head accumulation + parse, size limit)
//!     → proxy dispatcher (routing decision)
//!
//! Upstream bytes
//!     → response.rs (head read, canned status writing)
//!     → body.rs (Content-Length / chunked / EOF-delimited relay)
//! ```
//!
//! # Design Decisions
//! - Heads are parsed once; header bytes are relayed verbatim afterwards
//! - Bodies stream through a bounded buffer, never collected wholesale
//! - Chunked bodies are forwarded unchanged; only the framing is tracked

pub mod body;
pub mod request;
pub mod response;

pub use request::{Header, ProxyRequest, RequestHeadReader, Version};
pub use response::ResponseHead;

/// Case-insensitive lookup of the first header with the given name.
pub(crate) fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Declared body length, if a well-formed Content-Length is present.
pub(crate) fn content_length(headers: &[Header]) -> Option<u64> {
    header_value(headers, "content-length").and_then(|v| v.trim().parse().ok())
}

/// Whether the message uses chunked transfer coding.
pub(crate) fn is_chunked(headers: &[Header]) -> bool {
    header_value(headers, "transfer-encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false)
}

//! HTTP/1.1 request head parsing.
//!
//! # Responsibilities
//! - Accumulate bytes until the head (request line + headers) is complete
//! - Enforce the configured head size limit
//! - Preserve header order and duplicates exactly as received
//! - Hand any body bytes that arrived past the head back to the caller

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SessionError;

/// Header lines httparse will account for in one request head.
const MAX_HEADERS: usize = 64;

/// HTTP protocol version of a parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// A single header as received, original order preserved by the containing
/// vector.
#[derive(Debug, Clone)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A fully parsed request head. Immutable once built.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: String,
    pub target: String,
    pub version: Version,
    /// Ordered headers, duplicates preserved.
    pub headers: Vec<Header>,
    /// The header block exactly as received: everything between the request
    /// line and the final blank line, including each line's CRLF.
    raw_headers: Bytes,
    /// Bytes that arrived past the head (start of the body, or early tunnel
    /// payload).
    leftover: Bytes,
}

impl ProxyRequest {
    /// Case-insensitive lookup of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        super::header_value(&self.headers, name)
    }

    /// Declared body length, if a well-formed Content-Length is present.
    pub fn content_length(&self) -> Option<u64> {
        super::content_length(&self.headers)
    }

    /// Whether the request body uses chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        super::is_chunked(&self.headers)
    }

    /// The header block verbatim, ready to relay unmodified.
    pub fn raw_headers(&self) -> &[u8] {
        &self.raw_headers
    }

    /// Bytes that were read past the head.
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    /// Consume the request, keeping only the bytes read past the head.
    pub fn into_leftover(self) -> Bytes {
        self.leftover
    }
}

/// Reads request heads off client streams under a size limit.
#[derive(Debug, Clone, Copy)]
pub struct RequestHeadReader {
    limit: usize,
}

impl RequestHeadReader {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Read from `stream` until the blank line that ends the head, then
    /// parse it.
    ///
    /// Fails with `HeaderTooLarge` once the accumulated head exceeds the
    /// limit and with `MalformedRequest` when the bytes cannot be parsed or
    /// the client closes early.
    pub async fn read<R>(&self, stream: &mut R) -> Result<ProxyRequest, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::with_capacity(4096.min(self.limit));
        loop {
            let read = stream.read_buf(&mut buf).await.map_err(SessionError::Client)?;
            if read == 0 {
                return Err(SessionError::MalformedRequest(
                    "connection closed before request head",
                ));
            }
            if let Some(head_end) = find_head_end(&buf) {
                if head_end > self.limit {
                    return Err(SessionError::HeaderTooLarge { limit: self.limit });
                }
                return parse_head(buf.freeze(), head_end);
            }
            if buf.len() >= self.limit {
                return Err(SessionError::HeaderTooLarge { limit: self.limit });
            }
        }
    }
}

/// Position just past the `\r\n\r\n` terminator, if present.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_head(all: Bytes, head_end: usize) -> Result<ProxyRequest, SessionError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    match parsed.parse(&all[..head_end]) {
        Ok(httparse::Status::Complete(_)) => {}
        // The terminator was found, so a partial parse means the head
        // itself is unusable.
        Ok(httparse::Status::Partial) => {
            return Err(SessionError::MalformedRequest("truncated request head"))
        }
        Err(_) => return Err(SessionError::MalformedRequest("unparseable request head")),
    }

    let method = parsed
        .method
        .ok_or(SessionError::MalformedRequest("missing method"))?
        .to_string();
    let target = parsed
        .path
        .ok_or(SessionError::MalformedRequest("missing target"))?
        .to_string();
    let version = match parsed.version {
        Some(0) => Version::Http10,
        Some(1) => Version::Http11,
        _ => return Err(SessionError::MalformedRequest("unsupported protocol version")),
    };

    let headers = parsed
        .headers
        .iter()
        .map(|h| Header {
            name: h.name.to_string(),
            value: String::from_utf8_lossy(h.value).into_owned(),
        })
        .collect();

    // Raw block: from the end of the request line to the final blank line.
    let line_end = find_line_end(&all[..head_end])
        .ok_or(SessionError::MalformedRequest("missing request line"))?;
    let raw_headers = all.slice(line_end..head_end - 2);
    let leftover = all.slice(head_end..);

    Ok(ProxyRequest {
        method,
        target,
        version,
        headers,
        raw_headers,
        leftover,
    })
}

/// Position just past the request line's CRLF. Stray blank lines ahead of
/// the request line are tolerated by the parser, so they are skipped here
/// as well.
fn find_line_end(buf: &[u8]) -> Option<usize> {
    let mut start = 0;
    while buf[start..].starts_with(b"\r\n") {
        start += 2;
    }
    buf[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| start + p + 2)
}

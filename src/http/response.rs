//! Response-side framing.
//!
//! # Responsibilities
//! - Write canned status responses for dispatch errors
//! - Emit the CONNECT acknowledgment
//! - Read an upstream response head, keeping its bytes verbatim for relay

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Header;

/// Exact acknowledgment for an established CONNECT tunnel.
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Header lines httparse will account for in one response head.
const MAX_HEADERS: usize = 64;

/// Write a canned status response with an empty body.
pub async fn write_status<W>(writer: &mut W, status_line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status_line
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

/// An upstream response head, parsed for framing but kept verbatim for
/// relay.
#[derive(Debug)]
pub struct ResponseHead {
    pub status: u16,
    /// Ordered headers, duplicates preserved.
    pub headers: Vec<Header>,
    /// The complete head as received, including the final blank line.
    raw: Bytes,
    /// Body bytes that arrived with the head.
    leftover: Bytes,
}

impl ResponseHead {
    /// Declared body length, if a well-formed Content-Length is present.
    pub fn content_length(&self) -> Option<u64> {
        super::content_length(&self.headers)
    }

    /// Whether the response body uses chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        super::is_chunked(&self.headers)
    }

    /// Whether this status never carries a body.
    pub fn is_bodyless(&self) -> bool {
        self.status < 200 || self.status == 204 || self.status == 304
    }

    /// The head exactly as received, ready to relay unmodified.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Body bytes that were read together with the head.
    pub fn into_leftover(self) -> Bytes {
        self.leftover
    }
}

/// Read a response head from `upstream`, accumulating at most `limit`
/// bytes.
pub async fn read_response_head<R>(upstream: &mut R, limit: usize) -> io::Result<ResponseHead>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096.min(limit));
    let head_end = loop {
        let read = upstream.read_buf(&mut buf).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "upstream closed before response head",
            ));
        }
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if buf.len() >= limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "upstream response head too large",
            ));
        }
    };

    let all = buf.freeze();
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut headers);
    match parsed.parse(&all[..head_end]) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) | Err(_) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unparseable upstream response head",
            ));
        }
    }

    let status = parsed.code.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "missing upstream status code")
    })?;
    let headers = parsed
        .headers
        .iter()
        .map(|h| Header {
            name: h.name.to_string(),
            value: String::from_utf8_lossy(h.value).into_owned(),
        })
        .collect();

    Ok(ResponseHead {
        status,
        headers,
        raw: all.slice(..head_end),
        leftover: all.slice(head_end..),
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

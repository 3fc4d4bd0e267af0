//! Body framing relays.
//!
//! # Responsibilities
//! - Forward exactly `Content-Length` bytes
//! - Forward chunked bodies unchanged, tracking only the framing so the
//!   end of the body is known without decoding
//! - Forward close-delimited bodies until EOF
//!
//! Bytes are never transformed in transit; the relays only count them.
//! Every function takes a `buffered` carry-over of bytes that were already
//! pulled off the source socket while its head was being read.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on one chunk-size or trailer line.
const MAX_LINE_BYTES: usize = 8 * 1024;

/// Relay exactly `length` bytes from `from` (preceded by `buffered`) into
/// `to`. Fails with `UnexpectedEof` if the source ends early.
pub async fn relay_exact<R, W>(
    from: &mut R,
    buffered: &mut BytesMut,
    to: &mut W,
    length: u64,
    chunk: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let total = copy_counted(from, buffered, to, length, chunk).await?;
    to.flush().await?;
    Ok(total)
}

/// Relay from `from` (preceded by `buffered`) into `to` until EOF.
pub async fn relay_until_eof<R, W>(
    from: &mut R,
    buffered: &mut BytesMut,
    to: &mut W,
    chunk: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    if !buffered.is_empty() {
        let bytes = buffered.split();
        to.write_all(&bytes).await?;
        total += bytes.len() as u64;
    }

    let mut buf = vec![0u8; chunk];
    loop {
        let read = from.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        to.write_all(&buf[..read]).await?;
        total += read as u64;
    }
    to.flush().await?;
    Ok(total)
}

/// Relay a chunked body from `from` (preceded by `buffered`) into `to`,
/// byte-for-byte, until the terminal chunk and its trailers have passed.
///
/// The chunk framing is scanned only to find the end of the body; sizes,
/// extensions, and trailers are forwarded exactly as received.
pub async fn relay_chunked<R, W>(
    from: &mut R,
    buffered: &mut BytesMut,
    to: &mut W,
    chunk: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    loop {
        let line = read_line(from, buffered).await?;
        to.write_all(&line).await?;
        total += line.len() as u64;

        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }
        // Chunk data plus its trailing CRLF.
        total += copy_counted(from, buffered, to, size + 2, chunk).await?;
    }

    // Trailers end with an empty line.
    loop {
        let line = read_line(from, buffered).await?;
        to.write_all(&line).await?;
        total += line.len() as u64;
        if line.as_ref() == b"\r\n" {
            break;
        }
    }

    to.flush().await?;
    Ok(total)
}

/// Copy `remaining` bytes, draining `buffered` before touching the socket.
async fn copy_counted<R, W>(
    from: &mut R,
    buffered: &mut BytesMut,
    to: &mut W,
    mut remaining: u64,
    chunk: usize,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let total = remaining;

    if !buffered.is_empty() && remaining > 0 {
        let take = buffered.len().min(remaining as usize);
        let bytes = buffered.split_to(take);
        to.write_all(&bytes).await?;
        remaining -= take as u64;
    }

    let mut buf = vec![0u8; chunk];
    while remaining > 0 {
        let cap = buf.len().min(remaining as usize);
        let read = from.read(&mut buf[..cap]).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "body ended before its declared length",
            ));
        }
        to.write_all(&buf[..read]).await?;
        remaining -= read as u64;
    }
    Ok(total)
}

/// Read one CRLF-terminated line, refilling `buffered` from `from` as
/// needed. The returned bytes include the line terminator.
async fn read_line<R>(from: &mut R, buffered: &mut BytesMut) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(pos) = buffered.iter().position(|&b| b == b'\n') {
            return Ok(buffered.split_to(pos + 1).freeze());
        }
        if buffered.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "chunk framing line too long",
            ));
        }
        let read = from.read_buf(buffered).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "body ended inside chunk framing",
            ));
        }
    }
}

/// Parse the hex size from a chunk-size line, ignoring chunk extensions.
fn parse_chunk_size(line: &[u8]) -> io::Result<u64> {
    let text = std::str::from_utf8(line)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-ASCII chunk size line"))?;
    let size = text
        .trim_end_matches(['\r', '\n'])
        .split(';')
        .next()
        .unwrap_or("")
        .trim();
    u64::from_str_radix(size, 16)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size"))
}

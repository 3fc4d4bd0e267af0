//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Re-issue a parsed request upstream (chained proxy or direct origin)
//! - Relay the original headers as raw bytes, unmodified and in order
//! - Stream request and response bodies with bounded memory
//! - Relay the upstream response head and body verbatim
//!
//! # Design Decisions
//! - Chained mode keeps the request line as received; direct mode rewrites
//!   it to origin-form for the target server
//! - Bodies follow their declared framing: Content-Length count, chunked
//!   pass-through, or read-to-EOF for close-delimited responses

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::SessionError;
use crate::http::request::ProxyRequest;
use crate::http::{body, response};
use crate::upstream::{Connector, HostPort};

/// Where the outbound request goes and the request line it carries.
struct ForwardPlan {
    target: HostPort,
    request_line: String,
}

/// Forward one request and relay its response. Returns the number of
/// response body bytes relayed to the client.
pub async fn run(
    client: &mut TcpStream,
    request: ProxyRequest,
    connector: &Connector,
    config: &ProxyConfig,
) -> Result<u64, SessionError> {
    let plan = plan(&request, config)?;

    let mut upstream = connector.connect(&plan.target).await?;

    write_request(&mut upstream, &plan, &request)
        .await
        .map_err(|e| SessionError::UpstreamFailed(format!("writing request head: {}", e)))?;

    relay_request_body(client, &request, &mut upstream, config).await?;

    let head = response::read_response_head(&mut upstream, config.limits.max_header_bytes)
        .await
        .map_err(|e| SessionError::UpstreamFailed(e.to_string()))?;

    // From the first head byte on, errors can only close the connection.
    client
        .write_all(head.raw())
        .await
        .map_err(SessionError::RelayIo)?;

    let status = head.status;
    let relayed = relay_response_body(&request, head, &mut upstream, client, config).await?;

    tracing::debug!(
        target = %plan.target,
        status = status,
        body_bytes = relayed,
        "Response relayed"
    );
    Ok(relayed)
}

/// Work out the upstream target and outbound request line.
fn plan(request: &ProxyRequest, config: &ProxyConfig) -> Result<ForwardPlan, SessionError> {
    match &config.upstream.address {
        // Chained: the next hop is a proxy, so the request line (absolute
        // form included) passes through as received.
        Some(address) => {
            let target = address
                .parse::<HostPort>()
                .map_err(|_| SessionError::UpstreamUnreachable {
                    target: address.clone(),
                    reason: "invalid upstream address".to_string(),
                })?;
            Ok(ForwardPlan {
                target,
                request_line: format!(
                    "{} {} {}\r\n",
                    request.method,
                    request.target,
                    request.version.as_str()
                ),
            })
        }
        // Direct: resolve the absolute-form target ourselves and speak
        // origin-form to the server.
        None => {
            let url = Url::parse(&request.target).map_err(|_| SessionError::MalformedTarget {
                target: request.target.clone(),
                reason: "expected an absolute http URL",
            })?;
            if url.scheme() != "http" {
                return Err(SessionError::MalformedTarget {
                    target: request.target.clone(),
                    reason: "only http targets can be forwarded",
                });
            }
            let host = url.host_str().ok_or(SessionError::MalformedTarget {
                target: request.target.clone(),
                reason: "target has no host",
            })?;
            let port = url.port_or_known_default().unwrap_or(80);

            let origin_form = match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            };
            Ok(ForwardPlan {
                target: HostPort::new(host, port),
                request_line: format!(
                    "{} {} {}\r\n",
                    request.method,
                    origin_form,
                    request.version.as_str()
                ),
            })
        }
    }
}

/// Write the outbound request line and the original header block verbatim.
async fn write_request(
    upstream: &mut TcpStream,
    plan: &ForwardPlan,
    request: &ProxyRequest,
) -> std::io::Result<()> {
    upstream.write_all(plan.request_line.as_bytes()).await?;
    upstream.write_all(request.raw_headers()).await?;
    upstream.write_all(b"\r\n").await?;
    upstream.flush().await
}

/// Stream the request body upstream, following its declared framing.
async fn relay_request_body(
    client: &mut TcpStream,
    request: &ProxyRequest,
    upstream: &mut TcpStream,
    config: &ProxyConfig,
) -> Result<(), SessionError> {
    let chunk = config.limits.relay_chunk_bytes;
    let mut buffered = BytesMut::from(request.leftover());

    let result = if request.is_chunked() {
        body::relay_chunked(client, &mut buffered, upstream, chunk).await
    } else if let Some(length) = request.content_length() {
        body::relay_exact(client, &mut buffered, upstream, length, chunk).await
    } else {
        // No declared body; anything else the client pipelined is dropped
        // when the connection closes after this exchange.
        return Ok(());
    };

    result
        .map(|_| ())
        .map_err(|e| SessionError::UpstreamFailed(format!("relaying request body: {}", e)))
}

/// Stream the response body to the client, following its declared framing.
async fn relay_response_body(
    request: &ProxyRequest,
    head: response::ResponseHead,
    upstream: &mut TcpStream,
    client: &mut TcpStream,
    config: &ProxyConfig,
) -> Result<u64, SessionError> {
    let chunk = config.limits.relay_chunk_bytes;

    if request.method == "HEAD" || head.is_bodyless() {
        client.flush().await.map_err(SessionError::RelayIo)?;
        return Ok(0);
    }

    let chunked = head.is_chunked();
    let length = head.content_length();
    let mut buffered = BytesMut::from(head.into_leftover().as_ref());

    let relayed = if chunked {
        body::relay_chunked(upstream, &mut buffered, client, chunk).await
    } else if let Some(length) = length {
        body::relay_exact(upstream, &mut buffered, client, length, chunk).await
    } else {
        // Close-delimited body: relay until the upstream hangs up.
        body::relay_until_eof(upstream, &mut buffered, client, chunk).await
    };

    relayed.map_err(SessionError::RelayIo)
}

//! WebSocket relay over HTTP upgrade.
//!
//! # Responsibilities
//! - Detect upgrade requests the gateway can relay
//! - Run the upgrade handshake against the upstream on a dedicated
//!   connection
//! - Pipe bytes in both directions once both sides have switched
//!
//! # Data Flow
//! ```text
//! Client ──101──▶ gateway ──101──▶ upstream
//!    ▲                                │
//!    └──────── copy_bidirectional ────┘
//! ```
//!
//! # Design Decisions
//! - Upgrades bypass the pooled client: a pooled connection cannot be
//!   handed over to the peer after a 101
//! - A refused handshake (non-101) streams back to the client as a plain
//!   response, so the upstream decides the outcome
//! - After the switch the relay is a byte pipe; frames are not parsed

use std::net::{IpAddr, SocketAddr};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Uri, Version};
use http_body_util::Empty;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use crate::observability::metrics;
use crate::proxy::error::GatewayError;
use crate::proxy::forward::join_query;
use crate::proxy::headers::{original_host, prepare_request_headers, sanitize_response_headers};
use crate::proxy::response;
use crate::routing::RouteEntry;

/// Whether a request asks for a protocol upgrade the gateway can relay.
///
/// Requires the `Upgrade` header, a `Connection` header listing it, and
/// an upgradable inbound connection.
pub fn wants_upgrade<B>(req: &Request<B>) -> bool {
    let connection_lists_upgrade = req
        .headers()
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("upgrade")))
        .unwrap_or(false);

    connection_lists_upgrade
        && req.headers().contains_key(header::UPGRADE)
        && req.extensions().get::<OnUpgrade>().is_some()
}

/// Relay an upgrade request through a fresh upstream connection.
///
/// Returns the upstream's handshake response. On a 101 the byte relay is
/// already running in a background task when this returns.
pub async fn relay(
    entry: &RouteEntry,
    addr: SocketAddr,
    client_ip: IpAddr,
    mut req: Request<Body>,
    target_path: String,
) -> Result<Response<Body>, GatewayError> {
    let client_upgrade = req.extensions_mut().remove::<OnUpgrade>().ok_or_else(|| {
        GatewayError::Protocol {
            name: entry.upstream.clone(),
            source: Box::new(std::io::Error::other("inbound connection is not upgradable")),
        }
    })?;
    let (parts, _body) = req.into_parts();

    let connect = entry.timeouts.connect();
    let stream = match tokio::time::timeout(connect, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(GatewayError::Connect {
                name: entry.upstream.clone(),
                addr,
                source: Box::new(e),
            })
        }
        Err(_) => {
            return Err(GatewayError::Timeout {
                name: entry.upstream.clone(),
                phase: "connect",
                after: connect,
            })
        }
    };

    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(
        TokioIo::new(stream),
    )
    .await
    .map_err(|e| GatewayError::Protocol {
        name: entry.upstream.clone(),
        source: Box::new(e),
    })?;

    // The connection task must keep polling for the upgrade to complete.
    let conn_upstream = entry.upstream.clone();
    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            debug!(upstream = %conn_upstream, error = %e, "Upgrade connection ended with error");
        }
    });

    let host = original_host(&parts);
    let mut headers = prepare_request_headers(&parts.headers, client_ip, host.as_ref(), entry);
    // The upgrade intent is hop-by-hop and was stripped; restate it for
    // the upstream leg.
    if let Some(protocol) = parts.headers.get(header::UPGRADE) {
        headers.insert(header::UPGRADE, protocol.clone());
    }
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));

    let uri: Uri = join_query(&target_path, parts.uri.query())
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| GatewayError::Protocol {
            name: entry.upstream.clone(),
            source: Box::new(e),
        })?;

    let mut upstream_req = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .version(Version::HTTP_11)
        .body(Empty::<Bytes>::new())
        .map_err(|e| GatewayError::Protocol {
            name: entry.upstream.clone(),
            source: Box::new(e),
        })?;
    *upstream_req.headers_mut() = headers;

    let read = entry.timeouts.read();
    let mut upstream_res = match tokio::time::timeout(read, sender.send_request(upstream_req)).await
    {
        Ok(Ok(res)) => res,
        Ok(Err(e)) => {
            return Err(GatewayError::Protocol {
                name: entry.upstream.clone(),
                source: Box::new(e),
            })
        }
        Err(_) => {
            return Err(GatewayError::Timeout {
                name: entry.upstream.clone(),
                phase: "upgrade handshake",
                after: read,
            })
        }
    };

    if upstream_res.status() != StatusCode::SWITCHING_PROTOCOLS {
        debug!(
            upstream = %entry.upstream,
            status = %upstream_res.status(),
            "Upgrade refused, relaying plain response"
        );
        let (mut res_parts, res_body) = upstream_res.into_parts();
        sanitize_response_headers(&mut res_parts.headers);
        return Ok(Response::from_parts(
            res_parts,
            response::streamed(res_body, read),
        ));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut upstream_res);
    let route = entry.name.clone();
    tokio::spawn(async move {
        let upstream_io = match upstream_upgrade.await {
            Ok(io) => io,
            Err(e) => {
                debug!(route = %route, error = %e, "Upstream side of upgrade failed");
                return;
            }
        };
        let client_io = match client_upgrade.await {
            Ok(io) => io,
            Err(e) => {
                debug!(route = %route, error = %e, "Client side of upgrade failed");
                return;
            }
        };

        let mut upstream_io = TokioIo::new(upstream_io);
        let mut client_io = TokioIo::new(client_io);
        match tokio::io::copy_bidirectional(&mut client_io, &mut upstream_io).await {
            Ok((to_upstream, to_client)) => {
                debug!(
                    route = %route,
                    bytes_to_upstream = to_upstream,
                    bytes_to_client = to_client,
                    "WebSocket session closed"
                );
            }
            Err(e) => {
                debug!(route = %route, error = %e, "WebSocket session ended with error");
            }
        }
    });

    metrics::record_upgrade(&entry.name);

    // The 101 must keep its Connection/Upgrade headers, so no sanitizing.
    let (res_parts, _) = upstream_res.into_parts();
    Ok(Response::from_parts(res_parts, Body::empty()))
}

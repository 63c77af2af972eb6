//! Forwarding header policy.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Keep the client's Host header intact end to end
//! - Stamp identity headers (X-Real-IP, X-Forwarded-*)
//! - Inject per-route static headers
//!
//! # Design Decisions
//! - X-Forwarded-For is appended to, never replaced, so entries from an
//!   outer proxy survive the hop
//! - X-Real-IP, X-Forwarded-Proto and X-Forwarded-Host describe this hop
//!   and are always overwritten, which also drops spoofed values
//! - Upgrade/Connection are re-added by the websocket relay when needed

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request;

use crate::routing::RouteEntry;

pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Headers that belong to the connection, not the message.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// The Host the client addressed, from the header or the request target.
pub fn original_host(parts: &request::Parts) -> Option<HeaderValue> {
    if let Some(host) = parts.headers.get(header::HOST) {
        return Some(host.clone());
    }
    let authority = parts.uri.authority()?;
    HeaderValue::from_str(authority.as_str()).ok()
}

/// Build the header map forwarded to the upstream.
pub fn prepare_request_headers(
    original: &HeaderMap,
    client_ip: IpAddr,
    host: Option<&HeaderValue>,
    entry: &RouteEntry,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(original.len() + 4);
    for (name, value) in original {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    if let Some(host) = host {
        headers.insert(header::HOST, host.clone());
        headers.insert(X_FORWARDED_HOST, host.clone());
    } else {
        headers.remove(X_FORWARDED_HOST);
    }

    let ip = client_ip.to_string();
    let forwarded_for = match original.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, ip),
        None => ip.clone(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.insert(X_REAL_IP, value);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    for (name, value) in &entry.extra_headers {
        headers.insert(name.clone(), value.clone());
    }

    headers
}

/// Strip connection-level headers from an upstream response.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    let stripped: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in stripped {
        headers.remove(name);
    }
}
